//! Pipeline stages for turning table rows into QR codes and a PDF.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the driver in [`crate::generate`] stays a thin
//! sequence of calls.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ ingest ──▶ select ──▶ payload ──▶ render ──▶ encode
//! (path/URL) (table)   (columns)  (text)      (pixels)   (data URL)
//!                                                            │
//!                              export ◀── layout ◀── caption ┘
//!                              (PDF)      (grid)     (text lines)
//! ```
//!
//! 1. [`input`]   — read a local file or download a URL into memory
//! 2. [`ingest`]  — parse CSV / JSON / XLSX / XLS into a [`crate::Dataset`]
//! 3. [`select`]  — ordered column selection with toggle semantics
//! 4. [`payload`] — `"col: value"` segments joined by `" | "`
//! 5. [`render`]  — rasterise one payload; runs in `spawn_blocking`
//! 6. [`encode`]  — PNG + base64 data URL, and back again for export
//! 7. [`caption`] — cleanup, wrap and truncate text for the PDF font
//! 8. [`layout`]  — two-column grid placement and pagination
//! 9. [`export`]  — draw the PDF with printpdf

pub mod caption;
pub mod encode;
pub mod export;
pub mod ingest;
pub mod input;
pub mod layout;
pub mod payload;
pub mod render;
pub mod select;
