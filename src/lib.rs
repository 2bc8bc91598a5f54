//! # qrbatch
//!
//! Turn the rows of a spreadsheet, CSV or JSON file into QR codes and lay
//! them out in a printable PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! table file / URL
//!  │
//!  ├─ 1. Input    read a local file or download a URL
//!  ├─ 2. Ingest   CSV / JSON / XLSX / XLS → columns + records
//!  ├─ 3. Select   ordered column subset (first three by default)
//!  ├─ 4. Payload  "col: value | col: value" per record
//!  ├─ 5. Render   QR bitmap per payload (spawn_blocking, one at a time)
//!  ├─ 6. History  append the batch to the persisted log
//!  └─ 7. Export   two-column paginated PDF
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use qrbatch::{export_to_file, generate, load_dataset, ColumnSelection, ExportMetadata, GenerationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dataset = load_dataset("inventory.xlsx").await?;
//!     let selection = ColumnSelection::default_for(&dataset.columns);
//!     let config = GenerationConfig::default();
//!
//!     let output = generate(&dataset, &selection, &config).await?;
//!     let meta = ExportMetadata::new(&config.title, &dataset.source_name);
//!     let stats = export_to_file(&output.entries, &meta, &config.layout, "codes.pdf").await?;
//!     eprintln!("{} codes on {} pages", stats.entry_count, stats.page_count);
//!     Ok(())
//! }
//! ```
//!
//! Interactive front ends drive the same calls through a [`Wizard`], which
//! enforces the upload → preview → configure → export order.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `qrbatch` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! qrbatch = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod history;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod wizard;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{GenerationConfig, GenerationConfigBuilder, PageLayout, Palette, Rgba};
pub use error::QrBatchError;
pub use generate::{
    default_output_name, export_pdf, export_to_file, generate, generate_sync, load_dataset,
    load_dataset_from_bytes, load_dataset_with_timeout,
};
pub use history::{HistoryBackend, HistoryEvent, HistoryStore, HISTORY_VIEW_LIMIT};
pub use output::{ExportMetadata, ExportStats, GenerationOutput, GenerationStats, PdfExport, QrEntry};
pub use pipeline::payload::encode_payload;
pub use pipeline::select::ColumnSelection;
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{CellValue, Dataset, Record};
pub use wizard::{Wizard, WizardStep};
