//! Progress-callback trait for per-record generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! events while a batch is generated. Records are processed strictly in
//! input order, one at a time, so events arrive in order too.
//!
//! # Example
//!
//! ```rust
//! use qrbatch::{GenerationProgressCallback, GenerationConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_record_complete(&self, row: usize, total_rows: usize, payload_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Row {}/{} done ({} chars)", row, total_rows, payload_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(counter as Arc<dyn GenerationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the generation driver as it processes each record.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Row numbers are 1-indexed.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once before the first record is encoded.
    fn on_generation_start(&self, total_rows: usize) {
        let _ = total_rows;
    }

    /// Called just before a record's payload is built and rendered.
    fn on_record_start(&self, row: usize, total_rows: usize) {
        let _ = (row, total_rows);
    }

    /// Called when a record's QR image has been rendered.
    ///
    /// `payload_len` is the character length of the encoded payload.
    fn on_record_complete(&self, row: usize, total_rows: usize, payload_len: usize) {
        let _ = (row, total_rows, payload_len);
    }

    /// Called once when a record fails; no further records are attempted.
    fn on_generation_failed(&self, row: usize, total_rows: usize, error: &str) {
        let _ = (row, total_rows, error);
    }

    /// Called once after every record rendered and the batch was persisted.
    fn on_generation_complete(&self, generated: usize) {
        let _ = generated;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
