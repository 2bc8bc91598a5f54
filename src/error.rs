//! Error types for the qrbatch library.
//!
//! A single enum, [`QrBatchError`], covers every failure a caller can see.
//! Variants are grouped by the pipeline stage that raises them so the CLI
//! (or any other front end) can turn each one into a user-facing notice
//! without string matching:
//!
//! * **Input / Format** — the file could not be read or does not hold a
//!   usable table. Ingestion is all-or-nothing: no partial dataset is ever
//!   returned alongside one of these.
//! * **Render** — the QR encoder rejected a row. The whole generation run is
//!   aborted; nothing is persisted.
//! * **Export** — the PDF could not be produced. Generated entries are left
//!   untouched so the caller can retry.
//! * **Persistence** — the history store could not be read or written while
//!   appending. Corrupt history on *read* is recovered inside
//!   [`crate::history`] and never reaches the caller.

use crate::wizard::WizardStep;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the qrbatch library.
#[derive(Debug, Error)]
pub enum QrBatchError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Format errors ─────────────────────────────────────────────────────
    /// The file is not a supported table, is malformed, or holds no rows.
    #[error(
        "Could not read data from '{file}': {reason}\n\
Please ensure the file is a valid Excel (.xlsx, .xls), CSV, or JSON file with data."
    )]
    Format { file: String, reason: String },

    // ── Generation errors ─────────────────────────────────────────────────
    /// Generation was requested with an empty column selection.
    #[error("No columns selected. Select at least one column to generate QR codes.")]
    NoColumnsSelected,

    /// The QR encoder failed for one row; the batch was aborted.
    #[error("QR generation failed at row {row}: {detail}")]
    Render { row: usize, detail: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// The PDF could not be produced.
    #[error("PDF export failed: {reason}")]
    Export { reason: String },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Persistence errors ────────────────────────────────────────────────
    /// Reading or writing the history log failed.
    #[error("Failed to update QR history '{key}': {source}")]
    Persistence {
        key: String,
        #[source]
        source: std::io::Error,
    },

    // ── Wizard errors ─────────────────────────────────────────────────────
    /// The requested step change is not an edge of the wizard.
    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: WizardStep, to: WizardStep },

    /// The transition exists but its guard is not satisfied.
    #[error("Cannot leave {step}: {reason}")]
    PreconditionFailed { step: WizardStep, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QrBatchError {
    /// Shorthand for a [`QrBatchError::Format`] error.
    pub(crate) fn format(file: impl Into<String>, reason: impl Into<String>) -> Self {
        QrBatchError::Format {
            file: file.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`QrBatchError::Export`] error.
    pub(crate) fn export(reason: impl Into<String>) -> Self {
        QrBatchError::Export {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_error_display() {
        let e = QrBatchError::format("people.csv", "No data found in file");
        let msg = e.to_string();
        assert!(msg.contains("people.csv"), "got: {msg}");
        assert!(msg.contains("No data found"), "got: {msg}");
    }

    #[test]
    fn render_error_names_row() {
        let e = QrBatchError::Render {
            row: 7,
            detail: "data too long".into(),
        };
        assert!(e.to_string().contains("row 7"));
        assert!(e.to_string().contains("data too long"));
    }

    #[test]
    fn transition_error_names_steps() {
        let e = QrBatchError::InvalidTransition {
            from: WizardStep::Upload,
            to: WizardStep::Export,
        };
        let msg = e.to_string();
        assert!(msg.contains("upload"), "got: {msg}");
        assert!(msg.contains("export"), "got: {msg}");
    }

    #[test]
    fn persistence_error_keeps_source() {
        use std::error::Error as _;
        let e = QrBatchError::Persistence {
            key: "qr-history".into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(e.source().is_some());
        assert!(e.to_string().contains("qr-history"));
    }
}
