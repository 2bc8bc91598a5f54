//! Output types: generated QR entries and run statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One generated QR code.
///
/// The serialised field names (`qrString`, `timestamp`, `qrDataUrl`) are the
/// persisted history format. Every field has a default so older or
/// hand-edited history files with missing fields still load; unknown fields
/// are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QrEntry {
    /// `qr-<run millis>-<row index>`. Unique within a run, best-effort across runs.
    #[serde(default)]
    pub id: String,

    /// Text encoded into the QR code.
    #[serde(rename = "qrString", default)]
    pub payload: String,

    #[serde(rename = "timestamp", default)]
    pub created_at: DateTime<Utc>,

    /// `data:image/png;base64,…`
    #[serde(rename = "qrDataUrl", default)]
    pub image_data: String,
}

impl QrEntry {
    /// Build the run-scoped identifier for row `index`.
    pub fn make_id(run_started: DateTime<Utc>, index: usize) -> String {
        format!("qr-{}-{}", run_started.timestamp_millis(), index)
    }
}

/// Timing and size statistics for one generation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Records in the dataset.
    pub total_rows: usize,
    /// QR codes produced (equals `total_rows` on success).
    pub generated: usize,
    /// Columns encoded into each payload.
    pub selected_columns: usize,
    /// Wall-clock time for the whole run.
    pub total_duration_ms: u64,
    /// Time spent inside the QR renderer.
    pub render_duration_ms: u64,
    /// Whether the batch was appended to a history store.
    pub persisted: bool,
}

/// Everything produced by [`crate::generate()`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub source_name: String,
    pub entries: Vec<QrEntry>,
    pub stats: GenerationStats,
}

/// Header text printed on every PDF page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub title: String,
    pub source_name: String,
    pub generated_at: DateTime<Utc>,
}

impl ExportMetadata {
    pub fn new(title: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_name: source_name.into(),
            generated_at: Utc::now(),
        }
    }
}

/// A finished PDF.
#[derive(Debug, Clone)]
pub struct PdfExport {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub entry_count: usize,
}

/// Summary returned by [`crate::export_to_file`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportStats {
    pub page_count: usize,
    pub entry_count: usize,
    pub bytes_written: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_uses_persisted_field_names() {
        let entry = QrEntry {
            id: "qr-1-0".into(),
            payload: "sku: A1".into(),
            created_at: DateTime::<Utc>::default(),
            image_data: "data:image/png;base64,AAAA".into(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["qrString"], "sku: A1");
        assert_eq!(json["qrDataUrl"], "data:image/png;base64,AAAA");
        assert!(json.get("timestamp").is_some());
        assert!(json.get("payload").is_none());
    }

    #[test]
    fn entry_tolerates_missing_and_extra_fields() {
        let raw = r#"{"id":"qr-5-1","qrString":"a: b","extra":42}"#;
        let entry: QrEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.id, "qr-5-1");
        assert_eq!(entry.payload, "a: b");
        assert!(entry.image_data.is_empty());
        assert_eq!(entry.created_at, DateTime::<Utc>::default());
    }

    #[test]
    fn id_combines_run_time_and_row() {
        let t = DateTime::<Utc>::from_timestamp_millis(1_700_000_000_123).unwrap();
        assert_eq!(QrEntry::make_id(t, 4), "qr-1700000000123-4");
    }
}
