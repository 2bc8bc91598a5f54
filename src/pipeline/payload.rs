//! QR payload text: `"<column>: <value>"` segments joined by `" | "`.

use crate::record::{CellValue, Record};

/// Separator between column segments.
pub const SEGMENT_DELIMITER: &str = " | ";

/// Build the payload for one record.
///
/// Columns appear in the given order; an absent or null value renders as
/// the empty string so every selected column yields exactly one segment.
pub fn encode_payload(record: &Record, columns: &[String]) -> String {
    columns
        .iter()
        .map(|col| {
            let value = match record.get(col) {
                None | Some(CellValue::Null) => String::new(),
                Some(v) => v.to_string(),
            };
            format!("{col}: {value}")
        })
        .collect::<Vec<_>>()
        .join(SEGMENT_DELIMITER)
}
