//! The uniform row/column model every input format is parsed into.
//!
//! Whatever the source (JSON objects, CSV lines, worksheet rows), ingestion
//! produces a [`Dataset`]: an ordered column set plus records whose fields
//! follow exactly that order. Downstream stages never see the original file
//! format again.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single scalar cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            // Integral values print without a trailing ".0", matching how
            // spreadsheets display them.
            CellValue::Number(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Null => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// One row: `(column, value)` pairs in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, CellValue)>,
}

impl Record {
    pub fn new(fields: Vec<(String, CellValue)>) -> Self {
        Self { fields }
    }

    /// Value of `column`, or `None` when the record has no such column.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, CellValue)] {
        &self.fields
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The result of a successful ingestion.
///
/// Invariants (upheld by [`crate::pipeline::ingest`]): `columns` is non-empty
/// and distinct, `records` is non-empty, and every record's fields are
/// exactly `columns` in the same order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// File name the data came from (shown in the PDF header).
    pub source_name: String,
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// The first `n` records.
    pub fn preview(&self, n: usize) -> &[Record] {
        &self.records[..n.min(self.records.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_display_drops_integral_fraction() {
        assert_eq!(CellValue::Number(3.0).to_string(), "3");
        assert_eq!(CellValue::Number(-12.0).to_string(), "-12");
        assert_eq!(CellValue::Number(1.5).to_string(), "1.5");
        assert_eq!(CellValue::Number(0.1).to_string(), "0.1");
    }

    #[test]
    fn null_displays_empty() {
        assert_eq!(CellValue::Null.to_string(), "");
        assert_eq!(CellValue::Bool(false).to_string(), "false");
    }

    #[test]
    fn record_lookup_by_name() {
        let r = Record::new(vec![
            ("sku".into(), "A1".into()),
            ("qty".into(), CellValue::Number(4.0)),
        ]);
        assert_eq!(r.get("qty"), Some(&CellValue::Number(4.0)));
        assert_eq!(r.get("missing"), None);
        assert_eq!(r.column_names().collect::<Vec<_>>(), vec!["sku", "qty"]);
    }

    #[test]
    fn preview_is_clamped() {
        let ds = Dataset {
            source_name: "x.csv".into(),
            columns: vec!["a".into()],
            records: vec![Record::new(vec![("a".into(), "1".into())]); 3],
        };
        assert_eq!(ds.preview(10).len(), 3);
        assert_eq!(ds.preview(2).len(), 2);
    }
}
