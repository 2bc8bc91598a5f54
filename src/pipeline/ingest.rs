//! Tabular ingestion: JSON arrays, CSV and the first worksheet of an
//! `.xlsx` / `.xls` workbook become one [`Dataset`].
//!
//! Ingestion is all-or-nothing. Any violation (unsupported extension,
//! malformed file, zero rows, a JSON row whose keys differ from the first
//! row's) yields a single [`QrBatchError::Format`] and no data.
//!
//! ## Column naming
//!
//! The column set is the key set of the first record, in encounter order.
//! For header-based formats (CSV, spreadsheet) blank header cells become
//! `__EMPTY`, `__EMPTY_1`, … and repeated names get `_1`, `_2`, … suffixes,
//! so column names are always distinct.

use crate::error::QrBatchError;
use crate::pipeline::input::InputFile;
use crate::record::{CellValue, Dataset, Record};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use tracing::{debug, info};

/// The parser selected by a file's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Json,
    Csv,
    Spreadsheet,
}

impl TableFormat {
    /// Map a lower-case extension (no dot) to a format.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(TableFormat::Json),
            "csv" => Some(TableFormat::Csv),
            "xlsx" | "xls" => Some(TableFormat::Spreadsheet),
            _ => None,
        }
    }
}

/// Parse an input file into a dataset.
pub fn ingest(file: &InputFile) -> Result<Dataset, QrBatchError> {
    let ext = file.extension();
    let format = TableFormat::from_extension(&ext).ok_or_else(|| {
        QrBatchError::format(
            &file.name,
            format!("unsupported file type '.{ext}' (expected .xlsx, .xls, .csv or .json)"),
        )
    })?;

    let (columns, records) = match format {
        TableFormat::Json => parse_json(&file.bytes),
        TableFormat::Csv => parse_csv(&file.bytes),
        TableFormat::Spreadsheet => parse_spreadsheet(&file.bytes),
    }
    .map_err(|reason| QrBatchError::format(&file.name, reason))?;

    if records.is_empty() {
        return Err(QrBatchError::format(&file.name, "No data found in file"));
    }
    if columns.is_empty() {
        return Err(QrBatchError::format(&file.name, "No columns found in file"));
    }

    info!(
        "Ingested '{}': {} rows × {} columns",
        file.name,
        records.len(),
        columns.len()
    );

    Ok(Dataset {
        source_name: file.name.clone(),
        columns,
        records,
    })
}

type Parsed = Result<(Vec<String>, Vec<Record>), String>;

// ── JSON ─────────────────────────────────────────────────────────────────

fn parse_json(bytes: &[u8]) -> Parsed {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| format!("invalid JSON: {e}"))?;

    let Value::Array(rows) = value else {
        return Err("expected a JSON array of objects".into());
    };
    let Some(first) = rows.first() else {
        return Ok((Vec::new(), Vec::new()));
    };

    let columns: Vec<String> = as_object(first, 0)?.keys().cloned().collect();
    let expected: HashSet<&str> = columns.iter().map(String::as_str).collect();

    let mut records = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        let obj = as_object(row, i)?;

        let keys: HashSet<&str> = obj.keys().map(String::as_str).collect();
        if keys != expected {
            return Err(format!(
                "row {} has columns that differ from the first row",
                i + 1
            ));
        }

        let mut fields = Vec::with_capacity(columns.len());
        for col in &columns {
            let cell = json_scalar(&obj[col.as_str()])
                .ok_or_else(|| format!("row {}, column '{col}': nested values are not supported", i + 1))?;
            fields.push((col.clone(), cell));
        }
        records.push(Record::new(fields));
    }

    debug!("JSON: {} objects", records.len());
    Ok((columns, records))
}

fn as_object(row: &Value, index: usize) -> Result<&serde_json::Map<String, Value>, String> {
    row.as_object()
        .ok_or_else(|| format!("row {} is not an object", index + 1))
}

fn json_scalar(v: &Value) -> Option<CellValue> {
    match v {
        Value::Null => Some(CellValue::Null),
        Value::Bool(b) => Some(CellValue::Bool(*b)),
        Value::Number(n) => Some(json_number(n)),
        Value::String(s) => Some(CellValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Integers past 2^53 keep their digits as text; `f64` would round them.
fn json_number(n: &serde_json::Number) -> CellValue {
    const MAX_EXACT: u64 = 1 << 53;
    let integer = n.as_i64().map(i64::unsigned_abs).or_else(|| n.as_u64());
    match (integer, n.as_f64()) {
        (Some(magnitude), _) if magnitude > MAX_EXACT => CellValue::Text(n.to_string()),
        (_, Some(f)) => CellValue::Number(f),
        _ => CellValue::Text(n.to_string()),
    }
}

// ── CSV ──────────────────────────────────────────────────────────────────

fn parse_csv(bytes: &[u8]) -> Parsed {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| format!("invalid CSV header: {e}"))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let columns = normalise_headers(headers);

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = row.map_err(|e| format!("invalid CSV at line {}: {e}", i + 2))?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        let fields = columns
            .iter()
            .enumerate()
            .map(|(c, name)| (name.clone(), infer_text_cell(row.get(c).unwrap_or(""))))
            .collect();
        records.push(Record::new(fields));
    }

    debug!("CSV: {} data rows", records.len());
    Ok((columns, records))
}

static RE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?(0|[1-9][0-9]*)(\.[0-9]+)?([eE][+-]?[0-9]+)?$").unwrap());

/// Type a raw CSV cell. Codes with leading zeros ("007") stay text.
fn infer_text_cell(raw: &str) -> CellValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return CellValue::Null;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return CellValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return CellValue::Bool(false);
    }
    if RE_NUMBER.is_match(trimmed) {
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() {
                return CellValue::Number(n);
            }
        }
    }
    CellValue::Text(raw.to_string())
}

// ── Spreadsheet ──────────────────────────────────────────────────────────

fn parse_spreadsheet(bytes: &[u8]) -> Parsed {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| format!("invalid spreadsheet: {e}"))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| "workbook has no worksheets".to_string())?
        .map_err(|e| format!("cannot read first worksheet: {e}"))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let columns = normalise_headers(header_row.iter().map(header_text).collect());

    let mut records = Vec::new();
    for row in rows {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let fields = columns
            .iter()
            .enumerate()
            .map(|(c, name)| (name.clone(), row.get(c).map(sheet_cell).unwrap_or(CellValue::Null)))
            .collect();
        records.push(Record::new(fields));
    }

    debug!("Spreadsheet: {} data rows", records.len());
    Ok((columns, records))
}

fn header_text(cell: &Data) -> String {
    match sheet_cell(cell) {
        CellValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn sheet_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Null,
        Data::String(s) if s.is_empty() => CellValue::Null,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        // Dates keep their serial number, as spreadsheets store them.
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(e) => CellValue::Text(e.to_string()),
    }
}

// ── Headers ──────────────────────────────────────────────────────────────

/// Name blank headers `__EMPTY…` and suffix duplicates so names are distinct.
fn normalise_headers(raw: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(raw.len());

    for header in raw {
        let base = if header.trim().is_empty() {
            "__EMPTY".to_string()
        } else {
            header
        };
        let n = counts.entry(base.clone()).or_insert(0);
        let mut name = if *n == 0 {
            base.clone()
        } else {
            format!("{base}_{n}")
        };
        while used.contains(&name) {
            *n += 1;
            name = format!("{base}_{n}");
        }
        *n += 1;
        used.insert(name.clone());
        out.push(name);
    }
    out
}
