//! Generation entry points: load a table, turn its rows into QR codes,
//! export them as a PDF.
//!
//! Everything runs strictly in order: ingest, then for each record build
//! the payload and render it, then persist the whole batch, then export.
//! Rendering and PDF assembly are CPU-bound and run on `spawn_blocking`, one
//! task at a time.

use crate::config::{GenerationConfig, PageLayout};
use crate::error::QrBatchError;
use crate::output::{ExportMetadata, ExportStats, GenerationOutput, GenerationStats, PdfExport, QrEntry};
use crate::pipeline::select::ColumnSelection;
use crate::pipeline::{encode, export, ingest, input, payload, render};
use crate::record::Dataset;
use chrono::Utc;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Download timeout used by [`load_dataset`].
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 120;

/// Read and parse a CSV, JSON, XLSX or XLS file from a path or URL.
///
/// # Errors
/// Input errors (missing file, failed download) and
/// [`QrBatchError::Format`] for anything that is not a non-empty table.
pub async fn load_dataset(input_str: impl AsRef<str>) -> Result<Dataset, QrBatchError> {
    load_dataset_with_timeout(input_str, DEFAULT_DOWNLOAD_TIMEOUT_SECS).await
}

/// [`load_dataset`] with an explicit URL download timeout.
pub async fn load_dataset_with_timeout(
    input_str: impl AsRef<str>,
    timeout_secs: u64,
) -> Result<Dataset, QrBatchError> {
    let input_str = input_str.as_ref();
    info!("Loading table: {}", input_str);
    let file = input::resolve_input(input_str, timeout_secs).await?;
    ingest::ingest(&file)
}

/// Parse a table already held in memory. `file_name` selects the format by
/// its extension.
pub fn load_dataset_from_bytes(
    file_name: impl Into<String>,
    bytes: impl Into<Vec<u8>>,
) -> Result<Dataset, QrBatchError> {
    ingest::ingest(&input::InputFile::new(file_name, bytes))
}

/// Render one QR code per record and append the batch to history.
///
/// # Errors
/// * [`QrBatchError::NoColumnsSelected`] for an empty selection.
/// * [`QrBatchError::Render`] when any record cannot be encoded. The batch
///   is abandoned and nothing is persisted.
/// * [`QrBatchError::Persistence`] when the history write fails. The
///   generated entries are lost with it; run again without history to
///   export anyway.
pub async fn generate(
    dataset: &Dataset,
    selection: &ColumnSelection,
    config: &GenerationConfig,
) -> Result<GenerationOutput, QrBatchError> {
    let total_start = Instant::now();

    // ── Step 1: Validate selection ───────────────────────────────────────
    if selection.is_empty() {
        return Err(QrBatchError::NoColumnsSelected);
    }
    let unknown = selection.unknown(&dataset.columns);
    if !unknown.is_empty() {
        warn!("Selected columns not in '{}': {}", dataset.source_name, unknown.join(", "));
    }

    let total = dataset.row_count();
    let run_started = Utc::now();
    info!(
        "Generating {} QR codes from '{}' ({} columns)",
        total,
        dataset.source_name,
        selection.len()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_start(total);
    }

    // ── Step 2: Encode + render each record ──────────────────────────────
    let opts = render::RenderOptions {
        size: config.qr_size,
        margin: config.margin,
        palette: config.palette,
    };
    let mut entries = Vec::with_capacity(total);
    let mut render_time = Duration::ZERO;

    for (i, record) in dataset.records.iter().enumerate() {
        let row = i + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_record_start(row, total);
        }

        let text = payload::encode_payload(record, selection.columns());
        let rendered = render_record(text.clone(), opts).await;
        let (image_data, elapsed) = match rendered {
            Ok(ok) => ok,
            Err(detail) => {
                warn!("Row {} failed: {}", row, detail);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_generation_failed(row, total, &detail);
                }
                return Err(QrBatchError::Render { row, detail });
            }
        };
        render_time += elapsed;

        debug!("Row {}/{}: {} chars", row, total, text.chars().count());
        if let Some(ref cb) = config.progress_callback {
            cb.on_record_complete(row, total, text.chars().count());
        }
        entries.push(QrEntry {
            id: QrEntry::make_id(run_started, i),
            payload: text,
            created_at: Utc::now(),
            image_data,
        });
    }

    // ── Step 3: Persist the batch ────────────────────────────────────────
    let persisted = match config.history.clone() {
        Some(store) => {
            let batch = entries.clone();
            tokio::task::spawn_blocking(move || store.append(&batch))
                .await
                .map_err(|e| QrBatchError::Internal(format!("History task panicked: {e}")))??;
            true
        }
        None => false,
    };

    let stats = GenerationStats {
        total_rows: total,
        generated: entries.len(),
        selected_columns: selection.len(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms: render_time.as_millis() as u64,
        persisted,
    };
    info!(
        "Generated {} QR codes in {}ms",
        stats.generated, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_generation_complete(entries.len());
    }

    Ok(GenerationOutput {
        source_name: dataset.source_name.clone(),
        entries,
        stats,
    })
}

/// Render and encode one payload off the async runtime.
async fn render_record(
    text: String,
    opts: render::RenderOptions,
) -> Result<(String, Duration), String> {
    tokio::task::spawn_blocking(move || -> Result<(String, Duration), String> {
        let start = Instant::now();
        let img = render::render_qr(&text, &opts).map_err(|e| e.to_string())?;
        let url = encode::encode_png_data_url(&img).map_err(|e| format!("PNG encoding failed: {e}"))?;
        Ok((url, start.elapsed()))
    })
    .await
    .map_err(|e| format!("render task panicked: {e}"))?
}

/// Build the PDF for `entries` in memory.
///
/// Works on freshly generated entries and on entries reloaded from history.
pub async fn export_pdf(
    entries: &[QrEntry],
    meta: &ExportMetadata,
    layout: &PageLayout,
) -> Result<PdfExport, QrBatchError> {
    let entries = entries.to_vec();
    let meta = meta.clone();
    let layout = layout.clone();
    tokio::task::spawn_blocking(move || export::export_pdf_blocking(&entries, &meta, &layout))
        .await
        .map_err(|e| QrBatchError::Internal(format!("Export task panicked: {e}")))?
}

/// Build the PDF and write it to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn export_to_file(
    entries: &[QrEntry],
    meta: &ExportMetadata,
    layout: &PageLayout,
    output_path: impl AsRef<Path>,
) -> Result<ExportStats, QrBatchError> {
    let pdf = export_pdf(entries, meta, layout).await?;
    let path = output_path.as_ref();
    let write_err = |source: std::io::Error| QrBatchError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("pdf.tmp");
    tokio::fs::write(&tmp_path, &pdf.bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Wrote {} ({} pages)", path.display(), pdf.page_count);
    Ok(ExportStats {
        page_count: pdf.page_count,
        entry_count: pdf.entry_count,
        bytes_written: pdf.bytes.len(),
    })
}

/// `qr-codes-<millis>.pdf`, the name used when no output path is given.
pub fn default_output_name() -> String {
    format!("qr-codes-{}.pdf", Utc::now().timestamp_millis())
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    dataset: &Dataset,
    selection: &ColumnSelection,
    config: &GenerationConfig,
) -> Result<GenerationOutput, QrBatchError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| QrBatchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(dataset, selection, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use crate::progress::GenerationProgressCallback;
    use std::sync::{Arc, Mutex};

    fn dataset(rows: usize) -> Dataset {
        let json = serde_json::to_vec(
            &(0..rows)
                .map(|i| serde_json::json!({ "sku": format!("A{i}"), "name": "Widget" }))
                .collect::<Vec<_>>(),
        )
        .unwrap();
        load_dataset_from_bytes("items.json", json).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl GenerationProgressCallback for Recorder {
        fn on_generation_start(&self, total_rows: usize) {
            self.events.lock().unwrap().push(format!("start {total_rows}"));
        }
        fn on_record_complete(&self, row: usize, _total: usize, _len: usize) {
            self.events.lock().unwrap().push(format!("done {row}"));
        }
        fn on_generation_failed(&self, row: usize, _total: usize, _error: &str) {
            self.events.lock().unwrap().push(format!("failed {row}"));
        }
        fn on_generation_complete(&self, generated: usize) {
            self.events.lock().unwrap().push(format!("complete {generated}"));
        }
    }

    #[tokio::test]
    async fn generates_one_entry_per_record() {
        let ds = dataset(3);
        let sel = ColumnSelection::from_columns(["sku", "name"]);
        let out = generate(&ds, &sel, &GenerationConfig::default()).await.unwrap();

        assert_eq!(out.entries.len(), 3);
        assert_eq!(out.entries[0].payload, "sku: A0 | name: Widget");
        assert!(out.entries[0].id.starts_with("qr-"));
        assert!(out.entries[0].id.ends_with("-0"));
        assert!(out.entries.iter().all(|e| e.image_data.starts_with(encode::PNG_DATA_URL_PREFIX)));
        assert!(!out.stats.persisted);
    }

    #[tokio::test]
    async fn empty_selection_is_rejected() {
        let err = generate(&dataset(1), &ColumnSelection::default(), &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, QrBatchError::NoColumnsSelected));
    }

    #[tokio::test]
    async fn batch_is_persisted_and_callbacks_fire() {
        let store = HistoryStore::in_memory();
        let recorder = Arc::new(Recorder::default());
        let config = GenerationConfig::builder()
            .history(store.clone())
            .progress_callback(recorder.clone())
            .build()
            .unwrap();

        let out = generate(&dataset(2), &ColumnSelection::from_columns(["sku"]), &config)
            .await
            .unwrap();
        assert!(out.stats.persisted);
        assert_eq!(store.load(), out.entries);

        let events = recorder.events.lock().unwrap().clone();
        assert_eq!(events, vec!["start 2", "done 1", "done 2", "complete 2"]);
    }

    #[tokio::test]
    async fn render_failure_aborts_without_persisting() {
        let long = "x".repeat(4000);
        let ds = load_dataset_from_bytes(
            "items.json",
            format!(r#"[{{"a":"ok"}},{{"a":"{long}"}}]"#),
        )
        .unwrap();
        let store = HistoryStore::in_memory();
        let recorder = Arc::new(Recorder::default());
        let config = GenerationConfig::builder()
            .history(store.clone())
            .progress_callback(recorder.clone())
            .build()
            .unwrap();

        let err = generate(&ds, &ColumnSelection::from_columns(["a"]), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, QrBatchError::Render { row: 2, .. }));
        assert_eq!(store.total_count(), 0);
        assert!(recorder.events.lock().unwrap().contains(&"failed 2".to_string()));
    }

    #[tokio::test]
    async fn export_writes_pdf_file() {
        let ds = dataset(7);
        let out = generate(&ds, &ColumnSelection::from_columns(["sku"]), &GenerationConfig::default())
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("codes.pdf");
        let meta = ExportMetadata::new("Generated QR Codes", &ds.source_name);
        let stats = export_to_file(&out.entries, &meta, &PageLayout::default(), &path)
            .await
            .unwrap();

        assert_eq!(stats.entry_count, 7);
        assert_eq!(stats.page_count, 2);
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(bytes.len(), stats.bytes_written);
        assert!(!path.with_extension("pdf.tmp").exists());
    }

    #[test]
    fn default_name_shape() {
        let name = default_output_name();
        assert!(name.starts_with("qr-codes-"));
        assert!(name.ends_with(".pdf"));
    }

    #[test]
    fn sync_wrapper() {
        let out = generate_sync(
            &dataset(1),
            &ColumnSelection::from_columns(["sku"]),
            &GenerationConfig::default(),
        )
        .unwrap();
        assert_eq!(out.stats.generated, 1);
    }
}
