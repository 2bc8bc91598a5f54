//! CLI binary for qrbatch.
//!
//! A thin shim over the library crate: `preview` shows what a table holds,
//! `generate` walks the wizard from upload to export, `history` reads or
//! clears the persisted log.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use qrbatch::pipeline::caption::truncate_preview;
use qrbatch::{
    default_output_name, export_to_file, generate, load_dataset_with_timeout, ColumnSelection,
    Dataset, ExportMetadata, GenerationConfig, GenerationProgressCallback, HistoryStore,
    ProgressCallback, Wizard,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar for a generation run. Rows complete strictly in order,
/// so a single counter is enough.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Spinner until `on_generation_start` reports the row count.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading table…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} codes  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Generating");
        self.bar.reset_eta();
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_generation_start(&self, total_rows: usize) {
        self.activate_bar(total_rows);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Generating {total_rows} QR codes…"))
        ));
    }

    fn on_record_start(&self, row: usize, _total_rows: usize) {
        self.bar.set_message(format!("row {row}"));
    }

    fn on_record_complete(&self, _row: usize, _total_rows: usize, _payload_len: usize) {
        self.bar.inc(1);
    }

    fn on_generation_failed(&self, row: usize, total_rows: usize, error: &str) {
        self.bar.println(format!(
            "  {} Row {:>4}/{:<4}  {}",
            red("✗"),
            row,
            total_rows,
            red(&truncate_preview(error, 80)),
        ));
        self.bar.abandon();
    }

    fn on_generation_complete(&self, generated: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} QR codes generated",
            green("✔"),
            bold(&generated.to_string())
        );
    }
}

const AFTER_HELP: &str = r##"EXAMPLES:
  # Look at a file before generating
  qrbatch preview inventory.xlsx

  # First three columns (the default selection), PDF named qr-codes-<millis>.pdf
  qrbatch generate inventory.xlsx

  # Pick columns explicitly; their order is the payload order
  qrbatch generate items.csv -c sku -c name -o labels.pdf

  # Larger codes in a custom colour, no history entry
  qrbatch generate items.json --size 400 --dark "#1E3A8A" --no-history

  # Download the table first
  qrbatch generate https://example.com/export.csv -c id

  # Recent history, dashboard counts, wipe
  qrbatch history list
  qrbatch history stats
  qrbatch history clear

PAYLOAD FORMAT:
  Each QR code encodes the selected columns of one row as
    <column>: <value> | <column>: <value> | …
  Empty cells encode as "<column>: ".

SUPPORTED INPUT:
  .csv  .json (array of objects)  .xlsx  .xls (first worksheet)

ENVIRONMENT VARIABLES:
  QRBATCH_HISTORY_DIR   Directory holding qr-history.json
  QRBATCH_COLUMNS       Comma-separated column list for `generate`
  QRBATCH_SIZE          QR image size in pixels (100–500)
  RUST_LOG              Override log filtering (e.g. qrbatch=debug)
"##;

/// Turn spreadsheet, CSV and JSON rows into QR codes and a printable PDF.
#[derive(Parser, Debug)]
#[command(
    name = "qrbatch",
    version,
    about = "Turn spreadsheet, CSV and JSON rows into QR codes and a printable PDF",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "QRBATCH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "QRBATCH_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the columns and first rows of a table.
    Preview(PreviewArgs),
    /// Generate one QR code per row and export them as a PDF.
    Generate(GenerateArgs),
    /// Show or clear the history of generated codes.
    History(HistoryArgs),
}

#[derive(Args, Debug)]
struct PreviewArgs {
    /// Local .csv/.json/.xlsx/.xls file or HTTP/HTTPS URL.
    input: String,

    /// Number of rows to show.
    #[arg(long, env = "QRBATCH_PREVIEW_ROWS", default_value_t = 10)]
    rows: usize,

    /// Output JSON instead of a table.
    #[arg(long, env = "QRBATCH_JSON")]
    json: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "QRBATCH_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Local .csv/.json/.xlsx/.xls file or HTTP/HTTPS URL.
    input: String,

    /// Column to encode; repeat for several. Default: the first three.
    #[arg(short = 'c', long = "column", env = "QRBATCH_COLUMNS", value_delimiter = ',')]
    columns: Vec<String>,

    /// QR image size in pixels (100–500).
    #[arg(long, env = "QRBATCH_SIZE", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(100..=500))]
    size: u32,

    /// Quiet-zone width in modules.
    #[arg(long, env = "QRBATCH_MARGIN", default_value_t = 2)]
    margin: u32,

    /// Module colour as #RRGGBB or #RRGGBBAA.
    #[arg(long, env = "QRBATCH_DARK", default_value = "#000000")]
    dark: String,

    /// Background colour as #RRGGBB or #RRGGBBAA.
    #[arg(long, env = "QRBATCH_LIGHT", default_value = "#FFFFFF")]
    light: String,

    /// Write the PDF here. Default: qr-codes-<millis>.pdf.
    #[arg(short, long, env = "QRBATCH_OUTPUT")]
    output: Option<PathBuf>,

    /// Title printed at the top of every page.
    #[arg(long, env = "QRBATCH_TITLE", default_value = "Generated QR Codes")]
    title: String,

    /// Do not append the batch to history.
    #[arg(long, env = "QRBATCH_NO_HISTORY")]
    no_history: bool,

    /// History directory. Default: the platform data directory.
    #[arg(long, env = "QRBATCH_HISTORY_DIR")]
    history_dir: Option<PathBuf>,

    /// Print a JSON summary to stdout.
    #[arg(long, env = "QRBATCH_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "QRBATCH_NO_PROGRESS")]
    no_progress: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "QRBATCH_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(Args, Debug)]
struct HistoryArgs {
    #[command(subcommand)]
    action: Option<HistoryAction>,

    /// History directory. Default: the platform data directory.
    #[arg(long, global = true, env = "QRBATCH_HISTORY_DIR")]
    history_dir: Option<PathBuf>,

    /// Output JSON.
    #[arg(long, global = true, env = "QRBATCH_JSON")]
    json: bool,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum HistoryAction {
    /// The ten most recent codes (default).
    List,
    /// Total count and the three most recent codes.
    Stats,
    /// Delete all history.
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar gives all the feedback that matters during
    // `generate`, so INFO logs are suppressed while it is shown.
    let show_progress = match &cli.command {
        Command::Generate(g) => !cli.quiet && !g.no_progress && !g.json,
        _ => false,
    };
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "warn"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let result = match cli.command {
        Command::Preview(ref args) => run_preview(args, cli.quiet).await,
        Command::Generate(ref args) => run_generate(args, cli.quiet, show_progress).await,
        Command::History(ref args) => run_history(args, cli.quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", red("✘"), e);
            ExitCode::FAILURE
        }
    }
}

// ── preview ──────────────────────────────────────────────────────────────────

async fn run_preview(args: &PreviewArgs, quiet: bool) -> Result<()> {
    let dataset = load_dataset_with_timeout(&args.input, args.download_timeout)
        .await
        .context("Failed to load table")?;

    if args.json {
        let rows: Vec<serde_json::Map<String, serde_json::Value>> = dataset
            .preview(args.rows)
            .iter()
            .map(|r| {
                r.fields()
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap_or_default()))
                    .collect()
            })
            .collect();
        let summary = serde_json::json!({
            "source_name": dataset.source_name,
            "columns": dataset.columns,
            "total_rows": dataset.row_count(),
            "rows": rows,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise preview")?
        );
        return Ok(());
    }

    print_preview(&dataset, args.rows, quiet);
    Ok(())
}

fn print_preview(dataset: &Dataset, rows: usize, quiet: bool) {
    if !quiet {
        println!("File:     {}", bold(&dataset.source_name));
        println!(
            "Size:     {} rows × {} columns",
            dataset.row_count(),
            dataset.column_count()
        );
        println!();
    }
    println!(
        "{}",
        bold(
            &dataset
                .columns
                .iter()
                .map(|c| format!("{:<20}", truncate_preview(c, 17)))
                .collect::<String>()
        )
    );
    for record in dataset.preview(rows) {
        let line: String = record
            .fields()
            .iter()
            .map(|(_, v)| format!("{:<20}", truncate_preview(&v.to_string(), 17)))
            .collect();
        println!("{}", line.trim_end());
    }
    let remaining = dataset.row_count().saturating_sub(rows);
    if remaining > 0 {
        println!("{}", dim(&format!("... and {remaining} more rows")));
    }
}

// ── generate ─────────────────────────────────────────────────────────────────

async fn run_generate(args: &GenerateArgs, quiet: bool, show_progress: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };
    let config = build_config(args, progress_cb)?;

    // ── Upload → Preview ─────────────────────────────────────────────────
    let dataset = load_dataset_with_timeout(&args.input, args.download_timeout)
        .await
        .context("Failed to load table")?;
    let mut wizard = Wizard::new();
    wizard.load(dataset)?;

    // ── Preview → Configure ──────────────────────────────────────────────
    wizard.advance()?;
    if !args.columns.is_empty() {
        wizard
            .set_selection(ColumnSelection::from_columns(args.columns.iter().cloned()))
            .context("Invalid --column")?;
    }
    if !quiet && !args.json {
        eprintln!(
            "{} {}  {}",
            cyan("◆"),
            bold(&args.input),
            dim(&format!("columns: {}", wizard.selection().columns().join(", ")))
        );
    }

    // ── Configure → Export ───────────────────────────────────────────────
    let output = {
        let dataset = wizard
            .dataset()
            .context("Wizard lost its dataset")?;
        generate(dataset, wizard.selection(), &config)
            .await
            .context("QR generation failed")?
    };
    let source_name = output.source_name.clone();
    let gen_stats = output.stats.clone();
    wizard.finish_generation(output.entries)?;

    let path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(default_output_name()));
    let meta = ExportMetadata::new(&config.title, &source_name);
    let export_stats = export_to_file(wizard.entries(), &meta, &config.layout, &path)
        .await
        .context("PDF export failed")?;

    if args.json {
        let summary = serde_json::json!({
            "output": path.display().to_string(),
            "generation": gen_stats,
            "export": export_stats,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !quiet {
        eprintln!(
            "{}  {} codes  {} pages  {}ms  →  {}",
            green("✔"),
            export_stats.entry_count,
            export_stats.page_count,
            gen_stats.total_duration_ms,
            bold(&path.display().to_string()),
        );
        if !gen_stats.persisted {
            eprintln!("   {}", dim("history not updated"));
        }
    }
    Ok(())
}

/// Map CLI args to `GenerationConfig`.
fn build_config(args: &GenerateArgs, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .qr_size(args.size)
        .margin(args.margin)
        .dark_color(&args.dark)
        .light_color(&args.light)
        .title(&args.title);

    if !args.no_history {
        builder = builder.history(open_history(args.history_dir.as_ref())?);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

fn open_history(dir: Option<&PathBuf>) -> Result<HistoryStore> {
    match dir {
        Some(dir) => Ok(HistoryStore::open(dir)),
        None => HistoryStore::open_default().context("Failed to locate history"),
    }
}

// ── history ──────────────────────────────────────────────────────────────────

fn run_history(args: &HistoryArgs, quiet: bool) -> Result<()> {
    let store = open_history(args.history_dir.as_ref())?;

    match args.action.unwrap_or(HistoryAction::List) {
        HistoryAction::List => {
            let entries = store.load();
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&entries).context("Failed to serialise history")?
                );
            } else if entries.is_empty() {
                println!("{}", dim("No QR codes generated yet"));
            } else {
                for e in entries.iter().rev() {
                    println!(
                        "{}  {}  {}",
                        dim(&e.created_at.format("%Y-%m-%d %H:%M").to_string()),
                        cyan(&e.id),
                        truncate_preview(&e.payload, 50)
                    );
                }
            }
        }
        HistoryAction::Stats => {
            let total = store.total_count();
            let recent = store.recent(3);
            if args.json {
                let summary = serde_json::json!({ "total": total, "recent": recent });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary).context("Failed to serialise stats")?
                );
            } else {
                println!("Total QR codes:  {}", bold(&total.to_string()));
                for e in &recent {
                    println!(
                        "  {}  {}",
                        dim(&e.created_at.format("%Y-%m-%d %H:%M").to_string()),
                        truncate_preview(&e.payload, 50)
                    );
                }
            }
        }
        HistoryAction::Clear => {
            store.clear().context("Failed to clear history")?;
            if !quiet {
                eprintln!("{} History cleared", green("✔"));
            }
        }
    }
    Ok(())
}
