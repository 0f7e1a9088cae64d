//! sheetport CLI - export workbook sheets to delimited text via Excel automation

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use sheetport::{run_export, ExportFormat, ExportRequest};
use sheetport_host::{ExcelHost, ExcelHostConfig};

#[derive(Parser)]
#[command(name = "sheetport")]
#[command(
    author,
    version,
    about = "Export workbook sheets to CSV or tab-delimited text using Excel"
)]
struct Cli {
    /// Input workbook file (xlsx, xls, ...)
    input: PathBuf,

    /// Output file base name/directory (default: input's directory and
    /// basename). A trailing .csv/.txt is stripped before the format
    /// extension is appended.
    output: Option<PathBuf>,

    /// Export only the sheet with this name
    #[arg(short, long, conflicts_with = "index")]
    sheet: Option<String>,

    /// Export only the sheet at this 1-based position
    #[arg(short, long)]
    index: Option<u32>,

    /// Recalculate the workbook (refresh all data connections) before export
    #[arg(short, long)]
    refresh: bool,

    /// Export as tab-delimited .txt instead of .csv
    #[arg(short, long)]
    text: bool,

    /// Use the regional list separator (commonly ';') instead of ','
    #[arg(short, long)]
    locale_delimiter: bool,

    /// Path to sheetport-bridge.exe (default: next to this binary)
    #[arg(long)]
    bridge_exe: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let request = ExportRequest {
        input: cli.input,
        output: cli.output,
        sheet_name: cli.sheet,
        sheet_index: cli.index,
        refresh: cli.refresh,
        format: if cli.text {
            ExportFormat::DelimitedText
        } else {
            ExportFormat::CommaOrSemicolonSeparated
        },
        locale_delimiter: cli.locale_delimiter,
    };

    let host = ExcelHost::start(ExcelHostConfig {
        bridge_exe_path: cli.bridge_exe,
        ..Default::default()
    })
    .context("Failed to start the Excel automation host")?;

    let outcome = run_export(host, &request).context("Export failed")?;

    for file in &outcome.written {
        eprintln!("Wrote '{}'", file.display());
    }

    Ok(())
}
