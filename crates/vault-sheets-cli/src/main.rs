//! Vault Sheets CLI - upload spreadsheets and run calculations against a
//! file-backed workbook store

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use vault_sheets::prelude::*;

#[derive(Parser)]
#[command(name = "vault")]
#[command(
    author,
    version,
    about = "Serve spreadsheet calculators without exposing their formulas"
)]
struct Cli {
    /// Directory holding workbook records
    #[arg(long, global = true, env = "VAULT_SHEETS_STORE", default_value = "./vault-store")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest an XLSX or CSV file as a new workbook
    Upload {
        /// Spreadsheet file (xlsx, csv)
        file: PathBuf,

        /// Display name (default: "Uploaded Workbook")
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List stored workbooks, newest first
    List,

    /// Show the client view and initial values of a workbook
    Show {
        /// Workbook id ("default" for the built-in calculator)
        id: String,
    },

    /// Apply input values and print every result
    Calculate {
        id: String,

        /// Input value, e.g. --input B1=20 (repeatable)
        #[arg(short, long = "input", value_name = "ADDR=VALUE")]
        inputs: Vec<String>,
    },

    /// Explain formula errors and missing references
    Diagnose { id: String },

    /// Promote or demote a cell to/from input
    SetInput {
        id: String,
        address: String,
        #[arg(action = clap::ArgAction::Set)]
        is_input: bool,
    },

    /// Delete a stored workbook
    Delete { id: String },

    /// Evaluate a workbook and write the result as a DXF box
    ExportDxf {
        id: String,

        /// Input value, e.g. --input B1=20 (repeatable)
        #[arg(short, long = "input", value_name = "ADDR=VALUE")]
        inputs: Vec<String>,

        /// Output directory (default: current directory)
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let store = FileStore::open(&cli.store)
        .with_context(|| format!("Failed to open store '{}'", cli.store.display()))?;
    let mut service = CalculatorService::new(store);

    match cli.command {
        Commands::Upload { file, name } => upload(&mut service, &file, name.as_deref()),
        Commands::List => print_json(&service.list()?),
        Commands::Show { id } => print_json(
            &service
                .public_workbook(&id)
                .with_context(|| format!("Failed to load workbook '{}'", id))?,
        ),
        Commands::Calculate { id, inputs } => {
            let patch = parse_inputs(&inputs)?;
            let calc = service
                .calculate(&id, &patch)
                .with_context(|| format!("Failed to calculate workbook '{}'", id))?;
            print_json(&calc.results)
        }
        Commands::Diagnose { id } => {
            let report = service
                .diagnose(&id)
                .with_context(|| format!("Failed to diagnose workbook '{}'", id))?;
            eprintln!(
                "{} error(s), {} warning(s)",
                report.summary.error_cells, report.summary.warning_cells
            );
            print_json(&report)
        }
        Commands::SetInput {
            id,
            address,
            is_input,
        } => print_json(
            &service
                .set_cell_input(&id, &address, is_input)
                .with_context(|| format!("Failed to update {} in '{}'", address, id))?,
        ),
        Commands::Delete { id } => {
            service
                .delete(&id)
                .with_context(|| format!("Failed to delete workbook '{}'", id))?;
            eprintln!("Deleted '{}'", id);
            Ok(())
        }
        Commands::ExportDxf { id, inputs, out } => {
            let patch = parse_inputs(&inputs)?;
            let dxf = service
                .export_dxf(&id, &patch)
                .with_context(|| format!("Failed to export workbook '{}'", id))?;
            let path = out.join(&dxf.filename);
            std::fs::write(&path, &dxf.content)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            eprintln!("Wrote '{}'", path.display());
            Ok(())
        }
    }
}

fn upload(
    service: &mut CalculatorService<FileStore>,
    file: &Path,
    name: Option<&str>,
) -> Result<()> {
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read '{}'", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("'{}' has no file name", file.display()))?;

    let outcome = service
        .upload(&bytes, file_name, name)
        .with_context(|| format!("Failed to ingest '{}'", file.display()))?;

    eprintln!(
        "Stored '{}' ({} rows x {} columns)",
        outcome.workbook_id, outcome.config.rows, outcome.config.cols
    );
    print_json(&outcome)
}

/// Parse `ADDR=VALUE` pairs; values are read as JSON when possible, as text
/// otherwise
fn parse_inputs(pairs: &[String]) -> Result<InputPatch> {
    let mut patch = InputPatch::new();
    for pair in pairs {
        let Some((address, value)) = pair.split_once('=') else {
            bail!("Invalid input '{}', expected ADDR=VALUE", pair);
        };
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        patch.insert(address.trim().to_string(), value);
    }
    Ok(patch)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("Failed to encode output")?;
    writeln!(stdout).context("Failed to write to stdout")?;
    Ok(())
}
