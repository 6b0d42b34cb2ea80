//! Command-line interface for datatable-sync
//!
//! # Usage Examples
//!
//! ```bash
//! # Import with a settings file, failing on any diagnostic
//! datatable-sync import --schema items.yaml --input items.json \
//!   --config datatable.toml --strict
//!
//! # Export a window of rows read from an earlier grid export
//! datatable-sync export --schema items.yaml --input page.json --grid-input \
//!   --start-index 0 --max-count 100
//!
//! # Validate a schema file
//! datatable-sync check-schema --schema items.yaml
//! ```
//!
//! Set `RUST_LOG=debug` to trace every row and diagnostic.

use anyhow::Context;
use clap::{Parser, Subcommand};
use datatable_sync::{export_window, import_file, load_schema, PolicyOpts, Settings};
use std::path::PathBuf;
use table_core::RowStore;
use table_json::ImportReport;

#[derive(Parser)]
#[command(name = "datatable-sync")]
#[command(about = "Import and export schema-typed table rows as JSON")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a JSON file of rows and report diagnostics
    Import {
        /// Schema file (YAML)
        #[arg(long, value_name = "PATH", env = "DATATABLE_SCHEMA")]
        schema: PathBuf,

        /// JSON file with an array of row objects
        #[arg(long, value_name = "PATH")]
        input: PathBuf,

        /// Settings file (TOML)
        #[arg(long, value_name = "PATH", env = "DATATABLE_CONFIG")]
        config: Option<PathBuf>,

        /// Input holds exported grid rows instead of flat row objects
        #[arg(long)]
        grid_input: bool,

        #[command(flatten)]
        policy: PolicyOpts,

        /// Fail when any diagnostic is reported
        #[arg(long)]
        strict: bool,
    },

    /// Import a JSON file, then export a window of its rows as grid JSON
    Export {
        /// Schema file (YAML)
        #[arg(long, value_name = "PATH", env = "DATATABLE_SCHEMA")]
        schema: PathBuf,

        /// JSON file with an array of row objects
        #[arg(long, value_name = "PATH")]
        input: PathBuf,

        /// Settings file (TOML)
        #[arg(long, value_name = "PATH", env = "DATATABLE_CONFIG")]
        config: Option<PathBuf>,

        /// Input holds exported grid rows instead of flat row objects
        #[arg(long)]
        grid_input: bool,

        /// First row of the export window
        #[arg(long)]
        start_index: Option<usize>,

        /// Maximum number of rows to export
        #[arg(long)]
        max_count: Option<usize>,

        /// Row field exported as each row's path
        #[arg(long)]
        path_field: Option<String>,

        /// Export arrays and sets as string-encoded JSON arrays
        #[arg(long)]
        export_containers: bool,

        /// Output file (stdout when omitted)
        #[arg(long, value_name = "PATH")]
        output: Option<PathBuf>,

        #[command(flatten)]
        policy: PolicyOpts,

        /// Fail when any import diagnostic is reported
        #[arg(long)]
        strict: bool,
    },

    /// Validate a schema file
    CheckSchema {
        /// Schema file (YAML)
        #[arg(long, value_name = "PATH", env = "DATATABLE_SCHEMA")]
        schema: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Import {
            schema,
            input,
            config,
            grid_input,
            policy,
            strict,
        } => {
            let schemas = load_schema(&schema)?;
            let settings = Settings::load(config.as_deref())?;
            let options = policy.apply(settings.import);

            let grid_path_field = grid_input.then(|| settings.export.options.path_field_name(&schemas));

            let mut store = RowStore::new();
            let report = import_file(&schemas, &input, &options, grid_path_field, &mut store)?;
            print_diagnostics(&report);
            check_report(&report, strict)?;
            println!(
                "Imported {} rows with {} diagnostics",
                store.len(),
                report.diagnostics.len()
            );
        }
        Commands::Export {
            schema,
            input,
            config,
            grid_input,
            start_index,
            max_count,
            path_field,
            export_containers,
            output,
            policy,
            strict,
        } => {
            let schemas = load_schema(&schema)?;
            let settings = Settings::load(config.as_deref())?;
            let options = policy.apply(settings.import);

            let mut export = settings.export;
            if let Some(start_index) = start_index {
                export.start_index = start_index;
            }
            if max_count.is_some() {
                export.max_count = max_count;
            }
            if path_field.is_some() {
                export.options.path_field = path_field;
            }
            export.options.export_containers |= export_containers;

            let grid_path_field = grid_input.then(|| export.options.path_field_name(&schemas));

            let mut store = RowStore::new();
            let report = import_file(&schemas, &input, &options, grid_path_field, &mut store)?;
            print_diagnostics(&report);
            check_report(&report, strict)?;

            let json = export_window(&store, &schemas, &export)?;
            match output {
                Some(path) => std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write output file {path:?}"))?,
                None => println!("{json}"),
            }
        }
        Commands::CheckSchema { schema } => {
            let schemas = load_schema(&schema)?;
            println!(
                "Schema OK: row '{}', {} records, {} enums",
                schemas.row,
                schemas.records.len(),
                schemas.enums.len()
            );
        }
    }

    Ok(())
}

fn print_diagnostics(report: &ImportReport) {
    for message in report.diagnostics.iter() {
        eprintln!("{message}");
    }
}

fn check_report(report: &ImportReport, strict: bool) -> anyhow::Result<()> {
    if !report.ok {
        anyhow::bail!("Import failed");
    }
    if strict && !report.diagnostics.is_empty() {
        anyhow::bail!(
            "Import reported {} diagnostics (--strict)",
            report.diagnostics.len()
        );
    }
    Ok(())
}
