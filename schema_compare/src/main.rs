//! SchemaCompare CLI
//!
//! Compares two sets of schema definitions and prints the difference.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use schema_compare::config::{self, Config, LoggingConfig, OutputFormat};
use schema_compare::utils::logging::init_logging;
use schema_compare::SchemaCompareClient;

#[derive(Parser)]
#[command(name = "schema_compare")]
#[command(about = "Structural comparison of relational database schemas")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Report format: text, json or yaml
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Report added and removed columns or indexes instead of renames
    #[arg(long, global = true)]
    no_detect_renames: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the changes that turn FROM into TO
    Diff {
        /// Current schema definition file or directory
        from: PathBuf,
        /// Desired schema definition file or directory
        to: PathBuf,
    },

    /// Exit with status 1 when FROM and TO differ
    Check {
        /// Current schema definition file or directory
        from: PathBuf,
        /// Desired schema definition file or directory
        to: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(2);
        }
    }
}

/// Returns false when `check` found differences
fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = match &cli.config {
        Some(path) => config::load_from_file(&path.to_string_lossy())
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => Config::default(),
    };

    if let Some(format) = cli.format {
        config.output.format = format;
    }

    if cli.no_detect_renames {
        config.comparator.detect_column_renames = false;
        config.comparator.detect_index_renames = false;
    }

    if cli.verbose {
        let logging = config.logging.get_or_insert_with(LoggingConfig::default);
        logging.level = "debug".to_string();
        logging.stdout = false;
    }

    init_logging(&config.logging).context("initializing logging")?;

    let client = SchemaCompareClient::new(config)?;

    match cli.command {
        Commands::Diff { from, to } => {
            let diff = client
                .diff_paths(&from, &to)
                .with_context(|| format!("comparing {} with {}", from.display(), to.display()))?;
            print!("{}", client.render(diff)?);
            Ok(true)
        }
        Commands::Check { from, to } => {
            let diff = client
                .diff_paths(&from, &to)
                .with_context(|| format!("comparing {} with {}", from.display(), to.display()))?;

            if diff.is_empty() {
                println!("Schemas are in sync");
                return Ok(true);
            }

            print!("{}", client.render(diff)?);
            Ok(false)
        }
    }
}
