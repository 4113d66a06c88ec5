//! lspjump CLI
//!
//! Looks up definitions and references through an external language
//! server and prints jump targets as `path:line:column`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use lspjump::{format_location, Config, Session};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lspjump")]
#[command(about = "Jump-to-definition lookups against an LSP language server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project root the language server is started for
    #[arg(short = 'd', long, default_value = ".")]
    root: PathBuf,

    /// Configuration file (JSON) with per-language server definitions
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the definition of the symbol at FILE LINE COLUMN (1-based)
    Definition {
        file: PathBuf,
        line: u32,
        column: u32,
    },

    /// List references to the symbol at FILE LINE COLUMN (1-based)
    References {
        file: PathBuf,
        line: u32,
        column: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let root = cli.root.canonicalize()?;
    let mut session = Session::new(root, config);

    match cli.command {
        Commands::Definition { file, line, column } => {
            let locations = session
                .definition(&file, line.saturating_sub(1), column.saturating_sub(1))
                .await?;
            match locations.first() {
                Some(location) => println!("{}", format_location(location)),
                None => anyhow::bail!("no definition found"),
            }
        }
        Commands::References { file, line, column } => {
            let locations = session
                .references(&file, line.saturating_sub(1), column.saturating_sub(1))
                .await?;
            if locations.is_empty() {
                anyhow::bail!("no references found");
            }
            for location in &locations {
                println!("{}", format_location(location));
            }
        }
    }

    session.shutdown_all();
    Ok(())
}
