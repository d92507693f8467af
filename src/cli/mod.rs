pub mod commands;
pub mod errors;
pub mod output;

use crate::config::{CliArgs, SyncConfig};
use crate::reconcile::StructuralOp;
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "sheet-sync-cli",
    version,
    about = "Edit a worksheet snapshot through the batched-flush engine"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub compact: bool,

    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(flatten)]
    pub sync: CliArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create an empty worksheet snapshot.
    Init {
        file: PathBuf,
        #[arg(long, default_value = "Sheet1")]
        name: String,
        #[arg(long)]
        force: bool,
    },
    /// Print the cells of a snapshot, or the committed values of one range.
    Show {
        file: PathBuf,
        #[arg(long)]
        range: Option<String>,
    },
    /// Apply shorthand edits (`A1=42`, `B1==SUM(A1:A2)`, `A1!fmt=0.00`, `row:3!hidden=true`) and flush.
    Edit {
        file: PathBuf,
        edits: Vec<String>,
        #[arg(long, help = "Include the surface call journal in the output")]
        journal: bool,
    },
    /// Insert rows before the given 1-based row.
    InsertRows {
        file: PathBuf,
        row: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
        #[arg(long)]
        journal: bool,
    },
    DeleteRows {
        file: PathBuf,
        row: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
        #[arg(long)]
        journal: bool,
    },
    /// Insert columns before the given column (letters or 1-based number).
    InsertCols {
        file: PathBuf,
        column: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
        #[arg(long)]
        journal: bool,
    },
    DeleteCols {
        file: PathBuf,
        column: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
        #[arg(long)]
        journal: bool,
    },
}

pub async fn run_command(command: Commands, config: &SyncConfig) -> Result<Value> {
    match command {
        Commands::Init { file, name, force } => commands::sheet::init(file, name, force),
        Commands::Show { file, range } => commands::sheet::show(file, range, config).await,
        Commands::Edit {
            file,
            edits,
            journal,
        } => commands::edit::edit(file, edits, journal, config).await,
        Commands::InsertRows {
            file,
            row,
            count,
            journal,
        } => {
            commands::structure::structural(file, StructuralOp::InsertRows, row, count, journal, config)
                .await
        }
        Commands::DeleteRows {
            file,
            row,
            count,
            journal,
        } => {
            commands::structure::structural(file, StructuralOp::DeleteRows, row, count, journal, config)
                .await
        }
        Commands::InsertCols {
            file,
            column,
            count,
            journal,
        } => {
            commands::structure::structural(
                file,
                StructuralOp::InsertColumns,
                column,
                count,
                journal,
                config,
            )
            .await
        }
        Commands::DeleteCols {
            file,
            column,
            count,
            journal,
        } => {
            commands::structure::structural(
                file,
                StructuralOp::DeleteColumns,
                column,
                count,
                journal,
                config,
            )
            .await
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = SyncConfig::from_args(cli.sync.clone())?;
    let payload = run_command(cli.command, &config).await?;
    output::emit_value(&payload, cli.compact, cli.quiet)
}
