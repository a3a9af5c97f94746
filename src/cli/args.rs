//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, find::FindCommands, rfq::RfqCommands, update::UpdateCommands,
};

#[derive(Parser)]
#[command(name = "mpsync")]
#[command(author, version, about = "Manufacturing partner data toolkit")]
#[command(
    long_about = "Reconciles manufacturing partner records between the analytics store and the record store, and searches partners by capability, product, and location."
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Config file (default: .mpsync/config.yaml, then the global config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Push corrected values from the analytics store into the record store
    #[command(subcommand)]
    Update(UpdateCommands),

    /// Search partners by capability, product, and location
    #[command(subcommand)]
    Find(FindCommands),

    /// Browse and classify RFQ items
    #[command(subcommand)]
    Rfq(RfqCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (tsv tables)
    #[default]
    Auto,
    /// Tab-separated values (for piping)
    Tsv,
    /// CSV format (for spreadsheets)
    Csv,
    /// JSON format (for programming)
    Json,
    /// Markdown tables
    Md,
    /// Just names/ids, one per line
    Name,
}
