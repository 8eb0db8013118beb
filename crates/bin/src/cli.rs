//! CLI argument definitions for the fieldtext binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per event, followed by the final text
    Text,
    /// A single JSON report
    Json,
}

/// Observable text field playground
#[derive(Parser, Debug)]
#[command(name = "fieldtext")]
#[command(about = "Replay edit scripts against an observable text field")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "text", env = "FIELDTEXT_FORMAT")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply a JSON edit script to a fresh in-memory record
    Replay(ReplayArgs),
}

/// Arguments for the replay command
#[derive(clap::Args, Debug)]
pub struct ReplayArgs {
    /// Path to a JSON array of edit requests, e.g.
    /// `[{"op": "insert", "index": 0, "text": "hi"}]`
    pub script: PathBuf,

    /// Text the record starts with
    #[arg(short, long, default_value = "")]
    pub initial: String,

    /// Table holding the record
    #[arg(long, default_value = "notes", env = "FIELDTEXT_TABLE")]
    pub table: String,

    /// Text field the script edits
    #[arg(long, default_value = "body", env = "FIELDTEXT_FIELD")]
    pub field: String,
}
