//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::import::ImportArgs;

/// Import a shell history file into a histdb `SQLite` database.
///
/// Entries without timestamps keep their original order: they are given
/// consecutive start times ending at the current time.
#[derive(Debug, Parser)]
#[command(name = "histdb-import", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub import: ImportArgs,
}
