//! Import command for loading a shell history file into histdb.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use hist_core::{HistoryFormat, ImportSummary};
use hist_db::Database;

use crate::Config;

/// Flags overriding the loaded configuration.
#[derive(Debug, Default, Args)]
pub struct ImportArgs {
    /// Location of the database file.
    #[arg(long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Location of the history file, or `-` to read stdin.
    #[arg(long, value_name = "PATH")]
    pub history: Option<PathBuf>,

    /// Comma-separated commands to ignore during import.
    #[arg(long, value_name = "LIST")]
    pub ignore: Option<String>,

    /// Value for the host column.
    #[arg(long)]
    pub host: Option<String>,

    /// Directory recorded for imported commands.
    #[arg(long)]
    pub dir: Option<String>,

    /// Value for the session column.
    #[arg(long)]
    pub session: Option<i64>,

    /// Value for the `exit_status` column.
    #[arg(long, allow_negative_numbers = true)]
    pub exit_status: Option<i64>,

    /// How to detect timestamp metadata (auto, extended, plain).
    #[arg(long)]
    pub format: Option<HistoryFormat>,

    /// Keep every bare entry at the current time instead of spacing them out.
    #[arg(long)]
    pub no_preserve_order: bool,

    /// Print the import summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl ImportArgs {
    /// Applies command-line overrides on top of `config`.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(database) = &self.database {
            config.database_path.clone_from(database);
        }
        if let Some(history) = &self.history {
            config.history_path.clone_from(history);
        }
        if let Some(ignore) = &self.ignore {
            config.ignore.clone_from(ignore);
        }
        if let Some(host) = &self.host {
            config.host.clone_from(host);
        }
        if let Some(dir) = &self.dir {
            config.dir.clone_from(dir);
        }
        if let Some(session) = self.session {
            config.session = session;
        }
        if let Some(exit_status) = self.exit_status {
            config.exit_status = exit_status;
        }
        if let Some(format) = self.format {
            config.format = format;
        }
        if self.no_preserve_order {
            config.preserve_order = false;
        }
        config
    }
}

/// Runs the import described by `config`.
pub fn run(config: &Config) -> Result<ImportSummary> {
    let input = open_history(config)?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    let mut db = Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;

    let ctx = config.import_context(Utc::now().timestamp());
    tracing::debug!(
        ignore = %config.ignore,
        preserve_order = ctx.preserve_order,
        now = ctx.now,
        "starting import"
    );

    let summary = db
        .import_history(input, &ctx)
        .with_context(|| format!("failed to import {}", describe_source(config)))?;
    Ok(summary)
}

fn open_history(config: &Config) -> Result<Box<dyn BufRead>> {
    if config.reads_stdin() {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(&config.history_path)
        .with_context(|| format!("failed to open {}", config.history_path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn describe_source(config: &Config) -> String {
    if config.reads_stdin() {
        "stdin".to_string()
    } else {
        config.history_path.display().to_string()
    }
}

/// Formats the one-line human-readable summary.
pub fn render_summary(summary: &ImportSummary) -> String {
    let mut line = format!(
        "imported {} entries, skipped {} ignored",
        summary.inserted, summary.skipped
    );
    if let Some(base) = summary.base_timestamp {
        line.push_str(&format!(" (base timestamp {base})"));
    }
    line
}
