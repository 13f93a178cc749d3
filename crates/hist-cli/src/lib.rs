//! histdb-import CLI library.
//!
//! This crate provides the CLI interface for importing shell history.

mod cli;
pub mod commands;
mod config;

pub use cli::Cli;
pub use config::{Config, DEFAULT_IGNORE};
