//! CLI subcommand implementations.

pub mod import;
