//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use hist_core::{HistoryFormat, IgnoreList, ImportContext, Place};
use serde::{Deserialize, Serialize};

/// Commands skipped unless configured otherwise.
pub const DEFAULT_IGNORE: &str = "cd,ls,top,htop";

/// Host recorded when the system hostname cannot be determined.
const UNKNOWN_HOST: &str = "UNKNOWN";

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the histdb database file.
    pub database_path: PathBuf,
    /// Path to the history file, or `-` for stdin.
    pub history_path: PathBuf,
    /// Comma-separated commands to skip.
    pub ignore: String,
    /// Value for the `host` column.
    pub host: String,
    /// Value for the `dir` column.
    pub dir: String,
    /// Value for the `session` column.
    pub session: i64,
    /// Value for the `exit_status` column.
    pub exit_status: i64,
    /// Synthesize increasing timestamps for entries without one.
    pub preserve_order: bool,
    /// How metadata prefixes are detected.
    pub format: HistoryFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("history_path", &self.history_path)
            .field("ignore", &self.ignore)
            .field("host", &self.host)
            .field("dir", &self.dir)
            .field("preserve_order", &self.preserve_order)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| UNKNOWN_HOST.to_string());
        Self {
            database_path: home.join(".histdb").join("zsh-history.db"),
            history_path: home.join(".zsh_history"),
            ignore: DEFAULT_IGNORE.to_string(),
            host,
            dir: home.display().to_string(),
            session: 0,
            exit_status: 0,
            preserve_order: true,
            format: HistoryFormat::Auto,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (HISTDB_IMPORT_*)
        figment = figment.merge(Env::prefixed("HISTDB_IMPORT_"));

        figment.extract()
    }

    /// Returns true when the history should be read from stdin.
    pub fn reads_stdin(&self) -> bool {
        self.history_path == Path::new("-")
    }

    /// Builds the per-run import context.
    pub fn import_context(&self, now: i64) -> ImportContext {
        ImportContext {
            ignore: IgnoreList::parse(&self.ignore),
            preserve_order: self.preserve_order,
            format: self.format,
            now,
            place: Place {
                host: self.host.clone(),
                dir: self.dir.clone(),
            },
            session: self.session,
            exit_status: self.exit_status,
        }
    }
}

/// Returns the platform-specific config directory for histdb-import.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("histdb-import"))
}
