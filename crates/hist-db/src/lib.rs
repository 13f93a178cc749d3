//! Storage layer for histdb-import.
//!
//! Writes imported history into a zsh-histdb compatible `SQLite` database
//! using `rusqlite`.
//!
//! # Schema
//!
//! - `commands`: one row per distinct command line (`argv`)
//! - `places`: one row per distinct `(host, dir)` pair
//! - `history`: one row per executed command, referencing both
//!
//! `commands` and `places` deduplicate through `ON CONFLICT IGNORE`
//! constraints, so importing the same history twice adds `history` rows but
//! no new commands or places.
//!
//! # Atomicity
//!
//! [`Database::import_history`] runs a whole import inside one transaction.
//! The transaction is committed only after the import succeeds; on any error
//! it is dropped, which rolls back every row written during the run.

use std::io::BufRead;
use std::path::Path;

use hist_core::{HistoryError, HistorySink, ImportContext, ImportSummary, ParsedRecord, SinkError};
use rusqlite::{Connection, Statement, Transaction, params};
use thiserror::Error;

/// Schema version used by zsh-histdb for this table layout.
const HISTDB_USER_VERSION: i64 = 2;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The import was aborted; nothing from the run was committed.
    #[error("history import failed")]
    Import(#[from] HistoryError),
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

/// A history row joined with its command and place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub session: i64,
    pub argv: String,
    pub host: String,
    pub dir: String,
    pub exit_status: i64,
    pub start_time: i64,
    pub duration: i64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is created on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an existing histdb database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS commands (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                argv TEXT,
                UNIQUE(argv) ON CONFLICT IGNORE
            );

            CREATE TABLE IF NOT EXISTS places (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                host TEXT,
                dir TEXT,
                UNIQUE(host, dir) ON CONFLICT IGNORE
            );

            -- start_time: Unix epoch seconds
            -- duration: seconds
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session INT,
                command_id INT REFERENCES commands (id),
                place_id INT REFERENCES places (id),
                exit_status INT,
                start_time INT,
                duration INT
            );

            CREATE INDEX IF NOT EXISTS history_command_place ON history(command_id, place_id);
            ",
        )?;

        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version == 0 {
            self.conn
                .execute_batch(&format!("PRAGMA user_version = {HISTDB_USER_VERSION};"))?;
        }
        Ok(())
    }

    /// Imports a history stream in a single transaction.
    ///
    /// Either every accepted entry is committed or, on any error, none is.
    pub fn import_history<R: BufRead>(
        &mut self,
        input: R,
        ctx: &ImportContext,
    ) -> Result<ImportSummary, DbError> {
        let tx = self.conn.transaction()?;
        let summary = {
            let mut sink = TransactionSink::prepare(&tx)?;
            hist_core::import(input, ctx, &mut sink)?
        };
        tx.commit()?;

        tracing::info!(
            inserted = summary.inserted,
            skipped = summary.skipped,
            base_timestamp = ?summary.base_timestamp,
            "committed history import"
        );
        Ok(summary)
    }

    /// Lists history rows in insertion order.
    pub fn list_history(&self) -> Result<Vec<HistoryRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT history.session, commands.argv, places.host, places.dir,
                   history.exit_status, history.start_time, history.duration
            FROM history
            JOIN commands ON commands.id = history.command_id
            JOIN places ON places.id = history.place_id
            ORDER BY history.id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(HistoryRow {
                session: row.get(0)?,
                argv: row.get(1)?,
                host: row.get(2)?,
                dir: row.get(3)?,
                exit_status: row.get(4)?,
                start_time: row.get(5)?,
                duration: row.get(6)?,
            })
        })?;
        let mut history = Vec::new();
        for row in rows {
            history.push(row?);
        }
        Ok(history)
    }

    /// Counts rows in the `history` table.
    pub fn count_history(&self) -> Result<i64, DbError> {
        self.count("history")
    }

    /// Counts distinct stored commands.
    pub fn count_commands(&self) -> Result<i64, DbError> {
        self.count("commands")
    }

    /// Counts distinct stored places.
    pub fn count_places(&self) -> Result<i64, DbError> {
        self.count("places")
    }

    fn count(&self, table: &'static str) -> Result<i64, DbError> {
        let count = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?;
        Ok(count)
    }
}

/// Sink writing into an open transaction through prepared statements.
struct TransactionSink<'tx> {
    command: Statement<'tx>,
    place: Statement<'tx>,
    history: Statement<'tx>,
}

impl<'tx> TransactionSink<'tx> {
    fn prepare(tx: &'tx Transaction<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            command: tx.prepare("INSERT OR IGNORE INTO commands (argv) VALUES (?)")?,
            place: tx.prepare("INSERT OR IGNORE INTO places (host, dir) VALUES (?, ?)")?,
            history: tx.prepare(
                "
                INSERT INTO history (session, command_id, place_id, exit_status, start_time, duration)
                SELECT ?, commands.rowid, places.rowid, ?, ?, ?
                FROM commands, places
                WHERE commands.argv = ? AND places.host = ? AND places.dir = ?
                ",
            )?,
        })
    }
}

impl HistorySink for TransactionSink<'_> {
    fn insert(&mut self, record: &ParsedRecord, ctx: &ImportContext) -> Result<(), SinkError> {
        let place = &ctx.place;
        self.command.execute(params![record.command])?;
        self.place.execute(params![place.host, place.dir])?;
        self.history.execute(params![
            ctx.session,
            ctx.exit_status,
            record.started,
            record.duration,
            record.command,
            place.host,
            place.dir,
        ])?;
        Ok(())
    }
}
