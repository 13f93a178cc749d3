//! Error types for history reading, parsing and import.

use std::io;

use thiserror::Error;

/// Boxed error returned by a [`HistorySink`](crate::HistorySink).
pub type SinkError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that abort a history import.
///
/// None of these are recovered locally. The caller is expected to roll back
/// whatever the sink accepted during the same run.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// The source stream could not be read or was not valid UTF-8.
    #[error("failed to read history line {line}")]
    Read {
        line: usize,
        #[source]
        source: io::Error,
    },

    /// An entry without the `;` separator where metadata is required.
    #[error("unable to parse entry: {entry}")]
    MalformedEntry { entry: String },

    /// The metadata prefix did not have exactly three `:`-delimited fields.
    #[error("unable to parse timestamp: {prefix}")]
    MalformedTimestamp { prefix: String },

    /// The sink rejected a record.
    #[error("failed to insert history entry")]
    Sink(#[source] SinkError),
}
