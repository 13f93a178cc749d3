//! Entry parsing.
//!
//! Extended history entries look like `: <start>:<duration>;<command>`.
//! Plain histories carry the command alone.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::HistoryError;

const SEPARATOR: char = ';';
const FIELD_DELIMITER: char = ':';

/// How entries are told apart from bare commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFormat {
    /// Metadata when the entry starts with `: <start>:<duration>;` and both
    /// fields are integers. Anything else is a bare command.
    #[default]
    Auto,
    /// Every entry must carry integer start and duration fields.
    Extended,
    /// Every entry is a bare command.
    Plain,
}

impl HistoryFormat {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Extended => "extended",
            Self::Plain => "plain",
        }
    }
}

impl fmt::Display for HistoryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unknown history format name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown history format: {0}")]
pub struct UnknownFormat(String);

impl FromStr for HistoryFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "extended" => Ok(Self::Extended),
            "plain" => Ok(Self::Plain),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// A logical entry resolved to one of the two on-disk formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEntry {
    /// Entry with recorded start time and duration.
    Timestamped {
        started: String,
        duration: String,
        command: String,
    },
    /// Command without metadata.
    Bare { command: String },
}

impl ParsedEntry {
    /// Converts into a record, using `fallback` as the start time of bare entries.
    pub fn into_record(self, fallback: i64) -> ParsedRecord {
        match self {
            Self::Timestamped {
                started,
                duration,
                command,
            } => ParsedRecord {
                started,
                duration,
                command,
            },
            Self::Bare { command } => ParsedRecord {
                started: fallback.to_string(),
                duration: "0".to_string(),
                command,
            },
        }
    }
}

/// A history entry ready for insertion.
///
/// `started` and `duration` hold integer seconds as text, exactly as they
/// appeared in the source or as synthesized for bare entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRecord {
    pub started: String,
    pub duration: String,
    pub command: String,
}

/// Parses one logical entry.
pub fn parse_entry(entry: &str, format: HistoryFormat) -> Result<ParsedEntry, HistoryError> {
    let bare = || ParsedEntry::Bare {
        command: entry.to_string(),
    };

    if format == HistoryFormat::Plain {
        return Ok(bare());
    }

    let Some((prefix, command)) = entry.split_once(SEPARATOR) else {
        return match format {
            HistoryFormat::Extended => Err(HistoryError::MalformedEntry {
                entry: entry.to_string(),
            }),
            _ => Ok(bare()),
        };
    };

    match (split_metadata(prefix), format) {
        (Some(metadata), HistoryFormat::Auto) if !metadata.marked => Ok(bare()),
        (Some(metadata), _) => Ok(ParsedEntry::Timestamped {
            started: metadata.started.to_string(),
            duration: metadata.duration.to_string(),
            command: command.to_string(),
        }),
        (None, HistoryFormat::Auto) => Ok(bare()),
        (None, _) => Err(HistoryError::MalformedTimestamp {
            prefix: prefix.to_string(),
        }),
    }
}

/// Trimmed fields of a `<marker>:<start>:<duration>` prefix.
struct Metadata<'a> {
    /// The marker field is blank, i.e. the prefix starts with `:`.
    marked: bool,
    started: &'a str,
    duration: &'a str,
}

/// Splits a metadata prefix into its three fields.
///
/// Returns `None` unless there are exactly three fields and both the start
/// time and the duration are integers.
fn split_metadata(prefix: &str) -> Option<Metadata<'_>> {
    let mut fields = prefix.split(FIELD_DELIMITER);
    let (Some(marker), Some(started), Some(duration), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return None;
    };
    let (started, duration) = (started.trim(), duration.trim());
    if started.parse::<i64>().is_err() || duration.parse::<i64>().is_err() {
        return None;
    }
    Some(Metadata {
        marked: marker.trim().is_empty(),
        started,
        duration,
    })
}

/// Parses one logical entry straight into a record.
pub fn parse_record(
    entry: &str,
    fallback: i64,
    format: HistoryFormat,
) -> Result<ParsedRecord, HistoryError> {
    parse_entry(entry, format).map(|parsed| parsed.into_record(fallback))
}
