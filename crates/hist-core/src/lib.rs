//! Core logic for importing shell history.
//!
//! This crate contains:
//! - Line reading: joining continuation lines into logical entries
//! - Entry parsing: extended (`: start:duration;cmd`) and bare entries
//! - Import: ignore filtering and order-preserving timestamp synthesis

mod error;
pub mod ignore;
pub mod import;
pub mod parser;
pub mod reader;

pub use error::{HistoryError, SinkError};
pub use ignore::IgnoreList;
pub use import::{HistorySink, ImportContext, ImportSummary, Place, import};
pub use parser::{
    HistoryFormat, ParsedEntry, ParsedRecord, UnknownFormat, parse_entry, parse_record,
};
pub use reader::{LineReader, ReplayBuffer};
