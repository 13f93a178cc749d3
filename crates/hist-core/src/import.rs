//! Import orchestration.
//!
//! Drives the [`LineReader`] and the parser over a history stream and hands
//! every accepted record to a [`HistorySink`].
//!
//! # Order preservation
//!
//! Bare entries have no timestamp of their own. When order preservation is
//! enabled, a first pass counts the entries that will be inserted while
//! capturing the raw input. The second pass replays the captured bytes and
//! gives the `n`-th accepted entry the start time `now - count + n`, so the
//! last entry lands just before `now` and every entry is one second after
//! the previous one.

use std::io::BufRead;

use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, SinkError};
use crate::ignore::IgnoreList;
use crate::parser::{HistoryFormat, ParsedRecord, parse_record};
use crate::reader::LineReader;

/// Host and directory recorded for every imported entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Place {
    pub host: String,
    pub dir: String,
}

/// Settings shared by every record of one import run.
#[derive(Debug, Clone)]
pub struct ImportContext {
    pub ignore: IgnoreList,
    pub preserve_order: bool,
    pub format: HistoryFormat,
    /// Current Unix timestamp in seconds.
    pub now: i64,
    pub place: Place,
    pub session: i64,
    pub exit_status: i64,
}

impl ImportContext {
    /// Creates a context with order preservation enabled and nothing ignored.
    pub fn new(place: Place, now: i64) -> Self {
        Self {
            ignore: IgnoreList::default(),
            preserve_order: true,
            format: HistoryFormat::default(),
            now,
            place,
            session: 0,
            exit_status: 0,
        }
    }
}

/// Destination for imported records.
pub trait HistorySink {
    fn insert(&mut self, record: &ParsedRecord, ctx: &ImportContext) -> Result<(), SinkError>;
}

impl HistorySink for Vec<ParsedRecord> {
    fn insert(&mut self, record: &ParsedRecord, _ctx: &ImportContext) -> Result<(), SinkError> {
        self.push(record.clone());
        Ok(())
    }
}

/// Outcome of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Records handed to the sink.
    pub inserted: usize,
    /// Records dropped by the ignore list.
    pub skipped: usize,
    /// First synthetic timestamp, set only when order was preserved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_timestamp: Option<i64>,
}

/// Imports every entry of `input` into `sink`.
///
/// Stops at the first read, parse or sink error. Records accepted before the
/// error have already reached the sink; undoing them is the sink's job.
pub fn import<R, S>(
    input: R,
    ctx: &ImportContext,
    sink: &mut S,
) -> Result<ImportSummary, HistoryError>
where
    R: BufRead,
    S: HistorySink + ?Sized,
{
    if !ctx.preserve_order {
        let decisions = Decisions::new(LineReader::new(input), ctx, Timeline::Fixed(ctx.now));
        return emit(decisions, ctx, sink);
    }

    let mut counting = Decisions::new(LineReader::capturing(input), ctx, Timeline::Fixed(ctx.now));
    let mut count: i64 = 0;
    for decision in counting.by_ref() {
        if let Decision::Insert(_) = decision? {
            count += 1;
        }
    }
    let replay = counting.into_reader().into_replay().unwrap_or_default();

    let base = ctx.now - count;
    tracing::debug!(count, base, bytes = replay.len(), "counted importable entries");
    if replay.is_empty() {
        return Ok(ImportSummary {
            base_timestamp: Some(base),
            ..ImportSummary::default()
        });
    }

    let decisions = Decisions::new(replay.reader(), ctx, Timeline::Sequential { base });
    let mut summary = emit(decisions, ctx, sink)?;
    summary.base_timestamp = Some(base);
    Ok(summary)
}

fn emit<R, S>(
    mut decisions: Decisions<'_, R>,
    ctx: &ImportContext,
    sink: &mut S,
) -> Result<ImportSummary, HistoryError>
where
    R: BufRead,
    S: HistorySink + ?Sized,
{
    let mut summary = ImportSummary::default();
    while let Some(decision) = decisions.next() {
        let line = decisions.line();
        match decision? {
            Decision::Insert(record) => {
                tracing::debug!(
                    line,
                    started = %record.started,
                    duration = %record.duration,
                    command = %record.command,
                    "inserting entry"
                );
                sink.insert(&record, ctx).map_err(HistoryError::Sink)?;
                summary.inserted += 1;
            }
            Decision::Skip(record) => {
                tracing::debug!(
                    line,
                    started = %record.started,
                    command = %record.command,
                    "skipping ignored entry"
                );
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}

/// Start times assigned to bare entries.
#[derive(Debug, Clone, Copy)]
enum Timeline {
    /// Every bare entry starts at the same instant.
    Fixed(i64),
    /// The `n`-th accepted entry starts at `base + n`.
    Sequential { base: i64 },
}

impl Timeline {
    const fn at(self, accepted: i64) -> i64 {
        match self {
            Self::Fixed(now) => now,
            Self::Sequential { base } => base + accepted,
        }
    }
}

#[derive(Debug)]
enum Decision {
    Insert(ParsedRecord),
    Skip(ParsedRecord),
}

/// Parsed, filtered entries of one pass.
struct Decisions<'a, R> {
    reader: LineReader<R>,
    ctx: &'a ImportContext,
    timeline: Timeline,
    accepted: i64,
}

impl<'a, R: BufRead> Decisions<'a, R> {
    const fn new(reader: LineReader<R>, ctx: &'a ImportContext, timeline: Timeline) -> Self {
        Self {
            reader,
            ctx,
            timeline,
            accepted: 0,
        }
    }

    fn into_reader(self) -> LineReader<R> {
        self.reader
    }

    /// Physical line on which the last entry ended.
    const fn line(&self) -> usize {
        self.reader.line()
    }
}

impl<R: BufRead> Iterator for Decisions<'_, R> {
    type Item = Result<Decision, HistoryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.reader.next()? {
                Ok(entry) => entry,
                Err(err) => return Some(Err(err)),
            };
            if entry.is_empty() {
                continue;
            }

            let fallback = self.timeline.at(self.accepted);
            let record = match parse_record(&entry, fallback, self.ctx.format) {
                Ok(record) => record,
                Err(err) => {
                    tracing::debug!(line = self.line(), "failed to parse entry");
                    return Some(Err(err));
                }
            };

            if self.ctx.ignore.contains(&record.command) {
                return Some(Ok(Decision::Skip(record)));
            }
            self.accepted += 1;
            return Some(Ok(Decision::Insert(record)));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Read};

    use super::*;

    fn context(now: i64) -> ImportContext {
        ImportContext::new(
            Place {
                host: "box".into(),
                dir: "/home/user".into(),
            },
            now,
        )
    }

    fn record(started: &str, duration: &str, command: &str) -> ParsedRecord {
        ParsedRecord {
            started: started.into(),
            duration: duration.into(),
            command: command.into(),
        }
    }

    fn run(input: &str, ctx: &ImportContext) -> (ImportSummary, Vec<ParsedRecord>) {
        let mut sink = Vec::new();
        let summary = import(input.as_bytes(), ctx, &mut sink).unwrap();
        (summary, sink)
    }

    /// Sink that fails on the n-th insert (1-based).
    struct FailingSink {
        fail_at: usize,
        seen: Vec<ParsedRecord>,
    }

    impl HistorySink for FailingSink {
        fn insert(&mut self, record: &ParsedRecord, _ctx: &ImportContext) -> Result<(), SinkError> {
            if self.seen.len() + 1 == self.fail_at {
                return Err("disk full".into());
            }
            self.seen.push(record.clone());
            Ok(())
        }
    }

    /// Reader that can only be consumed once, like a pipe.
    struct OneShot<'a> {
        data: &'a [u8],
        drained: bool,
    }

    impl Read for OneShot<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.drained {
                return Err(io::Error::other("stream read twice"));
            }
            let n = self.data.read(buf)?;
            if n == 0 {
                self.drained = true;
            }
            Ok(n)
        }
    }

    #[test]
    fn simple_mode_keeps_metadata_and_filters() {
        let mut ctx = context(50_000);
        ctx.preserve_order = false;
        ctx.ignore = IgnoreList::parse("cd");

        let (summary, records) = run(":1000:5;echo hi\ncd\n", &ctx);
        assert_eq!(records, vec![record("1000", "5", "echo hi")]);
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.base_timestamp, None);
    }

    #[test]
    fn simple_mode_uses_now_for_bare_entries() {
        let mut ctx = context(777);
        ctx.preserve_order = false;

        let (_, records) = run("foo\nbar\n", &ctx);
        assert_eq!(
            records,
            vec![record("777", "0", "foo"), record("777", "0", "bar")]
        );
    }

    #[test]
    fn preserving_order_rewinds_from_now() {
        let ctx = context(10_000);

        let (summary, records) = run("foo\nbar\n", &ctx);
        assert_eq!(summary.base_timestamp, Some(9998));
        assert_eq!(
            records,
            vec![record("9998", "0", "foo"), record("9999", "0", "bar")]
        );
    }

    #[test]
    fn preserving_order_is_one_second_apart() {
        let ctx = context(1_000_000);
        for k in [1_i64, 2, 7, 50] {
            let input: String = (0..k).map(|i| format!("cmd{i}\n")).collect();
            let (summary, records) = run(&input, &ctx);

            let base = 1_000_000 - k;
            assert_eq!(summary.base_timestamp, Some(base));
            let started: Vec<i64> = records.iter().map(|r| r.started.parse().unwrap()).collect();
            let expected: Vec<i64> = (0..k).map(|n| base + n).collect();
            assert_eq!(started, expected);
            let commands: Vec<String> = records.iter().map(|r| r.command.clone()).collect();
            let expected: Vec<String> = (0..k).map(|i| format!("cmd{i}")).collect();
            assert_eq!(commands, expected);
        }
    }

    #[test]
    fn ignored_entries_do_not_take_a_slot() {
        let mut ctx = context(100);
        ctx.ignore = IgnoreList::parse("ls,cd");

        let (summary, records) = run("ls\nmake\ncd\n\nmake test\nls\n", &ctx);
        assert_eq!(summary.base_timestamp, Some(98));
        assert_eq!(summary.skipped, 3);
        assert_eq!(
            records,
            vec![record("98", "0", "make"), record("99", "0", "make test")]
        );
    }

    #[test]
    fn timestamped_entries_keep_metadata_when_preserving_order() {
        let ctx = context(100);

        let (summary, records) = run(": 10:2;early\nbare\n", &ctx);
        assert_eq!(summary.base_timestamp, Some(98));
        assert_eq!(
            records,
            vec![record("10", "2", "early"), record("99", "0", "bare")]
        );
    }

    #[test]
    fn ignore_matching_is_exact() {
        let mut ctx = context(100);
        ctx.preserve_order = false;
        ctx.ignore = IgnoreList::parse("ls");

        let (_, records) = run("ls -la\nls\n", &ctx);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].command, "ls -la");
    }

    #[test]
    fn empty_input_emits_nothing() {
        let ctx = context(100);
        let (summary, records) = run("", &ctx);
        assert!(records.is_empty());
        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.base_timestamp, Some(100));
    }

    #[test]
    fn trailing_comma_does_not_ignore_empty_commands() {
        let mut ctx = context(100);
        ctx.ignore = IgnoreList::parse("cd,");
        let (summary, records) = run(": 1:0;\n: 2:0;cd\n", &ctx);
        assert_eq!(records, vec![record("1", "0", "")]);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn only_ignored_entries_emit_nothing() {
        let mut ctx = context(100);
        ctx.ignore = IgnoreList::parse("cd");
        let (summary, records) = run("cd\n\ncd\n", &ctx);
        assert!(records.is_empty());
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.base_timestamp, Some(100));
    }

    #[test]
    fn multiline_entries_are_joined() {
        let mut ctx = context(100);
        ctx.preserve_order = false;

        let (_, records) = run(": 5:1;echo a\\\necho b\nls\n", &ctx);
        assert_eq!(
            records,
            vec![record("5", "1", "echo a\necho b"), record("100", "0", "ls")]
        );
    }

    #[test]
    fn trailing_partial_entry_is_imported() {
        let ctx = context(100);
        let (summary, records) = run("ls\necho a\\", &ctx);
        assert_eq!(summary.base_timestamp, Some(98));
        assert_eq!(records[1], record("99", "0", "echo a\n"));
    }

    #[test]
    fn parse_error_in_pre_pass_emits_nothing() {
        let mut ctx = context(100);
        let mut sink = Vec::new();
        ctx.format = HistoryFormat::Extended;
        let err = import(": 1:0;foo\n: 1:2:3;bad\n: 2:0;bar\n".as_bytes(), &ctx, &mut sink)
            .unwrap_err();
        assert!(matches!(err, HistoryError::MalformedTimestamp { .. }));
        assert!(sink.is_empty());
    }

    #[test]
    fn parse_error_in_simple_mode_stops_import() {
        let mut ctx = context(100);
        ctx.preserve_order = false;
        let mut sink = Vec::new();
        ctx.format = HistoryFormat::Extended;
        let err = import(": 1:0;foo\n: 1;bad\n: 2:0;bar\n".as_bytes(), &ctx, &mut sink)
            .unwrap_err();
        assert!(matches!(err, HistoryError::MalformedTimestamp { .. }));
        assert_eq!(sink, vec![record("1", "0", "foo")]);
    }

    #[test]
    fn extended_format_rejects_bare_entries() {
        let mut ctx = context(100);
        ctx.format = HistoryFormat::Extended;
        let mut sink = Vec::new();
        let err = import(": 1:0;ok\nbare\n".as_bytes(), &ctx, &mut sink).unwrap_err();
        assert!(matches!(err, HistoryError::MalformedEntry { .. }));
    }

    #[test]
    fn invalid_utf8_aborts_import() {
        let ctx = context(100);
        let mut sink = Vec::new();
        let input: &[u8] = b"ok\n\xc3\x28\n";
        let err = import(input, &ctx, &mut sink).unwrap_err();
        assert!(matches!(err, HistoryError::Read { line: 2, .. }));
        assert!(sink.is_empty());
    }

    #[test]
    fn sink_error_stops_import() {
        let ctx = context(100);
        let mut sink = FailingSink {
            fail_at: 3,
            seen: Vec::new(),
        };
        let err = import("a\nb\nc\nd\ne\n".as_bytes(), &ctx, &mut sink).unwrap_err();
        assert!(matches!(err, HistoryError::Sink(_)));
        assert_eq!(sink.seen.len(), 2);
    }

    #[test]
    fn source_is_read_only_once() {
        let ctx = context(100);
        let input = io::BufReader::new(OneShot {
            data: b"foo\nbar\n",
            drained: false,
        });
        let mut sink = Vec::new();
        let summary = import(input, &ctx, &mut sink).unwrap();
        assert_eq!(summary.inserted, 2);
    }

    #[test]
    fn summary_serializes_without_base_in_simple_mode() {
        let summary = ImportSummary {
            inserted: 3,
            skipped: 1,
            base_timestamp: None,
        };
        let json = serde_json::to_string(&summary).unwrap();
        assert_eq!(json, r#"{"inserted":3,"skipped":1}"#);
    }
}
