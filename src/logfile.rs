//! Log file capability consumed by the indexing core.
//!
//! The engine never touches the filesystem itself: it talks to attached
//! files through the [`LogFile`] trait, which covers line access, message
//! grouping, and the re-observation handshake that drives incremental
//! indexing. [`BufferLogFile`] is the in-tree implementation over an
//! in-memory byte buffer.

pub mod buffer;

pub use buffer::BufferLogFile;

use crate::error::Result;
use crate::format::LogFormat;
use parking_lot::RwLock;
use std::borrow::Cow;
use std::sync::Arc;

/// Message severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Unknown,
    Trace,
    Debug,
    Info,
    Stats,
    Notice,
    Warning,
    Error,
    Critical,
    Fatal,
}

impl LogLevel {
    /// Parse a level token, case-insensitively.
    pub fn from_token(token: &str) -> Option<LogLevel> {
        let level = match token.to_ascii_uppercase().as_str() {
            "TRACE" => LogLevel::Trace,
            "DEBUG" => LogLevel::Debug,
            "INFO" => LogLevel::Info,
            "STATS" => LogLevel::Stats,
            "NOTICE" => LogLevel::Notice,
            "WARN" | "WARNING" => LogLevel::Warning,
            "ERROR" | "ERR" => LogLevel::Error,
            "CRITICAL" | "CRIT" => LogLevel::Critical,
            "FATAL" => LogLevel::Fatal,
            _ => return None,
        };
        Some(level)
    }

    /// True for the levels that land in the error bookmark set.
    pub fn is_error(self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Critical | LogLevel::Fatal)
    }
}

/// One indexed line of a log file.
///
/// Continuation lines inherit the timestamp and level of their message head
/// so that sorting keeps messages contiguous and level gates apply to whole
/// messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLine {
    millis: i64,
    level: LogLevel,
    sub_offset: u32,
    continued: bool,
    time_skewed: bool,
    marked: bool,
}

impl LogLine {
    pub fn head(millis: i64, level: LogLevel) -> Self {
        Self {
            millis,
            level,
            sub_offset: 0,
            continued: false,
            time_skewed: false,
            marked: false,
        }
    }

    pub fn continuation(head: &LogLine, sub_offset: u32) -> Self {
        Self {
            millis: head.millis,
            level: head.level,
            sub_offset,
            continued: true,
            time_skewed: false,
            marked: false,
        }
    }

    /// Timestamp in epoch milliseconds.
    pub fn time_millis(&self) -> i64 {
        self.millis
    }

    /// Timestamp in whole epoch seconds.
    pub fn time_secs(&self) -> i64 {
        self.millis.div_euclid(1000)
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Offset of this line within its message; zero for the head.
    pub fn sub_offset(&self) -> u32 {
        self.sub_offset
    }

    pub fn is_continued(&self) -> bool {
        self.continued
    }

    /// True when this line's native timestamp violated the file-local
    /// monotonic order at ingestion time.
    pub fn is_time_skewed(&self) -> bool {
        self.time_skewed
    }

    pub fn set_time_skewed(&mut self, skewed: bool) {
        self.time_skewed = skewed;
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    pub fn set_mark(&mut self, marked: bool) {
        self.marked = marked;
    }
}

/// Result of asking a file to re-observe itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveResult {
    /// Nothing changed since the last observation.
    NoNewLines,
    /// Lines were appended past the previous watermark.
    NewLines,
    /// Previously observed content changed; the file must be re-read.
    NewOrder,
    /// The format parser cannot interpret the file's bytes.
    Invalid,
}

/// Capability interface for one attached log file.
///
/// `rebuild_index` is the re-observation handshake: the engine calls it on
/// every un-paused tick, and the result drives the incremental merge versus
/// full rebuild decision.
pub trait LogFile: Send + Sync {
    fn filename(&self) -> &str;

    /// Shortest path suffix that distinguishes this file from its peers.
    fn unique_path(&self) -> &str;

    /// Number of observed lines.
    fn size(&self) -> usize;

    fn line(&self, index: usize) -> Option<&LogLine>;

    /// Read one line's text. The returned data must not be retained past
    /// the current row invocation.
    fn read_line(&self, index: usize) -> Result<Cow<'_, str>>;

    /// Read the full multi-line message containing `index`.
    fn read_full_message(&self, index: usize) -> Result<String>;

    /// Re-observe the underlying content, folding in appended lines.
    fn rebuild_index(&mut self) -> Result<ObserveResult>;

    fn longest_line_length(&self) -> usize;

    /// True when display timestamps have been adjusted away from the
    /// file's native clock.
    fn is_time_adjusted(&self) -> bool;

    fn format(&self) -> &dyn LogFormat;

    fn set_line_mark(&mut self, index: usize, marked: bool);
}

/// A log file shared between the view thread and worker threads.
pub type SharedLogFile = Arc<RwLock<dyn LogFile>>;

/// Wrap a concrete file for attachment to the indexer.
pub fn share<F: LogFile + 'static>(file: F) -> SharedLogFile {
    Arc::new(RwLock::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_tokens_parse_case_insensitively() {
        assert_eq!(LogLevel::from_token("error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_token("WARN"), Some(LogLevel::Warning));
        assert_eq!(LogLevel::from_token("Notice"), Some(LogLevel::Notice));
        assert_eq!(LogLevel::from_token("verbose"), None);
    }

    #[test]
    fn level_ordering_matches_severity() {
        assert!(LogLevel::Trace < LogLevel::Info);
        assert!(LogLevel::Warning < LogLevel::Error);
        assert!(LogLevel::Critical < LogLevel::Fatal);
        assert!(LogLevel::Error.is_error());
        assert!(!LogLevel::Warning.is_error());
    }

    #[test]
    fn continuation_inherits_head_fields() {
        let head = LogLine::head(5_000, LogLevel::Error);
        let cont = LogLine::continuation(&head, 2);

        assert_eq!(cont.time_millis(), 5_000);
        assert_eq!(cont.level(), LogLevel::Error);
        assert_eq!(cont.sub_offset(), 2);
        assert!(cont.is_continued());
        assert!(!head.is_continued());
    }

    #[test]
    fn time_secs_floors_toward_negative_infinity() {
        let line = LogLine::head(-1_500, LogLevel::Info);
        assert_eq!(line.time_secs(), -2);
    }
}
