//! Log format capability: line classification, annotation, and scrubbing.
//!
//! A [`LogFormat`] teaches the engine how to read one family of log files:
//! how to tell message heads from continuation lines while ingesting, where
//! the timestamp/level/body ranges sit inside a rendered line, and which
//! field values deserve identifier tinting. The indexing core treats formats
//! as opaque capabilities; [`PrefixFormat`] is the reference implementation
//! used by hosts with conventional `TIMESTAMP LEVEL body` lines and by the
//! test suite.

use crate::error::{LogweaveError, Result};
use crate::logfile::LogLevel;
use chrono::NaiveDateTime;
use std::ops::Range;

/// Structural range kinds produced by [`LogFormat::annotate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    /// The timestamp text at the head of the line.
    Timestamp,
    /// The level token, when one was recognized.
    Level,
    /// The free-form message body.
    Body,
    /// The entire line as read from the file.
    OriginalLine,
}

/// A structural annotation over a byte range of a rendered line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineAttr {
    pub range: Range<usize>,
    pub kind: AttrKind,
}

/// A parsed field value with its origin range inside the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineValue {
    pub name: String,
    pub value: String,
    pub origin: Range<usize>,
    /// Identifier values get a stable tint derived from their content.
    pub identifier: bool,
    pub hidden: bool,
    /// Which line of a multi-line message this value came from.
    pub sub_offset: u32,
}

/// Outcome of classifying one raw line during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The line starts a new message.
    Head { millis: i64, level: LogLevel },
    /// The line continues the previous message.
    Continuation,
}

/// Per-format capability consumed by the indexing core.
///
/// Implementations must be cheap to call per line; `scan` runs once for
/// every ingested line and `annotate` once per rendered row.
pub trait LogFormat: Send + Sync {
    /// Short format name, surfaced as a row attribute.
    fn name(&self) -> &str;

    /// Classify a raw line as a message head or a continuation.
    ///
    /// An error means the bytes are not interpretable under this format at
    /// all; the owning file transitions to the invalid state.
    fn scan(&self, line: &[u8]) -> Result<ScanOutcome>;

    /// Compute structural ranges and field values for a rendered line.
    fn annotate(&self, body: &str) -> (Vec<LineAttr>, Vec<LineValue>);

    /// Remove artifacts (control characters, escape sequences) in place.
    fn scrub(&self, _value: &mut String) {}

    /// True when the native timestamp is machine oriented (epoch numbers,
    /// year-less syslog stamps) and should be rewritten to the canonical
    /// human form on display.
    fn is_machine_oriented(&self) -> bool {
        false
    }
}

/// Timestamp notation accepted by [`PrefixFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampStyle {
    /// `2023-01-02 03:04:05.678` (or without the fractional part).
    Canonical,
    /// `Jan  2 03:04:05` syslog style; carries no year, so it is pinned to
    /// the epoch year and treated as machine oriented.
    Syslog,
    /// A leading integer of epoch milliseconds.
    EpochMillis,
}

/// Reference format for `TIMESTAMP [LEVEL] body` lines.
///
/// Continuation lines are those whose head position does not parse as a
/// timestamp. Body tokens of the shape `key=value` become identifier field
/// values.
#[derive(Debug, Clone)]
pub struct PrefixFormat {
    name: String,
    style: TimestampStyle,
}

const CANONICAL_WITH_MILLIS: usize = 23;
const CANONICAL_SECONDS: usize = 19;
const SYSLOG_LEN: usize = 15;

impl PrefixFormat {
    pub fn new(style: TimestampStyle) -> Self {
        let name = match style {
            TimestampStyle::Canonical => "prefix/canonical",
            TimestampStyle::Syslog => "prefix/syslog",
            TimestampStyle::EpochMillis => "prefix/epoch",
        };
        Self {
            name: name.to_string(),
            style,
        }
    }

    /// Try to read a timestamp at the head of `line`.
    ///
    /// Returns the matched length and the parsed epoch milliseconds.
    fn parse_timestamp(&self, line: &str) -> Option<(usize, i64)> {
        match self.style {
            TimestampStyle::Canonical => {
                if let Some(head) = line.get(..CANONICAL_WITH_MILLIS) {
                    if let Ok(dt) = NaiveDateTime::parse_from_str(head, "%Y-%m-%d %H:%M:%S%.3f") {
                        return Some((CANONICAL_WITH_MILLIS, dt.and_utc().timestamp_millis()));
                    }
                }
                if let Some(head) = line.get(..CANONICAL_SECONDS) {
                    if let Ok(dt) = NaiveDateTime::parse_from_str(head, "%Y-%m-%d %H:%M:%S") {
                        return Some((CANONICAL_SECONDS, dt.and_utc().timestamp_millis()));
                    }
                }
                None
            }
            TimestampStyle::Syslog => {
                let head = line.get(..SYSLOG_LEN)?;
                // Syslog stamps carry no year; pin to the epoch year so the
                // arithmetic stays deterministic.
                let pinned = format!("1970 {head}");
                NaiveDateTime::parse_from_str(&pinned, "%Y %b %e %H:%M:%S")
                    .ok()
                    .map(|dt| (SYSLOG_LEN, dt.and_utc().timestamp_millis()))
            }
            TimestampStyle::EpochMillis => {
                let digits = line.bytes().take_while(|b| b.is_ascii_digit()).count();
                if digits == 0 || digits > 16 {
                    return None;
                }
                line[..digits].parse::<i64>().ok().map(|ms| (digits, ms))
            }
        }
    }

    /// Read the level token following the timestamp, if one is present.
    fn parse_level(line: &str, after_ts: usize) -> Option<(Range<usize>, LogLevel)> {
        let rest = line.get(after_ts..)?;
        let trimmed = rest.trim_start_matches(' ');
        let start = after_ts + (rest.len() - trimmed.len());
        let token_len = trimmed
            .bytes()
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        if token_len == 0 {
            return None;
        }
        let level = LogLevel::from_token(&trimmed[..token_len])?;
        Some((start..start + token_len, level))
    }
}

impl LogFormat for PrefixFormat {
    fn name(&self) -> &str {
        &self.name
    }

    fn scan(&self, line: &[u8]) -> Result<ScanOutcome> {
        let text = std::str::from_utf8(line)
            .map_err(|e| LogweaveError::file_invalid(format!("not UTF-8: {e}")))?;

        match self.parse_timestamp(text) {
            Some((ts_len, millis)) => {
                let level = Self::parse_level(text, ts_len)
                    .map(|(_, lvl)| lvl)
                    .unwrap_or(LogLevel::Unknown);
                Ok(ScanOutcome::Head { millis, level })
            }
            None => Ok(ScanOutcome::Continuation),
        }
    }

    fn annotate(&self, body: &str) -> (Vec<LineAttr>, Vec<LineValue>) {
        let mut attrs = Vec::new();
        let mut values = Vec::new();

        attrs.push(LineAttr {
            range: 0..body.len(),
            kind: AttrKind::OriginalLine,
        });

        let Some((ts_len, _)) = self.parse_timestamp(body) else {
            // Continuation line: the whole thing is body.
            attrs.push(LineAttr {
                range: 0..body.len(),
                kind: AttrKind::Body,
            });
            return (attrs, values);
        };

        attrs.push(LineAttr {
            range: 0..ts_len,
            kind: AttrKind::Timestamp,
        });

        let body_start = match Self::parse_level(body, ts_len) {
            Some((range, _)) => {
                let end = range.end;
                attrs.push(LineAttr {
                    range,
                    kind: AttrKind::Level,
                });
                (end + 1).min(body.len())
            }
            None => (ts_len + 1).min(body.len()),
        };

        attrs.push(LineAttr {
            range: body_start..body.len(),
            kind: AttrKind::Body,
        });

        // key=value tokens in the body become identifier fields.
        let mut pos = body_start;
        for token in body.get(body_start..).unwrap_or("").split(' ') {
            if let Some(eq) = token.find('=') {
                if eq > 0 && eq + 1 < token.len() {
                    values.push(LineValue {
                        name: token[..eq].to_string(),
                        value: token[eq + 1..].to_string(),
                        origin: pos..pos + token.len(),
                        identifier: true,
                        hidden: false,
                        sub_offset: 0,
                    });
                }
            }
            pos += token.len() + 1;
        }

        (attrs, values)
    }

    fn scrub(&self, value: &mut String) {
        if value.chars().any(|c| c.is_control()) {
            *value = value.chars().filter(|c| !c.is_control()).collect();
        }
    }

    fn is_machine_oriented(&self) -> bool {
        matches!(
            self.style,
            TimestampStyle::Syslog | TimestampStyle::EpochMillis
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_head_line_scans() {
        let fmt = PrefixFormat::new(TimestampStyle::Canonical);
        let outcome = fmt.scan(b"2023-01-02 03:04:05.678 ERROR disk full").unwrap();
        match outcome {
            ScanOutcome::Head { millis, level } => {
                assert_eq!(level, LogLevel::Error);
                assert_eq!(millis % 1000, 678);
            }
            other => panic!("expected head, got {other:?}"),
        }
    }

    #[test]
    fn continuation_line_scans() {
        let fmt = PrefixFormat::new(TimestampStyle::Canonical);
        let outcome = fmt.scan(b"    at frame 3 of stack").unwrap();
        assert_eq!(outcome, ScanOutcome::Continuation);
    }

    #[test]
    fn syslog_style_is_machine_oriented() {
        let fmt = PrefixFormat::new(TimestampStyle::Syslog);
        assert!(fmt.is_machine_oriented());

        let outcome = fmt.scan(b"Jan  2 03:04:05 starting worker").unwrap();
        assert!(matches!(outcome, ScanOutcome::Head { .. }));
    }

    #[test]
    fn epoch_style_parses_leading_integer() {
        let fmt = PrefixFormat::new(TimestampStyle::EpochMillis);
        let outcome = fmt.scan(b"1672628645678 INFO ready").unwrap();
        match outcome {
            ScanOutcome::Head { millis, level } => {
                assert_eq!(millis, 1_672_628_645_678);
                assert_eq!(level, LogLevel::Info);
            }
            other => panic!("expected head, got {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let fmt = PrefixFormat::new(TimestampStyle::Canonical);
        assert!(fmt.scan(&[0xff, 0xfe, 0x00]).is_err());
    }

    #[test]
    fn annotate_produces_structural_ranges() {
        let fmt = PrefixFormat::new(TimestampStyle::Canonical);
        let line = "2023-01-02 03:04:05.678 WARNING conn=abc42 retrying";
        let (attrs, values) = fmt.annotate(line);

        let ts = attrs
            .iter()
            .find(|a| a.kind == AttrKind::Timestamp)
            .expect("timestamp attr");
        assert_eq!(ts.range, 0..23);

        let level = attrs
            .iter()
            .find(|a| a.kind == AttrKind::Level)
            .expect("level attr");
        assert_eq!(&line[level.range.clone()], "WARNING");

        assert_eq!(values.len(), 1);
        assert_eq!(values[0].name, "conn");
        assert_eq!(values[0].value, "abc42");
        assert_eq!(&line[values[0].origin.clone()], "conn=abc42");
        assert!(values[0].identifier);
    }

    #[test]
    fn annotate_continuation_is_all_body() {
        let fmt = PrefixFormat::new(TimestampStyle::Canonical);
        let (attrs, values) = fmt.annotate("  caused by: timeout");
        assert!(attrs.iter().all(|a| a.kind != AttrKind::Timestamp));
        assert!(values.is_empty());
    }

    #[test]
    fn scrub_strips_control_characters() {
        let fmt = PrefixFormat::new(TimestampStyle::Canonical);
        let mut s = "ok\x1b[31mred\x07".to_string();
        fmt.scrub(&mut s);
        assert_eq!(s, "ok[31mred");
    }
}
