//! In-memory log file over a byte buffer.
//!
//! `BufferLogFile` is the reference [`LogFile`] implementation: hosts that
//! already hold log bytes (embedded buffers, decompressed archives, test
//! fixtures) feed them in here and get incremental observation, message
//! grouping, and rotation semantics without touching the filesystem.
//!
//! Only newline-terminated lines are observed; a partial tail line stays
//! invisible until the terminator arrives, so growth can be fed in
//! arbitrary chunks.

use crate::error::{LogweaveError, Result};
use crate::format::{LogFormat, ScanOutcome};
use crate::logfile::{LogFile, LogLine, ObserveResult};
use memchr::memchr;
use std::borrow::Cow;
use std::sync::Arc;

/// In-memory [`LogFile`] with append/truncate mutators for simulating
/// growth, stalls, and rotation.
pub struct BufferLogFile {
    filename: String,
    unique_path: String,
    format: Arc<dyn LogFormat>,
    content: Vec<u8>,

    /// Byte ranges of observed lines, newline excluded.
    line_ranges: Vec<(usize, usize)>,
    lines: Vec<LogLine>,

    /// How far into `content` the newline scan has progressed.
    scanned_to: usize,
    last_head_millis: Option<i64>,
    longest_line: usize,

    time_adjusted: bool,
    /// Set when previously observed content was replaced or truncated.
    content_reset: bool,
    invalid: bool,
}

impl BufferLogFile {
    pub fn new(filename: impl Into<String>, format: Arc<dyn LogFormat>) -> Self {
        let filename = filename.into();
        let unique_path = filename
            .rsplit('/')
            .next()
            .unwrap_or(filename.as_str())
            .to_string();
        Self {
            filename,
            unique_path,
            format,
            content: Vec::new(),
            line_ranges: Vec::new(),
            lines: Vec::new(),
            scanned_to: 0,
            last_head_millis: None,
            longest_line: 0,
            time_adjusted: false,
            content_reset: false,
            invalid: false,
        }
    }

    pub fn with_content(
        filename: impl Into<String>,
        format: Arc<dyn LogFormat>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        let mut file = Self::new(filename, format);
        file.content = content.into();
        file
    }

    /// Override the distinguishing path suffix.
    pub fn set_unique_path(&mut self, path: impl Into<String>) {
        self.unique_path = path.into();
    }

    pub fn set_time_adjusted(&mut self, adjusted: bool) {
        self.time_adjusted = adjusted;
    }

    /// Append raw bytes; they become visible on the next observation.
    pub fn append(&mut self, bytes: &[u8]) {
        self.content.extend_from_slice(bytes);
    }

    /// Drop content past `len` bytes, as a rotation that reuses the name
    /// would. Observed lines past the cut are forgotten on the next
    /// observation, which reports [`ObserveResult::NewOrder`].
    pub fn truncate_to(&mut self, len: usize) {
        if len < self.content.len() {
            self.content.truncate(len);
            if len < self.scanned_to {
                self.content_reset = true;
            }
        }
    }

    /// Replace the entire content, as a rotate-and-recreate would.
    pub fn reset_content(&mut self, bytes: impl Into<Vec<u8>>) {
        self.content = bytes.into();
        self.content_reset = self.scanned_to > 0;
        self.invalid = false;
    }

    fn rescan_from_scratch(&mut self) {
        self.line_ranges.clear();
        self.lines.clear();
        self.scanned_to = 0;
        self.last_head_millis = None;
        self.longest_line = 0;
    }

    /// Scan newly arrived bytes for complete lines.
    ///
    /// Returns the number of lines added and whether any new head line
    /// violated the file-local timestamp order. A format scan failure
    /// poisons the file until its content is reset.
    fn scan_new_lines(&mut self) -> Result<(usize, bool)> {
        let mut added = 0;
        let mut saw_skew = false;

        while self.scanned_to < self.content.len() {
            let Some(nl) = memchr(b'\n', &self.content[self.scanned_to..]) else {
                break;
            };
            let start = self.scanned_to;
            let end = start + nl;
            self.scanned_to = end + 1;

            let outcome = self.format.scan(&self.content[start..end])?;
            let line = match outcome {
                ScanOutcome::Head { millis, level } => {
                    let mut line = LogLine::head(millis, level);
                    if let Some(last) = self.last_head_millis {
                        if millis < last {
                            // The native timestamp is preserved so a full
                            // re-sort can place the line correctly.
                            line.set_time_skewed(true);
                            saw_skew = true;
                        }
                    }
                    self.last_head_millis = Some(millis);
                    line
                }
                ScanOutcome::Continuation => match self.lines.last() {
                    Some(prev) => LogLine::continuation(prev, prev.sub_offset() + 1),
                    // A continuation with no head to attach to; treat it
                    // as an unknown-time head so it stays addressable.
                    None => LogLine::head(
                        self.last_head_millis.unwrap_or(0),
                        crate::logfile::LogLevel::Unknown,
                    ),
                },
            };

            self.longest_line = self.longest_line.max(end - start);
            self.line_ranges.push((start, end));
            self.lines.push(line);
            added += 1;
        }

        Ok((added, saw_skew))
    }

    fn head_index(&self, index: usize) -> usize {
        index - self.lines[index].sub_offset() as usize
    }
}

impl LogFile for BufferLogFile {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn unique_path(&self) -> &str {
        &self.unique_path
    }

    fn size(&self) -> usize {
        self.lines.len()
    }

    fn line(&self, index: usize) -> Option<&LogLine> {
        self.lines.get(index)
    }

    fn read_line(&self, index: usize) -> Result<Cow<'_, str>> {
        let (start, end) = *self
            .line_ranges
            .get(index)
            .ok_or_else(|| LogweaveError::out_of_bounds(format!("line {index} of {}", self.size())))?;
        Ok(String::from_utf8_lossy(&self.content[start..end]))
    }

    fn read_full_message(&self, index: usize) -> Result<String> {
        if index >= self.lines.len() {
            return Err(LogweaveError::out_of_bounds(format!(
                "line {index} of {}",
                self.size()
            )));
        }

        let head = self.head_index(index);
        let mut message = String::new();
        for idx in head..self.lines.len() {
            if idx > head && !self.lines[idx].is_continued() {
                break;
            }
            if idx > head {
                message.push('\n');
            }
            message.push_str(&self.read_line(idx)?);
        }
        Ok(message)
    }

    fn rebuild_index(&mut self) -> Result<ObserveResult> {
        if self.invalid {
            return Ok(ObserveResult::Invalid);
        }

        if self.content_reset || self.scanned_to > self.content.len() {
            self.content_reset = false;
            self.rescan_from_scratch();
            if let Err(err) = self.scan_new_lines() {
                log::warn!("{}: content not parseable: {err}", self.filename);
                self.invalid = true;
                return Ok(ObserveResult::Invalid);
            }
            return Ok(ObserveResult::NewOrder);
        }

        match self.scan_new_lines() {
            Ok((0, _)) => Ok(ObserveResult::NoNewLines),
            // New lines that predate the lines before them cannot be
            // appended to a sorted index; the owner must re-sort.
            Ok((_, true)) => Ok(ObserveResult::NewOrder),
            Ok((_, false)) => Ok(ObserveResult::NewLines),
            Err(err) => {
                log::warn!("{}: content not parseable: {err}", self.filename);
                self.invalid = true;
                Ok(ObserveResult::Invalid)
            }
        }
    }

    fn longest_line_length(&self) -> usize {
        self.longest_line
    }

    fn is_time_adjusted(&self) -> bool {
        self.time_adjusted
    }

    fn format(&self) -> &dyn LogFormat {
        self.format.as_ref()
    }

    fn set_line_mark(&mut self, index: usize, marked: bool) {
        if let Some(line) = self.lines.get_mut(index) {
            line.set_mark(marked);
        }
    }
}
