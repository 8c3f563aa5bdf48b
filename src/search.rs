//! Search orchestration: grep workers feeding the bookmark store.
//!
//! The driver compiles the requested pattern (falling back to a quoted
//! literal when compilation fails), spawns one worker thread per request,
//! and collects match events over a channel. All bookmark mutations happen
//! on the view thread when it drains pending events before a redraw; the
//! workers only read rows and post events.

pub mod worker;

use crate::bookmarks::{BookmarkKind, BookmarkStore};
use crate::error::{LogweaveError, Result};
use crate::index::Indexer;
use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use worker::GrepRequest;

/// How many rows before the current top a new search rewinds, so the user
/// can scroll back into matches that already streamed in.
pub const REVERSE_SEARCH_OFFSET: usize = 2000;

/// Row text provider shared with the grep workers.
pub trait GrepSource: Send + Sync {
    fn row_count(&self) -> usize;
    fn read_row(&self, row: usize) -> Option<String>;
}

/// A growable snapshot of view rows, shareable across threads.
///
/// The view thread captures the visible rows once and appends the tail
/// when new data arrives; workers read concurrently.
#[derive(Default)]
pub struct SnapshotSource {
    rows: RwLock<Vec<String>>,
}

impl SnapshotSource {
    pub fn new(rows: Vec<String>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    /// Snapshot every current row of the indexer.
    pub fn capture(indexer: &Indexer) -> Self {
        let rows = (0..indexer.filtered_len())
            .map(|row| indexer.read_row(row).unwrap_or_default())
            .collect();
        Self::new(rows)
    }

    /// Append rows the indexer has gained since this snapshot was taken.
    pub fn extend_from(&self, indexer: &Indexer) {
        let mut rows = self.rows.write();
        for row in rows.len()..indexer.filtered_len() {
            rows.push(indexer.read_row(row).unwrap_or_default());
        }
    }
}

impl GrepSource for SnapshotSource {
    fn row_count(&self) -> usize {
        self.rows.read().len()
    }

    fn read_row(&self, row: usize) -> Option<String> {
        self.rows.read().get(row).cloned()
    }
}

/// Events posted by grep workers back to the view thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    /// A queued range is about to be scanned; stale hits inside it should
    /// be dropped.
    Begin { start: usize, end: usize },
    /// A match inside one row.
    Match {
        row: usize,
        start: usize,
        end: usize,
    },
    /// One queued range finished.
    EndBatch,
    /// The worker is done.
    End,
}

/// Orchestrates grep workers for the active search pattern.
pub struct SearchDriver {
    pattern: String,
    regex: Option<Arc<Regex>>,
    cancel: Arc<AtomicBool>,
    tx: Option<UnboundedSender<SearchEvent>>,
    rx: Option<UnboundedReceiver<SearchEvent>>,
    workers: Vec<JoinHandle<()>>,
    active: usize,
}

impl Default for SearchDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchDriver {
    pub fn new() -> Self {
        Self {
            pattern: String::new(),
            regex: None,
            cancel: Arc::new(AtomicBool::new(false)),
            tx: None,
            rx: None,
            workers: Vec::new(),
            active: 0,
        }
    }

    /// The compiled pattern, shared read-only with the view's highlighter.
    pub fn compiled(&self) -> Option<Arc<Regex>> {
        self.regex.clone()
    }

    pub fn is_searching(&self) -> bool {
        self.active > 0
    }

    /// Start a search for `pattern` over the given source.
    ///
    /// The scan begins [`REVERSE_SEARCH_OFFSET`] rows before `top` and
    /// runs to the end; the skipped head range `[0, top)` is queued after
    /// it. A repeat request for the unchanged pattern is a no-op.
    pub fn execute_search(
        &mut self,
        pattern: &str,
        source: Arc<dyn GrepSource>,
        top: usize,
    ) -> Result<()> {
        if pattern == self.pattern && self.regex.is_some() {
            return Ok(());
        }

        self.cancel_workers();
        self.pattern = pattern.to_string();

        if pattern.is_empty() {
            self.regex = None;
            return Ok(());
        }

        log::debug!("start search for: '{pattern}'");
        let regex = Arc::new(compile_with_fallback(pattern)?);
        self.regex = Some(Arc::clone(&regex));

        let (tx, rx) = unbounded_channel();
        self.rx = Some(rx);
        self.tx = Some(tx.clone());

        let start = top.saturating_sub(REVERSE_SEARCH_OFFSET);
        let mut requests = vec![GrepRequest { start, stop: None }];
        if start > 0 {
            requests.push(GrepRequest {
                start: 0,
                stop: Some(start),
            });
        }

        self.spawn_worker(regex, source, requests, tx);
        Ok(())
    }

    /// Scan only the newly appended tail with the active pattern.
    ///
    /// Returns false when no search is active.
    pub fn search_new_data(&mut self, source: Arc<dyn GrepSource>, from_row: usize) -> bool {
        let (Some(regex), Some(tx)) = (self.regex.clone(), self.tx.clone()) else {
            return false;
        };
        self.spawn_worker(
            regex,
            source,
            vec![GrepRequest {
                start: from_row,
                stop: None,
            }],
            tx,
        );
        true
    }

    /// Drain pending worker events into the search bookmark set. Called
    /// on the view thread before each redraw. Returns how many new
    /// matches arrived.
    pub fn drain_into(&mut self, bookmarks: &mut BookmarkStore) -> usize {
        let Some(rx) = self.rx.as_mut() else {
            return 0;
        };

        let mut added = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                SearchEvent::Begin { start, end } => {
                    bookmarks
                        .get_mut(BookmarkKind::Search)
                        .clear_range(start, end);
                }
                SearchEvent::Match { row, .. } => {
                    bookmarks.get_mut(BookmarkKind::Search).insert_once(row);
                    added += 1;
                }
                SearchEvent::EndBatch => {}
                SearchEvent::End => {
                    self.active = self.active.saturating_sub(1);
                }
            }
        }
        added
    }

    /// Cancel all in-flight workers and drop the compiled pattern, e.g.
    /// when a file referenced by the scan is detached.
    pub fn cancel(&mut self) {
        self.cancel_workers();
        self.pattern.clear();
        self.regex = None;
    }

    fn spawn_worker(
        &mut self,
        regex: Arc<Regex>,
        source: Arc<dyn GrepSource>,
        requests: Vec<GrepRequest>,
        tx: UnboundedSender<SearchEvent>,
    ) {
        let cancel = Arc::clone(&self.cancel);
        self.active += 1;
        self.workers.push(std::thread::spawn(move || {
            worker::grep_worker(regex, source, requests, tx, cancel);
        }));
    }

    fn cancel_workers(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        self.cancel = Arc::new(AtomicBool::new(false));
        self.tx = None;
        self.rx = None;
        self.active = 0;
    }
}

impl Drop for SearchDriver {
    fn drop(&mut self) {
        self.cancel_workers();
    }
}

/// Compile a search pattern case-insensitively, retrying with the quoted
/// literal when the raw pattern is not a valid regex.
fn compile_with_fallback(pattern: &str) -> Result<Regex> {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(regex) => Ok(regex),
        Err(first_err) => {
            let quoted = regex::escape(pattern);
            log::info!("invalid search regex, using quoted: {quoted}");
            RegexBuilder::new(&quoted)
                .case_insensitive(true)
                .build()
                .map_err(|second_err| {
                    log::error!("unable to compile quoted regex: {second_err}");
                    LogweaveError::RegexCompileFailed {
                        message: first_err.to_string(),
                    }
                })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_fallback_degrades_to_literal() {
        let regex = compile_with_fallback("a(b").unwrap();
        assert!(regex.is_match("literal a(b here"));
        assert!(!regex.is_match("ab"));
    }

    #[test]
    fn compile_is_case_insensitive() {
        let regex = compile_with_fallback("error").unwrap();
        assert!(regex.is_match("ERROR: disk full"));
    }

    #[test]
    fn snapshot_source_reads_rows() {
        let source = SnapshotSource::new(vec!["one".into(), "two".into()]);
        assert_eq!(source.row_count(), 2);
        assert_eq!(source.read_row(1).as_deref(), Some("two"));
        assert_eq!(source.read_row(2), None);
    }

    #[test]
    fn empty_pattern_clears_state() {
        let mut driver = SearchDriver::new();
        let source: Arc<dyn GrepSource> = Arc::new(SnapshotSource::new(vec!["x".into()]));

        driver.execute_search("", source, 0).unwrap();
        assert!(driver.compiled().is_none());
        assert!(!driver.is_searching());
    }
}
