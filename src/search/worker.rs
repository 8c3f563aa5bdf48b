//! The grep worker loop.
//!
//! Workers run on their own threads: they scan assigned row ranges
//! against the shared compiled regex and stream events back over the
//! channel. They never touch the index or the bookmark store; the view
//! thread owns those and applies the events when it drains the channel.

use crate::search::{GrepSource, SearchEvent};
use regex::Regex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// One queued scan range. An open-ended request (`stop: None`) tracks the
/// source's growth while the scan runs.
#[derive(Debug, Clone, Copy)]
pub struct GrepRequest {
    pub start: usize,
    pub stop: Option<usize>,
}

impl GrepRequest {
    fn end(&self, source: &dyn GrepSource) -> usize {
        self.stop.unwrap_or_else(|| source.row_count())
    }
}

/// Scan the queued ranges, posting events until done or cancelled.
pub(crate) fn grep_worker(
    regex: Arc<Regex>,
    source: Arc<dyn GrepSource>,
    requests: Vec<GrepRequest>,
    tx: UnboundedSender<SearchEvent>,
    cancel: Arc<AtomicBool>,
) {
    for request in &requests {
        let announced_end = request.end(source.as_ref());
        if tx
            .send(SearchEvent::Begin {
                start: request.start,
                end: announced_end,
            })
            .is_err()
        {
            return;
        }

        let mut row = request.start;
        while row < request.end(source.as_ref()) {
            if cancel.load(Ordering::SeqCst) {
                let _ = tx.send(SearchEvent::End);
                return;
            }

            if let Some(text) = source.read_row(row) {
                for found in regex.find_iter(&text) {
                    let sent = tx.send(SearchEvent::Match {
                        row,
                        start: found.start(),
                        end: found.end(),
                    });
                    if sent.is_err() {
                        return;
                    }
                }
            }
            row += 1;
        }

        if tx.send(SearchEvent::EndBatch).is_err() {
            return;
        }
    }

    let _ = tx.send(SearchEvent::End);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SnapshotSource;
    use regex::RegexBuilder;
    use tokio::sync::mpsc::unbounded_channel;

    fn run_worker(rows: Vec<&str>, pattern: &str, requests: Vec<GrepRequest>) -> Vec<SearchEvent> {
        let source: Arc<dyn GrepSource> = Arc::new(SnapshotSource::new(
            rows.into_iter().map(String::from).collect(),
        ));
        let regex = Arc::new(
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .unwrap(),
        );
        let (tx, mut rx) = unbounded_channel();
        let cancel = Arc::new(AtomicBool::new(false));

        grep_worker(regex, source, requests, tx, cancel);

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn worker_posts_matches_with_ranges() {
        let events = run_worker(
            vec!["alpha", "beta", "alphabet"],
            "alpha",
            vec![GrepRequest {
                start: 0,
                stop: None,
            }],
        );

        assert_eq!(
            events,
            vec![
                SearchEvent::Begin { start: 0, end: 3 },
                SearchEvent::Match {
                    row: 0,
                    start: 0,
                    end: 5
                },
                SearchEvent::Match {
                    row: 2,
                    start: 0,
                    end: 5
                },
                SearchEvent::EndBatch,
                SearchEvent::End,
            ]
        );
    }

    #[test]
    fn worker_honors_bounded_ranges() {
        let events = run_worker(
            vec!["hit", "hit", "hit"],
            "hit",
            vec![
                GrepRequest {
                    start: 1,
                    stop: None,
                },
                GrepRequest {
                    start: 0,
                    stop: Some(1),
                },
            ],
        );

        let match_rows: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                SearchEvent::Match { row, .. } => Some(*row),
                _ => None,
            })
            .collect();
        // Forward range first, then the queued head range.
        assert_eq!(match_rows, vec![1, 2, 0]);
        assert_eq!(
            events.iter().filter(|e| **e == SearchEvent::End).count(),
            1
        );
        assert_eq!(
            events
                .iter()
                .filter(|e| **e == SearchEvent::EndBatch)
                .count(),
            2
        );
    }

    #[test]
    fn cancelled_worker_stops_early() {
        let source: Arc<dyn GrepSource> = Arc::new(SnapshotSource::new(vec![
            "hit".to_string();
            1000
        ]));
        let regex = Arc::new(RegexBuilder::new("hit").build().unwrap());
        let (tx, mut rx) = unbounded_channel();
        let cancel = Arc::new(AtomicBool::new(true));

        grep_worker(
            regex,
            source,
            vec![GrepRequest {
                start: 0,
                stop: None,
            }],
            tx,
            cancel,
        );

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        // Only the range announcement and the cancellation End.
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], SearchEvent::End);
    }
}
