//! Bounded back/forward history of visited rows.
//!
//! Entries are stored as [`ContentLine`]s rather than row numbers, so they
//! survive refiltering and rebuilds; navigation resolves each entry
//! through the current filtered index and silently skips entries that no
//! longer resolve (filtered out, or their file was detached).

use crate::index::{ContentLine, Indexer};
use std::collections::VecDeque;

/// Maximum retained locations.
pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug, Default)]
pub struct LocationHistory {
    entries: VecDeque<ContentLine>,
    /// Distance of the cursor from the newest entry; zero means at head.
    position: usize,
}

impl LocationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record the current top row. Entries forward of the cursor are
    /// discarded, and the cursor returns to the head.
    pub fn push(&mut self, indexer: &Indexer, top_row: usize) {
        if top_row >= indexer.filtered_len() {
            return;
        }
        let Some(cl) = indexer.row_content_line(top_row) else {
            return;
        };

        for _ in 0..self.position {
            self.entries.pop_back();
        }
        self.position = 0;

        self.entries.push_back(cl);
        while self.entries.len() > HISTORY_LIMIT {
            self.entries.pop_front();
        }
    }

    /// Step toward older entries, returning the row to jump to.
    ///
    /// When the cursor is at the head and the newest entry differs from
    /// the current top, navigation goes there first (the user wandered
    /// off without recording a location).
    pub fn back(&mut self, indexer: &Indexer, current_row: usize) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }

        loop {
            if self.position == 0 {
                let newest = self.entries[self.entries.len() - 1];
                if let Some(row) = indexer.content_line_to_row(newest) {
                    if row != current_row {
                        return Some(row);
                    }
                }
            }

            if self.position + 1 >= self.entries.len() {
                return None;
            }
            self.position += 1;

            let idx = self.entries.len() - 1 - self.position;
            if let Some(row) = indexer.content_line_to_row(self.entries[idx]) {
                return Some(row);
            }
        }
    }

    /// Step toward newer entries, returning the row to jump to.
    pub fn forward(&mut self, indexer: &Indexer) -> Option<usize> {
        while self.position > 0 {
            self.position -= 1;
            let idx = self.entries.len() - 1 - self.position;
            if let Some(row) = indexer.content_line_to_row(self.entries[idx]) {
                return Some(row);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{PrefixFormat, TimestampStyle};
    use crate::logfile::{share, BufferLogFile};
    use crate::view::{NullDelegate, StubView};
    use std::sync::Arc;

    fn indexer_with_rows(count: usize) -> Indexer {
        let format = Arc::new(PrefixFormat::new(TimestampStyle::Canonical));
        let content: String = (0..count)
            .map(|i| format!("2023-01-02 03:04:{:02}.000 INFO line {i}\n", i % 60))
            .collect();
        let mut indexer = Indexer::new();
        indexer
            .attach_file(share(BufferLogFile::with_content(
                "hist.log",
                format,
                content.into_bytes(),
            )))
            .unwrap();
        let mut view = StubView::default();
        indexer.rebuild_index(&mut view, &mut NullDelegate);
        indexer
    }

    #[test]
    fn back_and_forward_walk_pushed_rows() {
        let indexer = indexer_with_rows(10);
        let mut history = LocationHistory::new();

        history.push(&indexer, 2);
        history.push(&indexer, 5);
        history.push(&indexer, 8);

        // Currently at the newest entry; back steps to older ones.
        assert_eq!(history.back(&indexer, 8), Some(5));
        assert_eq!(history.back(&indexer, 5), Some(2));
        assert_eq!(history.back(&indexer, 2), None);

        assert_eq!(history.forward(&indexer), Some(5));
        assert_eq!(history.forward(&indexer), Some(8));
        assert_eq!(history.forward(&indexer), None);
    }

    #[test]
    fn back_returns_to_newest_when_wandered_off() {
        let indexer = indexer_with_rows(10);
        let mut history = LocationHistory::new();

        history.push(&indexer, 3);
        // The user scrolled to row 7 without pushing.
        assert_eq!(history.back(&indexer, 7), Some(3));
    }

    #[test]
    fn push_truncates_forward_entries() {
        let indexer = indexer_with_rows(10);
        let mut history = LocationHistory::new();

        history.push(&indexer, 1);
        history.push(&indexer, 4);
        history.push(&indexer, 7);
        assert_eq!(history.back(&indexer, 7), Some(4));

        // Pushing here drops the entry for row 7.
        history.push(&indexer, 9);
        assert_eq!(history.len(), 3);
        assert_eq!(history.back(&indexer, 9), Some(4));
        assert_eq!(history.forward(&indexer), Some(9));
    }

    #[test]
    fn push_ignores_out_of_range_rows() {
        let indexer = indexer_with_rows(3);
        let mut history = LocationHistory::new();
        history.push(&indexer, 99);
        assert!(history.is_empty());
    }

    #[test]
    fn history_is_bounded() {
        let indexer = indexer_with_rows(10);
        let mut history = LocationHistory::new();
        for _ in 0..3 {
            for row in 0..10 {
                history.push(&indexer, row);
            }
        }
        // 30 pushes of 10 distinct rows; the ring keeps the most recent.
        assert!(history.len() <= HISTORY_LIMIT);
        assert_eq!(history.len(), 30.min(HISTORY_LIMIT));
    }
}
