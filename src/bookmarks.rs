//! Typed sets of bookmarked view rows.
//!
//! Bookmarks live in row space (positions into the filtered index), which
//! shifts whenever the index is rebuilt or refiltered. The durable state —
//! user marks and their metadata — is therefore keyed by [`ContentLine`]
//! and projected back into row space by [`BookmarkStore::update_marks`]
//! after every reload, together with the derived sets (errors, warnings,
//! file boundaries).

use crate::index::{ContentLine, Indexer};
use std::collections::BTreeMap;

/// The built-in bookmark categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookmarkKind {
    /// Rows the user marked by hand.
    User,
    /// Heads of error-or-worse messages.
    Error,
    /// Heads of warning messages.
    Warning,
    /// Search hits posted by the search driver.
    Search,
    /// Rows carrying user annotations.
    Meta,
    /// First row of each attached file in the merged order.
    FileBoundary,
}

impl BookmarkKind {
    pub const ALL: [BookmarkKind; 6] = [
        BookmarkKind::User,
        BookmarkKind::Error,
        BookmarkKind::Warning,
        BookmarkKind::Search,
        BookmarkKind::Meta,
        BookmarkKind::FileBoundary,
    ];

    fn index(self) -> usize {
        match self {
            BookmarkKind::User => 0,
            BookmarkKind::Error => 1,
            BookmarkKind::Warning => 2,
            BookmarkKind::Search => 3,
            BookmarkKind::Meta => 4,
            BookmarkKind::FileBoundary => 5,
        }
    }
}

/// A sorted, deduplicated set of row numbers.
#[derive(Debug, Clone, Default)]
pub struct BookmarkVec {
    rows: Vec<usize>,
}

impl BookmarkVec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, row: usize) -> bool {
        self.rows.binary_search(&row).is_ok()
    }

    /// Insert a row, keeping the set sorted; duplicates are dropped.
    pub fn insert_once(&mut self, row: usize) {
        if let Err(pos) = self.rows.binary_search(&row) {
            self.rows.insert(pos, row);
        }
    }

    pub fn remove(&mut self, row: usize) -> bool {
        match self.rows.binary_search(&row) {
            Ok(pos) => {
                self.rows.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Greatest bookmarked row strictly before `row`.
    pub fn prev(&self, row: usize) -> Option<usize> {
        let pos = self.rows.partition_point(|&r| r < row);
        if pos == 0 {
            None
        } else {
            Some(self.rows[pos - 1])
        }
    }

    /// Smallest bookmarked row strictly after `row`.
    pub fn next(&self, row: usize) -> Option<usize> {
        let pos = self.rows.partition_point(|&r| r <= row);
        self.rows.get(pos).copied()
    }

    /// Drop every bookmarked row in `[start, end)`.
    pub fn clear_range(&mut self, start: usize, end: usize) {
        self.rows.retain(|&r| r < start || r >= end);
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.rows.iter().copied()
    }
}

/// A user annotation attached to a marked line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkMetadata {
    /// Partition name; a named mark starts a partition that runs until
    /// the next named mark.
    pub name: String,
    pub comment: String,
}

/// All bookmark state for one view.
#[derive(Debug, Default)]
pub struct BookmarkStore {
    rows: [BookmarkVec; 6],
    /// Durable user marks, keyed by content line.
    user_marks: Vec<ContentLine>,
    /// Annotations keyed by content line.
    metadata: BTreeMap<ContentLine, BookmarkMetadata>,
}

impl BookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: BookmarkKind) -> &BookmarkVec {
        &self.rows[kind.index()]
    }

    pub fn get_mut(&mut self, kind: BookmarkKind) -> &mut BookmarkVec {
        &mut self.rows[kind.index()]
    }

    /// Toggle a durable user mark on a content line. Returns the new
    /// marked state.
    pub fn toggle_user_mark(&mut self, cl: ContentLine) -> bool {
        match self.user_marks.binary_search(&cl) {
            Ok(pos) => {
                self.user_marks.remove(pos);
                false
            }
            Err(pos) => {
                self.user_marks.insert(pos, cl);
                true
            }
        }
    }

    pub fn set_user_mark(&mut self, cl: ContentLine, marked: bool) {
        match (self.user_marks.binary_search(&cl), marked) {
            (Err(pos), true) => self.user_marks.insert(pos, cl),
            (Ok(pos), false) => {
                self.user_marks.remove(pos);
            }
            _ => {}
        }
    }

    pub fn is_user_marked(&self, cl: ContentLine) -> bool {
        self.user_marks.binary_search(&cl).is_ok()
    }

    pub fn set_metadata(&mut self, cl: ContentLine, meta: BookmarkMetadata) {
        self.metadata.insert(cl, meta);
    }

    pub fn metadata(&self, cl: ContentLine) -> Option<&BookmarkMetadata> {
        self.metadata.get(&cl)
    }

    pub fn remove_metadata(&mut self, cl: ContentLine) {
        self.metadata.remove(&cl);
    }

    /// Rebuild the row-space projections from the current filtered index.
    ///
    /// Clears and repopulates the user, error, warning, meta, and
    /// file-boundary sets; search hits are owned by the search driver and
    /// left alone. User-marked lines get their per-line mark flag set so
    /// the marked-only extra filter can see them.
    pub fn update_marks(&mut self, indexer: &Indexer) {
        for kind in [
            BookmarkKind::User,
            BookmarkKind::Error,
            BookmarkKind::Warning,
            BookmarkKind::Meta,
            BookmarkKind::FileBoundary,
        ] {
            self.rows[kind.index()].clear();
        }

        let mut last_slot = None;
        for row in 0..indexer.filtered_len() {
            let Some(cl) = indexer.row_content_line(row) else {
                continue;
            };
            let (slot, _) = cl.decode();

            if self.user_marks.binary_search(&cl).is_ok() {
                self.rows[BookmarkKind::User.index()].insert_once(row);
                indexer.set_line_mark(cl, true);
            }

            if self.metadata.contains_key(&cl) {
                self.rows[BookmarkKind::Meta.index()].insert_once(row);
            }

            if last_slot != Some(slot) {
                self.rows[BookmarkKind::FileBoundary.index()].insert_once(row);
                last_slot = Some(slot);
            }

            if let Some(line) = indexer.line_for(cl) {
                if !line.is_continued() {
                    if line.level().is_error() {
                        self.rows[BookmarkKind::Error.index()].insert_once(row);
                    } else if line.level() == crate::logfile::LogLevel::Warning {
                        self.rows[BookmarkKind::Warning.index()].insert_once(row);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_once_keeps_sorted_unique() {
        let mut bv = BookmarkVec::new();
        bv.insert_once(5);
        bv.insert_once(1);
        bv.insert_once(5);
        bv.insert_once(3);

        assert_eq!(bv.iter().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert!(bv.contains(3));
        assert!(!bv.contains(2));
    }

    #[test]
    fn prev_and_next_are_strict() {
        let mut bv = BookmarkVec::new();
        for row in [2, 4, 8] {
            bv.insert_once(row);
        }

        assert_eq!(bv.prev(4), Some(2));
        assert_eq!(bv.prev(2), None);
        assert_eq!(bv.next(4), Some(8));
        assert_eq!(bv.next(8), None);
        assert_eq!(bv.prev(100), Some(8));
        assert_eq!(bv.next(0), Some(2));
    }

    #[test]
    fn clear_range_is_half_open() {
        let mut bv = BookmarkVec::new();
        for row in [1, 2, 3, 4, 5] {
            bv.insert_once(row);
        }
        bv.clear_range(2, 4);
        assert_eq!(bv.iter().collect::<Vec<_>>(), vec![1, 4, 5]);
    }

    #[test]
    fn user_marks_toggle() {
        let mut store = BookmarkStore::new();
        let cl = ContentLine::encode(0, 7).unwrap();

        assert!(store.toggle_user_mark(cl));
        assert!(store.is_user_marked(cl));
        assert!(!store.toggle_user_mark(cl));
        assert!(!store.is_user_marked(cl));

        store.set_user_mark(cl, true);
        store.set_user_mark(cl, true);
        assert!(store.is_user_marked(cl));
    }

    #[test]
    fn metadata_round_trip() {
        let mut store = BookmarkStore::new();
        let cl = ContentLine::encode(1, 0).unwrap();

        store.set_metadata(
            cl,
            BookmarkMetadata {
                name: "deploy".to_string(),
                comment: "v2 rollout".to_string(),
            },
        );
        assert_eq!(store.metadata(cl).unwrap().name, "deploy");

        store.remove_metadata(cl);
        assert!(store.metadata(cl).is_none());
    }
}
