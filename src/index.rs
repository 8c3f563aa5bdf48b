//! The merged chronological index and its filtered projection.
//!
//! [`GlobalIndex`] holds every observed line of every attached file as a
//! [`ContentLine`], in non-decreasing timestamp order. [`FilteredIndex`]
//! is a strictly increasing sequence of positions into the global index:
//! the rows that survive the active filters, and the coordinate space the
//! view, bookmarks, and search all operate in.

mod chunked;
mod content_line;
pub mod indexer;

pub use chunked::ChunkedVec;
pub use content_line::{ContentLine, MAX_FILE_SLOTS, MAX_LINES_PER_FILE};
pub use indexer::{Indexer, LogFileSlot, RebuildResult};

/// Ordered sequence of [`ContentLine`]s spanning all attached files.
///
/// Backed by a segmented array so that growth to millions of entries never
/// copies existing elements.
#[derive(Debug, Default)]
pub struct GlobalIndex {
    lines: ChunkedVec<ContentLine>,
}

impl GlobalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<ContentLine> {
        self.lines.get(position)
    }

    pub fn last(&self) -> Option<ContentLine> {
        self.lines.last()
    }

    pub fn push(&mut self, line: ContentLine) {
        self.lines.push(line);
    }

    /// Pre-allocate for `total` lines; see [`ChunkedVec::reserve`] for the
    /// invalidation contract.
    pub fn reserve(&mut self, total: usize) -> bool {
        self.lines.reserve(total)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = ContentLine> + '_ {
        self.lines.iter()
    }
}

/// Strictly increasing positions into [`GlobalIndex`] that survive the
/// active filters.
#[derive(Debug, Default)]
pub struct FilteredIndex {
    positions: Vec<u32>,
}

impl FilteredIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<u32> {
        self.positions.get(row).copied()
    }

    pub fn push(&mut self, position: u32) {
        debug_assert!(
            self.positions.last().map_or(true, |last| *last < position),
            "filtered positions must be strictly increasing"
        );
        self.positions.push(position);
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    pub fn reserve(&mut self, additional: usize) {
        self.positions.reserve(additional);
    }

    /// Row owning the given global position, if that position survived
    /// filtering.
    pub fn row_of_position(&self, position: u32) -> Option<usize> {
        self.positions.binary_search(&position).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.positions.iter().copied()
    }
}
