//! Capabilities consumed from the hosting view.
//!
//! The engine never draws anything; the host view drives it between
//! frames and reacts to index changes. Both traits are passed into engine
//! entry points as context arguments rather than stored, keeping the
//! ownership one-way.

/// The hosting scroll view, as seen by the indexer.
pub trait View {
    /// While paused, files are not re-observed and the index freezes.
    fn is_paused(&self) -> bool;

    /// Row at the top of the viewport.
    fn top_row(&self) -> usize;

    /// Row at the bottom of the viewport.
    fn bottom_row(&self) -> usize;

    /// The index was rebuilt from scratch; any search must restart from
    /// the beginning.
    fn redo_search(&mut self);

    /// Rows were appended; search only needs to cover the new tail.
    fn search_new_data(&mut self);

    /// Row space changed; marks and cached rows must be recomputed.
    fn reload_data(&mut self);
}

/// Observer notified as rows enter the filtered index.
pub trait IndexDelegate {
    /// Indexing is starting from an empty index.
    fn index_start(&mut self);

    /// A line was accepted into the filtered index.
    fn index_line(&mut self, slot: usize, line_number: usize);

    /// The current indexing pass finished.
    fn index_complete(&mut self);
}

/// No-op delegate for hosts that do not observe indexing.
#[derive(Debug, Default)]
pub struct NullDelegate;

impl IndexDelegate for NullDelegate {
    fn index_start(&mut self) {}
    fn index_line(&mut self, _slot: usize, _line_number: usize) {}
    fn index_complete(&mut self) {}
}

/// Recording view double used by hosts and tests to observe the actions
/// the indexer requests.
#[derive(Debug, Default)]
pub struct StubView {
    pub paused: bool,
    pub top: usize,
    pub bottom: usize,
    pub redo_search_calls: usize,
    pub search_new_data_calls: usize,
    pub reload_data_calls: usize,
}

impl View for StubView {
    fn is_paused(&self) -> bool {
        self.paused
    }

    fn top_row(&self) -> usize {
        self.top
    }

    fn bottom_row(&self) -> usize {
        self.bottom
    }

    fn redo_search(&mut self) {
        self.redo_search_calls += 1;
    }

    fn search_new_data(&mut self) {
        self.search_new_data_calls += 1;
    }

    fn reload_data(&mut self) {
        self.reload_data_calls += 1;
    }
}

/// Delegate that records every notification, in order.
#[derive(Debug, Default)]
pub struct RecordingDelegate {
    pub starts: usize,
    pub completes: usize,
    pub lines: Vec<(usize, usize)>,
}

impl IndexDelegate for RecordingDelegate {
    fn index_start(&mut self) {
        self.starts += 1;
    }

    fn index_line(&mut self, slot: usize, line_number: usize) {
        self.lines.push((slot, line_number));
    }

    fn index_complete(&mut self) {
        self.completes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_view_records_actions() {
        let mut view = StubView::default();
        view.redo_search();
        view.search_new_data();
        view.search_new_data();
        view.reload_data();

        assert_eq!(view.redo_search_calls, 1);
        assert_eq!(view.search_new_data_calls, 2);
        assert_eq!(view.reload_data_calls, 1);
        assert!(!view.is_paused());
    }

    #[test]
    fn recording_delegate_keeps_order() {
        let mut delegate = RecordingDelegate::default();
        delegate.index_start();
        delegate.index_line(0, 0);
        delegate.index_line(1, 0);
        delegate.index_complete();

        assert_eq!(delegate.starts, 1);
        assert_eq!(delegate.completes, 1);
        assert_eq!(delegate.lines, vec![(0, 0), (1, 0)]);
    }
}
