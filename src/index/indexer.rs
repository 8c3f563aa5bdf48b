//! Incremental merge engine over all attached files.
//!
//! `rebuild_index` is called by the host view between frames. Each pass
//! polls every attached file for new lines, classifies the result
//! (append, re-order, invalidation), extends the global index by k-way
//! merge or rebuilds it with a full stable sort, and then extends the
//! filtered projection under the active filters. The pass is bounded by
//! the number of newly observed lines, so it returns quickly and is
//! re-entered on the next tick.

use crate::filter::{FilterSet, FilterState};
use crate::index::{ContentLine, FilteredIndex, GlobalIndex, MAX_FILE_SLOTS};
use crate::logfile::{LogFile, LogLevel, LogLine, ObserveResult, SharedLogFile};
use crate::view::{IndexDelegate, View};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Outcome of one indexing pass, driving the view's search behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildResult {
    /// Nothing changed; the tick was a no-op.
    NoChange,
    /// Rows were appended; the prefix of the index is untouched.
    Appended,
    /// The index was rebuilt from scratch.
    FullRebuild,
}

/// Registration record for one attached file.
///
/// Slot indices are stable for the lifetime of the attachment; a detached
/// slot keeps its index and reports no file, so previously issued
/// [`ContentLine`]s stay decodable.
pub struct LogFileSlot {
    file: Option<SharedLogFile>,
    filter_state: FilterState,
    /// Lines already folded into the global index.
    lines_indexed: usize,
}

impl LogFileSlot {
    pub fn file(&self) -> Option<&SharedLogFile> {
        self.file.as_ref()
    }

    pub fn lines_indexed(&self) -> usize {
        self.lines_indexed
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filter_state
    }
}

/// Extra conditions that cannot be precomputed into the filter bitmasks.
///
/// All of these are idempotent, side-effect-free tests over a single
/// line; they are evaluated lazily while extending the filtered index.
#[derive(Debug, Clone, Copy)]
struct ExtraFilters {
    min_level: LogLevel,
    marked_only: bool,
    min_time_millis: Option<i64>,
    max_time_millis: Option<i64>,
}

impl ExtraFilters {
    fn passes(&self, line: &LogLine) -> bool {
        if line.level() < self.min_level {
            return false;
        }
        if self.marked_only && !line.is_marked() {
            return false;
        }
        if let Some(min) = self.min_time_millis {
            if line.time_millis() < min {
                return false;
            }
        }
        if let Some(max) = self.max_time_millis {
            if line.time_millis() > max {
                return false;
            }
        }
        true
    }
}

/// The multi-file log index and view engine.
pub struct Indexer {
    slots: Vec<LogFileSlot>,
    index: GlobalIndex,
    filtered: FilteredIndex,
    filters: FilterSet,
    extra: ExtraFilters,
    force_rebuild: bool,

    longest_line: usize,
    filename_width: usize,
    basename_width: usize,
}

impl Default for Indexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Indexer {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            index: GlobalIndex::new(),
            filtered: FilteredIndex::new(),
            filters: FilterSet::new(),
            extra: ExtraFilters {
                min_level: LogLevel::Unknown,
                marked_only: false,
                min_time_millis: None,
                max_time_millis: None,
            },
            force_rebuild: false,
            longest_line: 0,
            filename_width: 0,
            basename_width: 0,
        }
    }

    /// Attach a file, assigning it the next stable slot index.
    pub fn attach_file(&mut self, file: SharedLogFile) -> crate::error::Result<usize> {
        if self.slots.len() >= MAX_FILE_SLOTS {
            return Err(crate::error::LogweaveError::other(format!(
                "file slot limit of {MAX_FILE_SLOTS} reached"
            )));
        }
        self.slots.push(LogFileSlot {
            file: Some(file),
            filter_state: FilterState::new(),
            lines_indexed: 0,
        });
        Ok(self.slots.len() - 1)
    }

    /// Detach the file in `slot`. The slot keeps its index and reports no
    /// file; a full rebuild follows on the next tick.
    pub fn detach_file(&mut self, slot: usize) {
        if let Some(record) = self.slots.get_mut(slot) {
            record.file = None;
            record.filter_state.reset();
        }
    }

    /// Request a full rebuild on the next tick.
    pub fn force_rebuild(&mut self) {
        self.force_rebuild = true;
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, slot: usize) -> Option<&LogFileSlot> {
        self.slots.get(slot)
    }

    pub fn slot_file(&self, slot: usize) -> Option<SharedLogFile> {
        self.slots.get(slot).and_then(|s| s.file.clone())
    }

    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    /// Mutable access to the filter set. After changing it, call
    /// [`Indexer::filters_changed`] to rebuild the filtered index.
    pub fn filters_mut(&mut self) -> &mut FilterSet {
        &mut self.filters
    }

    pub fn set_min_level(&mut self, level: LogLevel) {
        self.extra.min_level = level;
    }

    pub fn set_marked_only(&mut self, marked_only: bool) {
        self.extra.marked_only = marked_only;
    }

    pub fn set_min_log_time(&mut self, millis: i64) {
        self.extra.min_time_millis = Some(millis);
    }

    pub fn set_max_log_time(&mut self, millis: i64) {
        self.extra.max_time_millis = Some(millis);
    }

    pub fn clear_min_max_log_times(&mut self) {
        self.extra.min_time_millis = None;
        self.extra.max_time_millis = None;
    }

    pub fn global_len(&self) -> usize {
        self.index.len()
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    /// Widest observed line across all attached files.
    pub fn longest_line(&self) -> usize {
        self.longest_line
    }

    pub fn filename_width(&self) -> usize {
        self.filename_width
    }

    pub fn basename_width(&self) -> usize {
        self.basename_width
    }

    /// The content line shown at a view row.
    pub fn row_content_line(&self, row: usize) -> Option<ContentLine> {
        let position = self.filtered.get(row)?;
        self.index.get(position as usize)
    }

    /// The global index position backing a view row.
    pub fn row_global_position(&self, row: usize) -> Option<u32> {
        self.filtered.get(row)
    }

    /// Snapshot of the line record behind a content line.
    pub fn line_for(&self, cl: ContentLine) -> Option<LogLine> {
        let (slot, line_number) = cl.decode();
        let file = self.slots.get(slot)?.file.as_ref()?;
        let lf = file.read();
        lf.line(line_number).copied()
    }

    /// Raw text of a view row, for search scanning.
    pub fn read_row(&self, row: usize) -> Option<String> {
        let cl = self.row_content_line(row)?;
        let (slot, line_number) = cl.decode();
        let file = self.slots.get(slot)?.file.as_ref()?;
        let lf = file.read();
        lf.read_line(line_number).ok().map(|text| text.into_owned())
    }

    /// Resolve a content line back to its current view row, if it is
    /// still present and admitted by the filters.
    ///
    /// The global index is non-decreasing in timestamp, but entries
    /// appended at the same instant across different passes keep arrival
    /// order, so the lookup bisects by timestamp and walks the
    /// equal-time run.
    pub fn content_line_to_row(&self, cl: ContentLine) -> Option<usize> {
        let millis = self.line_for(cl)?.time_millis();

        let mut lo = 0usize;
        let mut hi = self.index.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let mid_cl = self.index.get(mid)?;
            if self.line_for(mid_cl)?.time_millis() < millis {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        let mut position = lo;
        while position < self.index.len() {
            let candidate = self.index.get(position)?;
            if candidate == cl {
                return self.filtered.row_of_position(position as u32);
            }
            if self.line_for(candidate)?.time_millis() != millis {
                break;
            }
            position += 1;
        }
        None
    }

    /// First filtered row at or after the given wall-clock instant.
    pub fn find_from_time(&self, millis: i64) -> Option<usize> {
        let len = self.filtered.len();
        let mut lo = 0usize;
        let mut hi = len;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let mid_millis = self
                .row_content_line(mid)
                .and_then(|cl| self.line_for(cl))
                .map(|line| line.time_millis())
                .unwrap_or(i64::MIN);
            if mid_millis < millis {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo < len {
            Some(lo)
        } else {
            None
        }
    }

    /// Locate an attached file by name, with its content-line base.
    pub fn find_by_filename(&self, name: &str) -> Option<(usize, SharedLogFile)> {
        for (slot, record) in self.slots.iter().enumerate() {
            let Some(file) = &record.file else { continue };
            if file.read().filename() == name {
                return Some((slot, file.clone()));
            }
        }
        None
    }

    /// Set the per-line mark flag behind a content line.
    pub fn set_line_mark(&self, cl: ContentLine, marked: bool) {
        let (slot, line_number) = cl.decode();
        if let Some(file) = self.slots.get(slot).and_then(|s| s.file.as_ref()) {
            file.write().set_line_mark(line_number, marked);
        }
    }

    /// One indexing pass; see the module docs for the full contract.
    pub fn rebuild_index(
        &mut self,
        view: &mut dyn View,
        delegate: &mut dyn IndexDelegate,
    ) -> RebuildResult {
        let mut force = self.force_rebuild;
        self.force_rebuild = false;
        let mut retval = if force {
            RebuildResult::FullRebuild
        } else {
            RebuildResult::NoChange
        };

        // The current tail is in the already-merged region, so it is
        // stable across this poll loop.
        let tail_millis = self
            .index
            .last()
            .map(|cl| self.line_for(cl).map(|line| line.time_millis()));

        let mut total_lines = 0usize;
        let mut file_count = 0usize;

        // Poll every slot for new lines.
        for slot_idx in 0..self.slots.len() {
            let Some(file) = self.slots[slot_idx].file.clone() else {
                if self.slots[slot_idx].lines_indexed > 0 {
                    force = true;
                    retval = RebuildResult::FullRebuild;
                }
                continue;
            };

            if !view.is_paused() {
                let mut lf = file.write();
                let mut observe = match lf.rebuild_index() {
                    Ok(result) => result,
                    Err(err) => {
                        log::warn!("{}: observation failed: {err}", lf.filename());
                        ObserveResult::Invalid
                    }
                };

                if observe == ObserveResult::NoNewLines
                    && self.slots[slot_idx].lines_indexed < lf.size()
                {
                    // Lines observed on a previous pass are still waiting
                    // to be merged.
                    observe = ObserveResult::NewLines;
                }

                match observe {
                    ObserveResult::NoNewLines => {}
                    ObserveResult::NewLines => {
                        if retval == RebuildResult::NoChange {
                            retval = RebuildResult::Appended;
                        }
                        if !self.index.is_empty() {
                            let first_new = lf
                                .line(self.slots[slot_idx].lines_indexed)
                                .map(|line| line.time_millis());
                            match (first_new, &tail_millis) {
                                (Some(new_millis), Some(Some(tail))) if new_millis < *tail => {
                                    // New lines predate the merged tail.
                                    force = true;
                                    retval = RebuildResult::FullRebuild;
                                }
                                (_, Some(None)) => {
                                    // The tail's file is gone.
                                    force = true;
                                    retval = RebuildResult::FullRebuild;
                                }
                                _ => {}
                            }
                        }
                    }
                    ObserveResult::NewOrder | ObserveResult::Invalid => {
                        self.slots[slot_idx].filter_state.reset();
                        force = true;
                        retval = RebuildResult::FullRebuild;
                    }
                }

                feed_filter_state(
                    &self.filters,
                    &mut self.slots[slot_idx].filter_state,
                    &*lf,
                );
            }

            total_lines += file.read().size();
            file_count += 1;
        }

        if self.index.reserve(total_lines) {
            force = true;
        }

        let full_sort = force;
        if force {
            retval = RebuildResult::FullRebuild;
            for slot in &mut self.slots {
                slot.lines_indexed = 0;
            }
            self.index.clear();
            self.filtered.clear();
            self.longest_line = 0;
            self.filename_width = 0;
            self.basename_width = 0;
        }

        if retval != RebuildResult::NoChange {
            let start_size = self.index.len();

            self.measure_widths();

            if full_sort {
                log::info!("sorting {total_lines} lines across {file_count} files");
                self.extend_full_sort();
            } else {
                self.extend_merge();
            }

            self.extend_filtered(start_size, delegate);
        }

        match retval {
            RebuildResult::NoChange => {}
            RebuildResult::Appended => view.search_new_data(),
            RebuildResult::FullRebuild => view.redo_search(),
        }

        retval
    }

    /// Re-evaluate the filtered index after the filter set or the extra
    /// filters changed.
    pub fn filters_changed(&mut self, view: &mut dyn View, delegate: &mut dyn IndexDelegate) {
        for slot_idx in 0..self.slots.len() {
            let Some(file) = self.slots[slot_idx].file.clone() else {
                continue;
            };
            let lf = file.read();
            let state = &mut self.slots[slot_idx].filter_state;
            state.clear_deleted(&self.filters);
            feed_filter_state(&self.filters, state, &*lf);
        }

        delegate.index_start();
        self.filtered.clear();
        self.extend_filtered_from(0, delegate);
        delegate.index_complete();

        view.reload_data();
        view.redo_search();
    }

    fn measure_widths(&mut self) {
        for slot in &self.slots {
            let Some(file) = &slot.file else { continue };
            let lf = file.read();
            self.longest_line = self.longest_line.max(lf.longest_line_length());
            self.filename_width = self.filename_width.max(lf.filename().len());
            self.basename_width = self.basename_width.max(lf.unique_path().len());
        }
    }

    /// Recreate the whole index with a stable sort over every file.
    fn extend_full_sort(&mut self) {
        let mut all: Vec<(i64, ContentLine)> = Vec::new();
        for (slot_idx, slot) in self.slots.iter().enumerate() {
            let Some(file) = &slot.file else { continue };
            let lf = file.read();
            for line_number in 0..lf.size() {
                let Ok(cl) = ContentLine::encode(slot_idx, line_number) else {
                    log::error!(
                        "{}: line {line_number} exceeds addressable range",
                        lf.filename()
                    );
                    break;
                };
                let millis = lf
                    .line(line_number)
                    .map(|line| line.time_millis())
                    .unwrap_or(0);
                all.push((millis, cl));
            }
        }

        // The content line packs (slot, line_number), so this key gives
        // the stable tie-break the ordering contract requires.
        all.sort_by_key(|&(millis, cl)| (millis, cl));

        for &(_, cl) in &all {
            self.index.push(cl);
        }
        for slot in &mut self.slots {
            if let Some(file) = &slot.file {
                slot.lines_indexed = file.read().size();
            }
        }
    }

    /// Extend the index by merging each file's unconsumed range.
    ///
    /// Stops as soon as any participating file is fully consumed: lines
    /// past another file's observed tail must wait for the next pass, so
    /// the "lines arrive monotonically once emitted" contract holds.
    fn extend_merge(&mut self) {
        let mut heap: BinaryHeap<Reverse<(i64, ContentLine)>> = BinaryHeap::new();

        for (slot_idx, slot) in self.slots.iter().enumerate() {
            let Some(file) = &slot.file else { continue };
            let lf = file.read();
            if slot.lines_indexed >= lf.size() {
                continue;
            }
            let Some(line) = lf.line(slot.lines_indexed) else {
                continue;
            };
            let Ok(cl) = ContentLine::encode(slot_idx, slot.lines_indexed) else {
                log::error!("{}: line range exhausted", lf.filename());
                continue;
            };
            heap.push(Reverse((line.time_millis(), cl)));
        }

        while let Some(Reverse((_, cl))) = heap.pop() {
            let (slot_idx, line_number) = cl.decode();
            self.index.push(cl);
            self.slots[slot_idx].lines_indexed = line_number + 1;

            let Some(file) = &self.slots[slot_idx].file else {
                break;
            };
            let lf = file.read();
            let next = self.slots[slot_idx].lines_indexed;
            if next >= lf.size() {
                break;
            }
            let Some(line) = lf.line(next) else { break };
            let Ok(next_cl) = ContentLine::encode(slot_idx, next) else {
                log::error!("{}: line range exhausted", lf.filename());
                break;
            };
            heap.push(Reverse((line.time_millis(), next_cl)));
        }
    }

    fn extend_filtered(&mut self, start_size: usize, delegate: &mut dyn IndexDelegate) {
        if start_size == 0 {
            delegate.index_start();
        }
        self.extend_filtered_from(start_size, delegate);
        delegate.index_complete();
    }

    fn extend_filtered_from(&mut self, start_size: usize, delegate: &mut dyn IndexDelegate) {
        let (in_mask, out_mask) = self.filters.enabled_mask();
        let extra = self.extra;

        for position in start_size..self.index.len() {
            let Some(cl) = self.index.get(position) else { break };
            let (slot_idx, line_number) = cl.decode();
            let Some(slot) = self.slots.get(slot_idx) else {
                continue;
            };
            let Some(file) = &slot.file else { continue };
            let line = {
                let lf = file.read();
                match lf.line(line_number) {
                    Some(line) => *line,
                    None => continue,
                }
            };

            if slot.filter_state.excluded(in_mask, out_mask, line_number) {
                continue;
            }
            if !extra.passes(&line) {
                continue;
            }

            self.filtered.push(position as u32);
            delegate.index_line(slot_idx, line_number);
        }
    }
}

/// Feed unprocessed lines of a file into its filter state.
///
/// Starts at the lowest line any predicate has yet to see, so a newly
/// registered predicate triggers a replay that the established predicates
/// skip. When the first new line continues the message finalized at the
/// previous observation boundary, the message is reopened first.
fn feed_filter_state(filters: &FilterSet, state: &mut FilterState, lf: &dyn LogFile) {
    let size = lf.size();
    let from = state.min_processed(filters, size);
    if from >= size {
        return;
    }

    if let Some(first) = lf.line(from) {
        if first.is_continued()
            && state.message_closed()
            && state.in_lockstep(filters)
            && state.has_snapshot(filters)
        {
            state.revert_to_last(filters, 0);
        }
    }

    for line_number in from..size {
        let continued = lf
            .line(line_number)
            .map(|line| line.is_continued())
            .unwrap_or(false);
        let body = match lf.read_line(line_number) {
            Ok(text) => text.into_owned(),
            Err(_) => String::new(),
        };
        state.add_line(filters, line_number, continued, &body);
    }
    state.end_of_message(filters);
}
