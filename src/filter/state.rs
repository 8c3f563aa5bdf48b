//! Per-file filter evaluation state.
//!
//! For each attached file, `FilterState` records which registered
//! predicates matched each line as one bit per predicate, plus the
//! counters needed to evaluate messages rather than lines: a predicate
//! matches a multi-line message iff it matches the head or any
//! continuation, and at end-of-message the accumulated bit is spread over
//! every line of the message.
//!
//! Lines are fed strictly in file order. Each predicate keeps its own
//! progress (`filter_count + lines_for_message`), so re-feeding a prefix
//! is idempotent: predicates skip lines they have already seen. That is
//! what makes late-registered filters cheap — the whole file is replayed
//! and only the new predicate does work.

use crate::filter::{FilterSet, MAX_FILTERS};

#[derive(Debug, Clone)]
pub struct FilterState {
    /// Per-line bit pattern of which predicates matched.
    mask: Vec<u32>,

    /// Lines finalized (spread into `mask`) per predicate.
    filter_count: [usize; MAX_FILTERS],
    /// How many finalized lines matched, per predicate.
    filter_hits: [usize; MAX_FILTERS],

    /// Accumulator for the in-flight message.
    message_matched: [bool; MAX_FILTERS],
    lines_for_message: [usize; MAX_FILTERS],

    /// Snapshot taken at end-of-message, used to reopen or roll back the
    /// last message when a file is re-observed across a truncation.
    last_message_matched: [bool; MAX_FILTERS],
    last_lines_for_message: [usize; MAX_FILTERS],
}

impl Default for FilterState {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterState {
    pub fn new() -> Self {
        Self {
            mask: Vec::new(),
            filter_count: [0; MAX_FILTERS],
            filter_hits: [0; MAX_FILTERS],
            message_matched: [false; MAX_FILTERS],
            lines_for_message: [0; MAX_FILTERS],
            last_message_matched: [false; MAX_FILTERS],
            last_lines_for_message: [0; MAX_FILTERS],
        }
    }

    fn next_line(&self, predicate: usize) -> usize {
        self.filter_count[predicate] + self.lines_for_message[predicate]
    }

    /// Lowest line any registered predicate has yet to process, bounded
    /// by the file size. Feeding from here catches every predicate up.
    pub fn min_processed(&self, filters: &FilterSet, size: usize) -> usize {
        filters
            .registered()
            .map(|p| self.next_line(p))
            .min()
            .unwrap_or(size)
            .min(size)
    }

    /// True when the in-flight message accumulator is empty for every
    /// predicate.
    pub fn message_closed(&self) -> bool {
        self.lines_for_message.iter().all(|&n| n == 0)
    }

    /// True when at least one message has been finalized.
    pub fn has_snapshot(&self, filters: &FilterSet) -> bool {
        filters.registered().any(|p| self.filter_count[p] > 0)
    }

    /// True when every registered predicate has processed the same number
    /// of lines. Reopening the last message is only sound in lockstep.
    pub fn in_lockstep(&self, filters: &FilterSet) -> bool {
        let mut progress = filters.registered().map(|p| self.next_line(p));
        match progress.next() {
            Some(first) => progress.all(|n| n == first),
            None => true,
        }
    }

    /// Evaluate one line against every registered predicate.
    ///
    /// A head line first finalizes the in-flight message. Predicates that
    /// have already processed this line skip it.
    pub fn add_line(
        &mut self,
        filters: &FilterSet,
        line_number: usize,
        is_continued: bool,
        body: &str,
    ) {
        if !is_continued {
            self.end_of_message(filters);
        }

        for p in filters.registered() {
            if line_number != self.next_line(p) {
                continue;
            }
            if filters.matches(p, body) {
                self.message_matched[p] = true;
            }
            self.lines_for_message[p] += 1;
        }
    }

    /// Finalize the in-flight message: spread each predicate's
    /// accumulated bit over every line of the message, advance the
    /// counters, and snapshot for rollback.
    pub fn end_of_message(&mut self, filters: &FilterSet) {
        for p in filters.registered() {
            let lines = self.lines_for_message[p];
            if lines == 0 {
                continue;
            }

            let start = self.filter_count[p];
            let end = start + lines;
            if self.mask.len() < end {
                self.mask.resize(end, 0);
            }

            let matched = self.message_matched[p];
            if matched {
                let bit = 1u32 << p;
                for entry in &mut self.mask[start..end] {
                    *entry |= bit;
                }
                self.filter_hits[p] += lines;
            }
            self.filter_count[p] = end;

            self.last_message_matched[p] = matched;
            self.last_lines_for_message[p] = lines;
            self.message_matched[p] = false;
            self.lines_for_message[p] = 0;
        }
    }

    /// Reopen the last finalized message, rolling back `rollback_size` of
    /// its trailing lines.
    ///
    /// Used when a file is re-observed across a truncation that cut into
    /// the final message, and with `rollback_size == 0` to resume a
    /// message that gained continuation lines after being finalized at a
    /// previous observation boundary.
    pub fn revert_to_last(&mut self, filters: &FilterSet, rollback_size: usize) {
        for p in filters.registered() {
            debug_assert_eq!(
                self.lines_for_message[p], 0,
                "revert requires a closed message"
            );

            let lines = self.last_lines_for_message[p];
            if lines == 0 || lines > self.filter_count[p] {
                continue;
            }

            self.message_matched[p] = self.last_message_matched[p];
            self.lines_for_message[p] = lines;

            let bit = 1u32 << p;
            let start = self.filter_count[p] - lines;
            for entry in &mut self.mask[start..self.filter_count[p]] {
                *entry &= !bit;
            }
            self.filter_count[p] = start;
            if self.message_matched[p] {
                self.filter_hits[p] -= lines;
            }

            self.lines_for_message[p] = lines.saturating_sub(rollback_size);
        }
    }

    /// Whether a line is excluded under the given enabled masks.
    ///
    /// A line is excluded iff an enabled OUT predicate matched it, or IN
    /// predicates are enabled and none matched it.
    pub fn excluded(&self, in_mask: u32, out_mask: u32, line_number: usize) -> bool {
        let m = self.mask.get(line_number).copied().unwrap_or(0);
        (m & out_mask) != 0 || (in_mask != 0 && (m & in_mask) == 0)
    }

    /// Clear all state for predicate bits that are no longer registered.
    pub fn clear_deleted(&mut self, filters: &FilterSet) {
        for p in 0..MAX_FILTERS {
            if filters.is_registered(p) {
                continue;
            }
            if self.filter_count[p] == 0 && self.lines_for_message[p] == 0 {
                continue;
            }
            let bit = 1u32 << p;
            for entry in &mut self.mask {
                *entry &= !bit;
            }
            self.filter_count[p] = 0;
            self.filter_hits[p] = 0;
            self.message_matched[p] = false;
            self.lines_for_message[p] = 0;
            self.last_message_matched[p] = false;
            self.last_lines_for_message[p] = 0;
        }
    }

    pub fn hits(&self, predicate: usize) -> usize {
        self.filter_hits[predicate]
    }

    pub fn count(&self, predicate: usize) -> usize {
        self.filter_count[predicate]
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
