//! Filter predicates and the registered filter set.
//!
//! Up to 32 predicates can be registered at once; each gets a stable bit
//! slot that per-file [`FilterState`] masks are keyed by. A predicate is
//! tagged with a role: `Include` filters admit only matching messages,
//! `Exclude` filters drop matching messages. Extra conditions that cannot
//! be precomputed into the bitmasks (minimum level, marked-only, time
//! window) live on the indexer and are tested lazily.

pub mod state;

pub use state::FilterState;

use crate::error::{LogweaveError, Result};
use regex::Regex;

/// Hard cap on simultaneously registered predicates; one bit each.
pub const MAX_FILTERS: usize = 32;

/// Whether a predicate admits or drops the messages it matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRole {
    Include,
    Exclude,
}

/// A single filter predicate over a line body.
#[derive(Debug, Clone)]
pub enum LogFilter {
    /// Regular expression match anywhere in the line.
    Regex(Regex),
    /// Exact `key=value` field token match.
    FieldMatch { key: String, value: String },
    /// Conjunction of substring terms; every term must appear.
    Expression(Vec<String>),
    /// Placeholder that matches nothing but keeps its bit slot.
    Empty,
}

impl LogFilter {
    /// Build a regex filter, falling back to a quoted literal when the
    /// pattern does not compile.
    pub fn regex(pattern: &str) -> Result<LogFilter> {
        match Regex::new(pattern) {
            Ok(re) => Ok(LogFilter::Regex(re)),
            Err(first_err) => {
                let quoted = regex::escape(pattern);
                log::info!("invalid filter regex, using quoted: {quoted}");
                Regex::new(&quoted).map(LogFilter::Regex).map_err(|_| {
                    LogweaveError::RegexCompileFailed {
                        message: first_err.to_string(),
                    }
                })
            }
        }
    }

    pub fn expression(expr: &str) -> LogFilter {
        LogFilter::Expression(expr.split_whitespace().map(str::to_string).collect())
    }

    pub fn matches(&self, body: &str) -> bool {
        match self {
            LogFilter::Regex(re) => re.is_match(body),
            LogFilter::FieldMatch { key, value } => {
                let token_len = key.len() + value.len() + 1;
                body.split_whitespace().any(|tok| {
                    tok.len() == token_len
                        && tok.starts_with(key.as_str())
                        && tok.as_bytes()[key.len()] == b'='
                        && tok.ends_with(value.as_str())
                })
            }
            LogFilter::Expression(terms) => terms.iter().all(|t| body.contains(t.as_str())),
            LogFilter::Empty => false,
        }
    }
}

struct FilterEntry {
    filter: LogFilter,
    role: FilterRole,
    enabled: bool,
}

/// The registered predicates and their enablement state.
///
/// `generation` increments on every structural or enablement change so
/// collaborators can detect that the filtered index is stale.
#[derive(Default)]
pub struct FilterSet {
    entries: Vec<Option<FilterEntry>>,
    generation: u64,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a predicate, returning its bit index.
    pub fn add_filter(&mut self, filter: LogFilter, role: FilterRole) -> Result<usize> {
        let index = match self.entries.iter().position(Option::is_none) {
            Some(free) => free,
            None if self.entries.len() < MAX_FILTERS => {
                self.entries.push(None);
                self.entries.len() - 1
            }
            None => {
                return Err(LogweaveError::other(format!(
                    "filter limit of {MAX_FILTERS} reached"
                )))
            }
        };

        self.entries[index] = Some(FilterEntry {
            filter,
            role,
            enabled: true,
        });
        self.generation += 1;
        Ok(index)
    }

    /// Unregister a predicate, freeing its bit slot for reuse.
    pub fn remove_filter(&mut self, index: usize) {
        if let Some(slot) = self.entries.get_mut(index) {
            if slot.take().is_some() {
                self.generation += 1;
            }
        }
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) {
        if let Some(Some(entry)) = self.entries.get_mut(index) {
            if entry.enabled != enabled {
                entry.enabled = enabled;
                self.generation += 1;
            }
        }
    }

    pub fn is_registered(&self, index: usize) -> bool {
        matches!(self.entries.get(index), Some(Some(_)))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Bit masks of the enabled include and exclude predicates.
    pub fn enabled_mask(&self) -> (u32, u32) {
        let mut in_mask = 0u32;
        let mut out_mask = 0u32;
        for (idx, entry) in self.entries.iter().enumerate() {
            let Some(entry) = entry else { continue };
            if !entry.enabled {
                continue;
            }
            match entry.role {
                FilterRole::Include => in_mask |= 1 << idx,
                FilterRole::Exclude => out_mask |= 1 << idx,
            }
        }
        (in_mask, out_mask)
    }

    /// Evaluate predicate `index` against a line body.
    ///
    /// Registered-but-disabled predicates still evaluate so their mask
    /// bits stay current and re-enabling is a mask change, not a rescan.
    pub fn matches(&self, index: usize, body: &str) -> bool {
        match self.entries.get(index) {
            Some(Some(entry)) => entry.filter.matches(body),
            _ => false,
        }
    }

    /// Indices of all registered predicates.
    pub fn registered(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_some())
            .map(|(idx, _)| idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_filter_matches() {
        let f = LogFilter::regex("fo+").unwrap();
        assert!(f.matches("seen foo here"));
        assert!(!f.matches("nothing"));
    }

    #[test]
    fn broken_regex_falls_back_to_literal() {
        let f = LogFilter::regex("a(b").unwrap();
        assert!(f.matches("literal a(b text"));
        assert!(!f.matches("ab"));
    }

    #[test]
    fn field_match_requires_exact_token() {
        let f = LogFilter::FieldMatch {
            key: "conn".to_string(),
            value: "42".to_string(),
        };
        assert!(f.matches("accepted conn=42 from peer"));
        assert!(!f.matches("accepted conn=421 from peer"));
        assert!(!f.matches("accepted conn= from peer"));
    }

    #[test]
    fn expression_requires_all_terms() {
        let f = LogFilter::expression("disk full");
        assert!(f.matches("disk is full"));
        assert!(!f.matches("disk is fine"));
    }

    #[test]
    fn empty_filter_matches_nothing() {
        assert!(!LogFilter::Empty.matches("anything"));
    }

    #[test]
    fn enabled_mask_tracks_roles() {
        let mut set = FilterSet::new();
        let inc = set
            .add_filter(LogFilter::expression("foo"), FilterRole::Include)
            .unwrap();
        let exc = set
            .add_filter(LogFilter::expression("secret"), FilterRole::Exclude)
            .unwrap();

        assert_eq!(set.enabled_mask(), (1 << inc, 1 << exc));

        set.set_enabled(inc, false);
        assert_eq!(set.enabled_mask(), (0, 1 << exc));

        set.remove_filter(exc);
        assert_eq!(set.enabled_mask(), (0, 0));
    }

    #[test]
    fn slots_are_reused_after_removal() {
        let mut set = FilterSet::new();
        let a = set
            .add_filter(LogFilter::expression("a"), FilterRole::Include)
            .unwrap();
        let gen_before = set.generation();
        set.remove_filter(a);
        let b = set
            .add_filter(LogFilter::expression("b"), FilterRole::Include)
            .unwrap();
        assert_eq!(a, b);
        assert!(set.generation() > gen_before);
    }

    #[test]
    fn filter_limit_is_enforced() {
        let mut set = FilterSet::new();
        for _ in 0..MAX_FILTERS {
            set.add_filter(LogFilter::Empty, FilterRole::Include).unwrap();
        }
        assert!(set
            .add_filter(LogFilter::Empty, FilterRole::Include)
            .is_err());
    }
}
