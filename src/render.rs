//! Row materialization for the view.
//!
//! Given a view row, the renderer locates the owning file, rewrites the
//! timestamp to the canonical form, lays out the optional prefix columns
//! (file name, time offset to the nearest user mark), and computes the
//! styled ranges the host view draws from: level color, identifier tints,
//! file-boundary glyphs, search-hit markers, and the timestamp roles.
//!
//! Range bookkeeping mirrors the text edits: every insertion into the row
//! text is followed by a uniform shift of the accumulated ranges, so the
//! ranges stay anchored to the characters they describe.

pub mod accel;

pub use accel::{Direction, LogAccel};

use crate::bookmarks::{BookmarkKind, BookmarkStore};
use crate::error::{LogweaveError, Result};
use crate::format::AttrKind;
use crate::index::Indexer;
use crate::logfile::LogLevel;
use chrono::{TimeZone, Utc};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::Range;

/// Colors in the identifier tint palette.
pub const IDENT_PALETTE_SIZE: u8 = 8;

/// Width of the time-offset gutter, separator column included.
pub const TIME_OFFSET_WIDTH: usize = 13;

/// How a styled range should be drawn. Structural roles (timestamp, body,
/// original line) ride along so hosts can address row parts without
/// re-parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StyleRole {
    Timestamp,
    Body,
    OriginalLine,
    /// Whole-row (or token) severity color.
    Level(LogLevel),
    /// Stable tint index derived from the value's content.
    Identifier(u8),
    /// The next row starts a new day.
    Underline,
    AdjustedTime,
    SkewedTime,
    AltRow,
    OffsetTime,
    /// Offset-bar column when messages are speeding up / slowing down.
    AccelFaster,
    AccelSlower,
    FileGlyph(char),
    SearchHit,
    Meta,
    Partition(String),
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRange {
    pub range: Range<usize>,
    pub role: StyleRole,
}

/// A materialized view row.
#[derive(Debug, Clone, Default)]
pub struct RenderedLine {
    pub text: String,
    pub attrs: Vec<StyledRange>,
}

/// Rendering switches, the per-view display state.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderOptions {
    /// Emit the line body verbatim with no attributes.
    pub raw: bool,
    /// Materialize the full multi-line message instead of one line.
    pub full: bool,
    /// Route the text through the format's scrubber.
    pub scrub: bool,
    /// Prefix the full file name column.
    pub show_filename: bool,
    /// Prefix the shortened unique-path column.
    pub show_basename: bool,
    /// Prefix the time-offset gutter.
    pub time_offset: bool,
}

/// Stable palette index for an identifier value.
pub fn ident_color(value: &str) -> u8 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    (hasher.finish() % IDENT_PALETTE_SIZE as u64) as u8
}

/// Canonical `YYYY-MM-DD HH:MM:SS.nnn` rendering of an epoch timestamp.
pub fn format_canonical_timestamp(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| "1970-01-01 00:00:00.000".to_string())
}

/// Compact humanized duration, e.g. `3m07s` or `1d4h`.
pub fn humanize_duration(millis: i64) -> String {
    let sign = if millis < 0 { "-" } else { "" };
    let ms = millis.abs();
    let secs = ms / 1000;
    let sub = ms % 1000;
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let mins = (secs % 3_600) / 60;
    let s = secs % 60;

    if days > 0 {
        format!("{sign}{days}d{hours}h")
    } else if hours > 0 {
        format!("{sign}{hours}h{mins:02}m")
    } else if mins > 0 {
        format!("{sign}{mins}m{s:02}s")
    } else {
        format!("{sign}{s}.{sub:03}s")
    }
}

fn day_number(secs: i64) -> i64 {
    secs.div_euclid(86_400)
}

/// Shift every range boundary at or past `pos` right by `amount`.
fn shift_ranges(attrs: &mut [StyledRange], pos: usize, amount: usize) {
    for attr in attrs {
        if attr.range.start >= pos {
            attr.range.start += amount;
        }
        if attr.range.end >= pos {
            attr.range.end += amount;
        }
    }
}

/// Materializes rows against one indexer and bookmark store.
pub struct LineRenderer<'a> {
    indexer: &'a Indexer,
    bookmarks: &'a BookmarkStore,
}

impl<'a> LineRenderer<'a> {
    pub fn new(indexer: &'a Indexer, bookmarks: &'a BookmarkStore) -> Self {
        Self { indexer, bookmarks }
    }

    /// Materialize one view row.
    ///
    /// # Panics
    ///
    /// Rendering a row at or past `filtered_len` is a programming error.
    pub fn render(&self, row: usize, opts: &RenderOptions) -> Result<RenderedLine> {
        assert!(
            row < self.indexer.filtered_len(),
            "render row {row} out of bounds ({} rows)",
            self.indexer.filtered_len()
        );

        let cl = self
            .indexer
            .row_content_line(row)
            .ok_or_else(|| LogweaveError::render(format!("row {row} does not resolve")))?;
        let (slot, line_number) = cl.decode();
        let file = self
            .indexer
            .slot_file(slot)
            .ok_or_else(|| LogweaveError::render(format!("file for slot {slot} is gone")))?;
        let lf = file.read();
        let line = *lf
            .line(line_number)
            .ok_or_else(|| LogweaveError::render(format!("line {line_number} is gone")))?;

        if opts.raw {
            let text = lf.read_line(line_number)?.into_owned();
            return Ok(RenderedLine {
                text,
                attrs: Vec::new(),
            });
        }

        let mut text = if opts.full {
            lf.read_full_message(line_number)?
        } else {
            lf.read_line(line_number)?.into_owned()
        };

        let format = lf.format();
        if opts.scrub {
            format.scrub(&mut text);
        }

        let (mut fmt_attrs, values) = format.annotate(&text);
        if line.sub_offset() != 0 {
            fmt_attrs.clear();
        }

        let mut attrs: Vec<StyledRange> = Vec::new();

        for attr in &fmt_attrs {
            let role = match attr.kind {
                AttrKind::Timestamp => StyleRole::Timestamp,
                AttrKind::Body => StyleRole::Body,
                AttrKind::OriginalLine => StyleRole::OriginalLine,
                AttrKind::Level => StyleRole::Level(line.level()),
            };
            attrs.push(StyledRange {
                range: attr.range.clone(),
                role,
            });
        }

        attrs.push(StyledRange {
            range: 0..text.len(),
            role: StyleRole::Level(line.level()),
        });

        for value in &values {
            if !opts.full && value.sub_offset != line.sub_offset() {
                continue;
            }
            if value.hidden {
                attrs.push(StyledRange {
                    range: value.origin.clone(),
                    role: StyleRole::Hidden,
                });
            }
            if value.identifier {
                attrs.push(StyledRange {
                    range: value.origin.clone(),
                    role: StyleRole::Identifier(ident_color(&value.value)),
                });
            }
        }

        if let Some(next_line) = self
            .indexer
            .row_content_line(row + 1)
            .and_then(|next| self.indexer.line_for(next))
        {
            if day_number(next_line.time_secs()) > day_number(line.time_secs()) {
                attrs.push(StyledRange {
                    range: 0..text.len(),
                    role: StyleRole::Underline,
                });
            }
        }

        // Canonical timestamp rewrite, left-padding so that every later
        // offset shifts uniformly.
        if lf.is_time_adjusted() || format.is_machine_oriented() {
            if let Some(ts_range) = fmt_attrs
                .iter()
                .find(|a| a.kind == AttrKind::Timestamp)
                .map(|a| a.range.clone())
            {
                let canonical = format_canonical_timestamp(line.time_millis());
                let new_len = canonical.len();
                let padding = new_len.saturating_sub(ts_range.len());
                if padding > 0 {
                    text.insert_str(ts_range.start, &" ".repeat(padding));
                }
                text.replace_range(ts_range.start..ts_range.start + new_len, &canonical);
                if padding > 0 {
                    shift_ranges(&mut attrs, ts_range.start + 1, padding);
                }
            }
        }

        // Marker column, then the optional file-name column in front of it.
        let show_name = opts.show_filename || opts.show_basename;
        let name_width = if opts.show_filename {
            self.indexer.filename_width()
        } else {
            self.indexer.basename_width()
        };
        if show_name {
            let name = if opts.show_filename {
                lf.filename().to_string()
            } else {
                lf.unique_path().to_string()
            };
            let width = name_width.max(name.len());
            let mut prefix = name.clone();
            prefix.push_str(&" ".repeat(width - name.len() + 1));
            text.insert_str(0, &prefix);
        } else {
            text.insert(0, ' ');
        }

        shift_ranges(&mut attrs, 0, 1);

        let files = self.bookmarks.get(BookmarkKind::FileBoundary);
        let begins_file = files.contains(row);
        let next_begins_file = files.contains(row + 1);
        let glyph = if begins_file {
            if next_begins_file {
                '─'
            } else {
                '┌'
            }
        } else if next_begins_file {
            '└'
        } else {
            '│'
        };
        attrs.push(StyledRange {
            range: 0..1,
            role: StyleRole::FileGlyph(glyph),
        });

        if !opts.full && self.bookmarks.get(BookmarkKind::Search).contains(row) {
            attrs.push(StyledRange {
                range: 0..1,
                role: StyleRole::SearchHit,
            });
        }

        attrs.push(StyledRange {
            range: 0..1,
            role: StyleRole::Identifier(ident_color(lf.filename())),
        });

        if show_name {
            let width = name_width.max(if opts.show_filename {
                lf.filename().len()
            } else {
                lf.unique_path().len()
            });
            shift_ranges(&mut attrs, 0, width);
            attrs.push(StyledRange {
                range: 0..width + 1,
                role: StyleRole::Identifier(ident_color(lf.filename())),
            });
        }

        if opts.time_offset {
            let diff = self.offset_to_nearest_mark(row, line.time_millis());
            let gutter = format!("{:>12}|", humanize_duration(diff));
            debug_assert_eq!(gutter.len(), TIME_OFFSET_WIDTH);
            text.insert_str(0, &gutter);

            shift_ranges(&mut attrs, 0, TIME_OFFSET_WIDTH);
            attrs.push(StyledRange {
                range: 0..TIME_OFFSET_WIDTH,
                role: StyleRole::OffsetTime,
            });

            match self.line_accel_direction(row) {
                Direction::Steady => {}
                Direction::Accel => attrs.push(StyledRange {
                    range: TIME_OFFSET_WIDTH - 1..TIME_OFFSET_WIDTH,
                    role: StyleRole::AccelFaster,
                }),
                Direction::Decel => attrs.push(StyledRange {
                    range: TIME_OFFSET_WIDTH - 1..TIME_OFFSET_WIDTH,
                    role: StyleRole::AccelSlower,
                }),
            }
        }

        // Timestamp roles resolve against the shifted range.
        let ts_range = attrs
            .iter()
            .find(|a| a.role == StyleRole::Timestamp)
            .map(|a| a.range.clone());
        if let Some(ts_range) = ts_range {
            if lf.is_time_adjusted() {
                attrs.push(StyledRange {
                    range: ts_range.clone(),
                    role: StyleRole::AdjustedTime,
                });
            } else if (line.time_secs().div_euclid(300)) % 2 == 0 && !line.is_continued() {
                attrs.push(StyledRange {
                    range: ts_range.clone(),
                    role: StyleRole::AltRow,
                });
            }
            if line.is_time_skewed() {
                attrs.push(StyledRange {
                    range: ts_range,
                    role: StyleRole::SkewedTime,
                });
            }
        }

        // Annotation attrs: the row's own note, and the partition it
        // falls under.
        let meta_rows = self.bookmarks.get(BookmarkKind::Meta);
        let partition_row = if meta_rows.contains(row) {
            Some(row)
        } else {
            meta_rows.prev(row)
        };
        if let Some(part_row) = partition_row {
            if let Some(meta) = self
                .indexer
                .row_content_line(part_row)
                .and_then(|part_cl| self.bookmarks.metadata(part_cl))
            {
                if !meta.name.is_empty() {
                    attrs.push(StyledRange {
                        range: 0..text.len(),
                        role: StyleRole::Partition(meta.name.clone()),
                    });
                }
            }
        }
        if meta_rows.contains(row) {
            attrs.push(StyledRange {
                range: 0..text.len(),
                role: StyleRole::Meta,
            });
        }

        Ok(RenderedLine { text, attrs })
    }

    /// Milliseconds from this row to the nearest user mark: the closest
    /// mark above, or the first mark below when none precede, or the top
    /// of the stream when there are no marks at all.
    fn offset_to_nearest_mark(&self, row: usize, curr_millis: i64) -> i64 {
        let user = self.bookmarks.get(BookmarkKind::User);
        let anchor_row = match (user.prev(row), user.next(row)) {
            (None, Some(next)) => next,
            (Some(prev), _) => prev,
            (None, None) => 0,
        };
        let anchor_millis = self
            .indexer
            .row_content_line(anchor_row)
            .and_then(|cl| self.indexer.line_for(cl))
            .map(|l| l.time_millis())
            .unwrap_or(curr_millis);
        curr_millis - anchor_millis
    }

    /// Message-rate trend ending at `row`, skipping continuation lines.
    fn line_accel_direction(&self, row: usize) -> Direction {
        let mut accel = LogAccel::new();
        let mut current = row as isize;

        while current >= 0 {
            let Some(line) = self
                .indexer
                .row_content_line(current as usize)
                .and_then(|cl| self.indexer.line_for(cl))
            else {
                break;
            };

            if line.is_continued() {
                current -= 1;
                continue;
            }

            if !accel.add_point(line.time_millis()) {
                break;
            }
            current -= 1;
        }

        accel.get_direction()
    }
}
