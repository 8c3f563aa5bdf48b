//! # logweave - Multi-File Log View Engine
//!
//! The index and view core of a log viewer that follows many append-only
//! files at once: each file keeps its own timestamp format and growth
//! rate, and logweave presents them as a single chronologically merged,
//! filterable, annotated stream.
//!
//! ## Features
//!
//! - **Incremental merging**: files are re-observed between frames and
//!   folded into the global order by k-way merge; rotations and
//!   out-of-order appends trigger a clean full rebuild
//! - **Message-aware filtering**: include/exclude predicates evaluate
//!   whole multi-line messages, precomputed into per-line bitmasks
//! - **Row materialization**: canonical timestamps, file columns, offset
//!   gutters, level and identifier styling computed per row on demand
//! - **Streaming search**: grep workers scan off-thread and post hits
//!   back into the view's bookmarks
//!
//! ## Architecture
//!
//! The library is organized into focused modules:
//!
//! - [`error`] - Centralized error types and handling
//! - [`logfile`] - The log file capability and the in-memory reference file
//! - [`format`] - The log format capability and the reference prefix format
//! - [`index`] - Content-line addressing, the merged index, the indexer
//! - [`filter`] - Filter predicates and per-file filter state
//! - [`bookmarks`] - Typed row sets and user annotations
//! - [`render`] - Row text and styled-range materialization
//! - [`search`] - Search driver and grep workers
//! - [`history`] - Back/forward location history
//! - [`view`] - Capabilities consumed from the hosting view

// Core modules
pub mod error;
pub mod format;
pub mod logfile;

// The index engine
pub mod filter;
pub mod index;

// View-facing subsystems
pub mod bookmarks;
pub mod history;
pub mod render;
pub mod search;
pub mod view;

// Re-export commonly used types for convenience
pub use error::{LogweaveError, Result};

// Public API surface for external usage
pub use bookmarks::{BookmarkKind, BookmarkStore};
pub use index::{ContentLine, Indexer, RebuildResult};
pub use logfile::{BufferLogFile, LogFile, LogLevel, SharedLogFile};
pub use render::{LineRenderer, RenderOptions, RenderedLine};
pub use search::{SearchDriver, SearchEvent, SnapshotSource};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
