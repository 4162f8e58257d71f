//! Compaction-time deduplication. Both variants wrap a [`CellSource`] and
//! are cursors themselves, so they stack.
//!
//! [`CellSource`]: crate::cell::CellSource

pub mod buffered;
pub mod streaming;

pub use buffered::{RowDeduplicatingSource, DEFAULT_MAX_BUFFER_SIZE, OPT_MAX_BUFFER_SIZE};
pub use streaming::VersionDeduplicatingSource;
