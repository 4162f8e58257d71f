//! cellgraph: row-merge and history reconstruction for a property graph
//! stored as sorted, independently versioned cells.
//!
//! Three consumers run over the same cursor ([`cell::CellSource`]):
//! - [`iterator::ElementIterator`] merges each row into a current-state snapshot
//! - [`history::HistoricalEventsIterator`] rebuilds the mutation history of a row
//! - [`dedup`] collapses redundant versions for compaction

pub mod cell;
pub mod codec;
pub mod dedup;
pub mod element;
pub mod error;
pub mod fetch_hints;
pub mod history;
pub mod iterator;
pub mod options;

pub use cell::{Cell, CellSource, ColumnFamily, ElementType, Key, MemoryCellSource, ScanRange};
pub use codec::EdgeInfo;
pub use dedup::{RowDeduplicatingSource, VersionDeduplicatingSource};
pub use element::{decode_snapshot, EdgeData, ElementAccumulator, ElementKind, ElementSnapshot, VertexData};
pub use error::{CellGraphError, Result};
pub use fetch_hints::FetchHints;
pub use history::{
    decode_events, HistoricalEvent, HistoricalEventId, HistoricalEventKind, HistoricalEventsIterator,
    HistoricalEventsOptions, SortDirection,
};
pub use iterator::{EdgeIterator, ElementIterator, EncodedElement, ScanStats, VertexIterator};
pub use options::IteratorOptions;
