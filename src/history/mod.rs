//! Historical event reconstruction: replays the versioned cells of a row as
//! an ordered list of mutation events.

pub mod event;
pub mod filter;
pub mod iterator;
pub mod options;
pub mod reconstruct;
pub mod sort;

pub use event::{
    decode_events, encode_events, HistoricalEvent, HistoricalEventId, HistoricalEventKind, PropertyMetadataValue,
};
pub use filter::apply_filters;
pub use iterator::{EncodedHistory, HistoricalEventsIterator};
pub use options::{HistoricalEventsOptions, SortDirection};
pub use reconstruct::{HistoryReconstructor, HistoryStats, ALTER_VISIBILITY_COALESCE_WINDOW};
pub use sort::history_order;
