//! Row merge iterator: one encoded snapshot per accepted row.

pub mod element_iterator;

pub use element_iterator::{EdgeIterator, ElementIterator, EncodedElement, ScanStats, VertexIterator};
