//! Element iterator
//!
//! Drives a [`CellSource`] row by row. Every cell of a row is fed through an
//! [`ElementAccumulator`]; at the row boundary the accumulator is either
//! encoded (row accepted) or dropped (row rejected). The iterator is then
//! positioned on the encoded element, or exhausted.
//!
//! ```text
//!   seek / next
//!        │
//!        ▼
//!   ┌──────────┐  row boundary, valid   ┌──────────┐
//!   │ Scanning │ ─────────────────────▶ │ Emitting │
//!   └──────────┘                        └──────────┘
//!        ▲   │ rejected / invalid            │ next
//!        │   └── skip row, keep scanning     │
//!        └───────────────────────────────────┘
//! ```

use std::sync::Arc;

use serde::Serialize;

use crate::cell::{utf8, Cell, CellSource, ScanRange};
use crate::element::{EdgeData, ElementAccumulator, ElementKind, RowControl, VertexData, DEFAULT_QUALIFIER_CACHE_SIZE};
use crate::error::{CellGraphError, Result};
use crate::fetch_hints::FetchHints;
use crate::options::IteratorOptions;

/// One accepted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedElement {
    pub row: String,
    /// Timestamp of the element's newest signal.
    pub timestamp: i64,
    /// Snapshot bytes, see [`crate::element::snapshot`].
    pub value: Vec<u8>,
}

/// Per-instance scan counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub rows_seen: u64,
    pub rows_emitted: u64,
    pub rows_rejected: u64,
    pub rows_failed: u64,
    pub cells_processed: u64,
}

pub struct ElementIterator<S, K: ElementKind> {
    source: S,
    hints: Arc<FetchHints>,
    accumulator: ElementAccumulator<K>,
    cache_capacity: usize,
    current: Option<EncodedElement>,
    stats: ScanStats,
}

pub type VertexIterator<S> = ElementIterator<S, VertexData>;
pub type EdgeIterator<S> = ElementIterator<S, EdgeData>;

impl<S: CellSource, K: ElementKind> ElementIterator<S, K> {
    pub fn new(source: S, hints: FetchHints) -> Self {
        Self::with_shared_hints(source, Arc::new(hints))
    }

    pub fn with_shared_hints(source: S, hints: Arc<FetchHints>) -> Self {
        Self::with_cache_capacity(source, hints, DEFAULT_QUALIFIER_CACHE_SIZE)
    }

    pub fn with_cache_capacity(source: S, hints: Arc<FetchHints>, cache_capacity: usize) -> Self {
        Self {
            source,
            hints,
            accumulator: ElementAccumulator::with_cache_capacity(cache_capacity),
            cache_capacity,
            current: None,
            stats: ScanStats::default(),
        }
    }

    /// Build from the flat option map handed over by the host.
    pub fn from_options(source: S, options: &IteratorOptions) -> Result<Self> {
        Ok(Self::new(source, FetchHints::from_options(options)?))
    }

    /// Independent iterator over `source` sharing this iterator's fetch hints.
    /// No per-row state is carried over.
    pub fn fork<T: CellSource>(&self, source: T) -> ElementIterator<T, K> {
        ElementIterator::with_cache_capacity(source, Arc::clone(&self.hints), self.cache_capacity)
    }

    pub fn hints(&self) -> &FetchHints {
        &self.hints
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// Snapshots are decoded by the reader, never by the scan iterator.
    pub fn decode_row(&self, _value: &[u8]) -> Result<Vec<Cell>> {
        Err(CellGraphError::UnsupportedOperation(
            "decode_row is not available on an encode-only iterator",
        ))
    }

    // -- Cursor ---------------------------------------------------------------

    pub fn seek(&mut self, range: &ScanRange) -> Result<()> {
        self.current = None;
        self.source.seek(range)?;
        self.find_next()
    }

    pub fn has_top(&self) -> bool {
        self.current.is_some()
    }

    pub fn top(&self) -> Option<&EncodedElement> {
        self.current.as_ref()
    }

    /// Move the current element out, leaving the iterator without a top.
    pub fn take_top(&mut self) -> Option<EncodedElement> {
        self.current.take()
    }

    /// Advance to the next accepted row.
    ///
    /// On error the offending row has been skipped, so calling `next` again
    /// continues with the following row.
    pub fn next(&mut self) -> Result<()> {
        self.current = None;
        self.find_next()
    }

    // -- Row processing -------------------------------------------------------

    fn find_next(&mut self) -> Result<()> {
        while let Some(cell) = self.source.top() {
            let row = cell.row().to_vec();
            match self.merge_row(&row) {
                Ok(Some(element)) => {
                    self.stats.rows_emitted += 1;
                    self.current = Some(element);
                    return Ok(());
                }
                Ok(None) => {}
                Err(err) => {
                    self.stats.rows_failed += 1;
                    tracing::warn!(row = %String::from_utf8_lossy(&row), error = %err, "row merge failed");
                    self.skip_row(&row)?;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Consume all cells of `row`. `None` if the row yields no element.
    fn merge_row(&mut self, row: &[u8]) -> Result<Option<EncodedElement>> {
        self.stats.rows_seen += 1;
        self.accumulator.start_row(utf8(row, "row")?);

        loop {
            let control = match self.source.top() {
                Some(cell) if cell.row() == row => self.accumulator.ingest(cell, &self.hints)?,
                _ => break,
            };
            self.stats.cells_processed += 1;
            self.source.next()?;
            if control == RowControl::Reject {
                tracing::debug!(row = %self.accumulator.data.id, "row deleted");
                self.stats.rows_rejected += 1;
                self.skip_row(row)?;
                return Ok(None);
            }
        }

        self.accumulator.finalize(&self.hints);
        if !self.accumulator.is_valid(&self.hints) {
            tracing::trace!(
                row = %self.accumulator.data.id,
                has_element = self.accumulator.data.has_element(),
                hidden = self.accumulator.data.is_hidden(),
                "row rejected"
            );
            self.stats.rows_rejected += 1;
            return Ok(None);
        }

        let value = self.accumulator.encode(&self.hints)?;
        Ok(Some(EncodedElement {
            row: self.accumulator.data.id.clone(),
            timestamp: self.accumulator.data.timestamp,
            value,
        }))
    }

    fn skip_row(&mut self, row: &[u8]) -> Result<()> {
        while self.source.top().is_some_and(|cell| cell.row() == row) {
            self.source.next()?;
        }
        Ok(())
    }
}
