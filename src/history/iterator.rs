//! Historical events iterator: one framed event list per row with history.

use std::sync::Arc;

use crate::cell::{utf8, Cell, CellSource, ScanRange};
use crate::error::Result;
use crate::history::event::{encode_events, HistoricalEventId};
use crate::history::filter::apply_filters;
use crate::history::options::HistoricalEventsOptions;
use crate::history::reconstruct::{HistoryReconstructor, HistoryStats};
use crate::options::IteratorOptions;

/// Events of one row after filtering, framed by [`encode_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedHistory {
    pub row: String,
    pub event_count: usize,
    /// Id of the last event in output order; pass it back as `after` to resume.
    pub last_id: Option<HistoricalEventId>,
    pub value: Vec<u8>,
}

pub struct HistoricalEventsIterator<S> {
    source: S,
    options: Arc<HistoricalEventsOptions>,
    reconstructor: HistoryReconstructor,
    row_cells: Vec<Cell>,
    current: Option<EncodedHistory>,
}

impl<S: CellSource> HistoricalEventsIterator<S> {
    pub fn new(source: S, options: HistoricalEventsOptions) -> Self {
        Self::with_shared_options(source, Arc::new(options))
    }

    pub fn with_shared_options(source: S, options: Arc<HistoricalEventsOptions>) -> Self {
        Self {
            source,
            reconstructor: HistoryReconstructor::new(&options),
            options,
            row_cells: Vec::new(),
            current: None,
        }
    }

    pub fn from_options(source: S, options: &IteratorOptions) -> Result<Self> {
        Ok(Self::new(source, HistoricalEventsOptions::from_options(options)?))
    }

    /// Independent iterator over `source` with the same options.
    pub fn fork<T: CellSource>(&self, source: T) -> HistoricalEventsIterator<T> {
        HistoricalEventsIterator::with_shared_options(source, Arc::clone(&self.options))
    }

    pub fn options(&self) -> &HistoricalEventsOptions {
        &self.options
    }

    pub fn stats(&self) -> HistoryStats {
        self.reconstructor.stats()
    }

    pub fn seek(&mut self, range: &ScanRange) -> Result<()> {
        self.current = None;
        self.source.seek(range)?;
        self.find_next()
    }

    pub fn has_top(&self) -> bool {
        self.current.is_some()
    }

    pub fn top(&self) -> Option<&EncodedHistory> {
        self.current.as_ref()
    }

    pub fn take_top(&mut self) -> Option<EncodedHistory> {
        self.current.take()
    }

    /// Advance to the next row with at least one event. A row that fails is
    /// fully consumed before the error is returned.
    pub fn next(&mut self) -> Result<()> {
        self.current = None;
        self.find_next()
    }

    fn find_next(&mut self) -> Result<()> {
        while self.source.has_top() {
            let row = self.read_row()?;
            if let Some(history) = self.replay_row(row)? {
                self.current = Some(history);
                return Ok(());
            }
        }
        Ok(())
    }

    /// Copy out every cell of the row under the cursor.
    fn read_row(&mut self) -> Result<Vec<u8>> {
        self.row_cells.clear();
        let Some(first) = self.source.top() else {
            return Ok(Vec::new());
        };
        let row = first.row().to_vec();
        while let Some(cell) = self.source.top() {
            if cell.row() != row.as_slice() {
                break;
            }
            self.row_cells.push(cell.clone());
            self.source.next()?;
        }
        Ok(row)
    }

    fn replay_row(&mut self, row: Vec<u8>) -> Result<Option<EncodedHistory>> {
        let row = utf8(&row, "row")?.to_string();
        let cells = std::mem::take(&mut self.row_cells);
        let mut events = self.reconstructor.reconstruct(&row, cells).map_err(|err| {
            tracing::warn!(%row, error = %err, "history replay failed");
            err
        })?;
        let produced = events.len();
        apply_filters(&mut events, &self.options);
        tracing::trace!(%row, produced, kept = events.len(), "history replayed");
        if events.is_empty() {
            return Ok(None);
        }
        Ok(Some(EncodedHistory {
            last_id: events.last().map(|e| e.id),
            event_count: events.len(),
            value: encode_events(&events)?,
            row,
        }))
    }
}
