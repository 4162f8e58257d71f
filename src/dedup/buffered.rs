//! Buffered row deduplication for compaction.
//!
//! A whole row is read into memory (bounded by `max_buffer_size` bytes) and
//! reduced before any of it is emitted:
//!
//! - property and property soft-delete versions equal to the next older
//!   version of the same column are removed
//! - metadata of a removed property version (same name, key, property
//!   visibility and timestamp) is removed with it
//!
//! Survivors are emitted in scan order. Because a row is only meaningful as
//! a whole, seeking past a key never resumes inside a row.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::cell::{Cell, CellSource, ColumnFamily, Key, ScanRange};
use crate::codec::qualifier;
use crate::error::{CellGraphError, Result};
use crate::options::{self, IteratorOptions};

pub const OPT_MAX_BUFFER_SIZE: &str = "maxBufferSize";

/// 10 MiB.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug)]
pub struct RowDeduplicatingSource<S> {
    source: S,
    max_buffer_size: usize,
    /// Survivors of the current row, in scan order.
    buffer: VecDeque<Cell>,
    removed: u64,
}

impl<S: CellSource> RowDeduplicatingSource<S> {
    pub fn new(source: S) -> Self {
        Self::with_max_buffer_size(source, DEFAULT_MAX_BUFFER_SIZE)
    }

    pub fn with_max_buffer_size(source: S, max_buffer_size: usize) -> Self {
        Self {
            source,
            max_buffer_size,
            buffer: VecDeque::new(),
            removed: 0,
        }
    }

    pub fn from_options(source: S, opts: &IteratorOptions) -> Result<Self> {
        let max = options::get(opts, OPT_MAX_BUFFER_SIZE)?.unwrap_or(DEFAULT_MAX_BUFFER_SIZE);
        Ok(Self::with_max_buffer_size(source, max))
    }

    pub fn max_buffer_size(&self) -> usize {
        self.max_buffer_size
    }

    /// Cells dropped so far.
    pub fn removed(&self) -> u64 {
        self.removed
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    /// Buffer the next row that has survivors. A row over budget is skipped
    /// and reported as `BufferOverflow`; the following call moves on.
    fn fill_buffer(&mut self) -> Result<()> {
        self.buffer.clear();
        while let Some(first) = self.source.top() {
            let row = first.row().to_vec();
            let mut cells = Vec::new();
            let mut size = 0usize;
            while let Some(cell) = self.source.top() {
                if cell.row() != row.as_slice() {
                    break;
                }
                size += cell.size_bytes();
                if size > self.max_buffer_size {
                    let row_name = String::from_utf8_lossy(&row).into_owned();
                    tracing::warn!(row = %row_name, size, max = self.max_buffer_size, "row exceeds dedup buffer");
                    self.skip_row(&row)?;
                    return Err(CellGraphError::BufferOverflow {
                        row: row_name,
                        size,
                        max: self.max_buffer_size,
                    });
                }
                cells.push(cell.clone());
                self.source.next()?;
            }

            let before = cells.len();
            let survivors = dedup_row(cells)?;
            self.removed += (before - survivors.len()) as u64;
            if !survivors.is_empty() {
                self.buffer.extend(survivors);
                return Ok(());
            }
        }
        Ok(())
    }

    fn skip_row(&mut self, row: &[u8]) -> Result<()> {
        while self.source.top().is_some_and(|cell| cell.row() == row) {
            self.source.next()?;
        }
        Ok(())
    }
}

impl<S: CellSource> CellSource for RowDeduplicatingSource<S> {
    /// An exclusive start key resumes at the start of the following row.
    fn seek(&mut self, range: &ScanRange) -> Result<()> {
        let effective = match &range.start {
            Some(start) if !range.start_inclusive => ScanRange {
                start: Some(Key::row_start(row_successor(&start.row))),
                start_inclusive: true,
                end_row: range.end_row.clone(),
            },
            _ => range.clone(),
        };
        self.source.seek(&effective)?;
        self.fill_buffer()
    }

    fn has_top(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn top(&self) -> Option<&Cell> {
        self.buffer.front()
    }

    fn next(&mut self) -> Result<()> {
        self.buffer.pop_front();
        if self.buffer.is_empty() {
            self.fill_buffer()?;
        }
        Ok(())
    }
}

/// Smallest row strictly greater than `row`.
fn row_successor(row: &[u8]) -> Vec<u8> {
    let mut next = Vec::with_capacity(row.len() + 1);
    next.extend_from_slice(row);
    next.push(0);
    next
}

/// Reduce one row. Input and output are in scan order.
fn dedup_row(cells: Vec<Cell>) -> Result<Vec<Cell>> {
    let mut by_time: Vec<usize> = (0..cells.len()).collect();
    by_time.sort_by_key(|&i| cells[i].timestamp());

    let mut removed = vec![false; cells.len()];
    // (name, key, property visibility, timestamp) of removed property versions.
    let mut removed_properties: HashSet<(String, String, String, i64)> = HashSet::new();

    {
        let mut previous: HashMap<(&[u8], &[u8], &[u8]), &[u8]> = HashMap::new();
        for &i in &by_time {
            let cell = &cells[i];
            let family = cell.family();
            if !matches!(family, ColumnFamily::Property | ColumnFamily::PropertySoftDelete) {
                continue;
            }
            let column = (cell.column_family(), cell.column_qualifier(), cell.visibility());
            if previous.insert(column, cell.value()) != Some(cell.value()) {
                continue;
            }
            removed[i] = true;
            if family == ColumnFamily::Property {
                let parts = qualifier::split(cell.qualifier_str()?, 2)?;
                removed_properties.insert((
                    parts[0].to_string(),
                    parts[1].to_string(),
                    cell.visibility_str()?.to_string(),
                    cell.timestamp(),
                ));
            }
        }
    }

    if !removed_properties.is_empty() {
        for (i, cell) in cells.iter().enumerate() {
            if cell.family() != ColumnFamily::PropertyMetadata {
                continue;
            }
            let parts = qualifier::split(cell.qualifier_str()?, 4)?;
            let owner = (
                parts[0].to_string(),
                parts[1].to_string(),
                parts[2].to_string(),
                cell.timestamp(),
            );
            if removed_properties.contains(&owner) {
                removed[i] = true;
            }
        }
    }

    Ok(cells
        .into_iter()
        .zip(removed)
        .filter_map(|(cell, removed)| (!removed).then_some(cell))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{collect_cells, MemoryCellSource};

    fn cell(row: &str, cf: &str, cq: &str, ts: i64, value: &str) -> Cell {
        Cell::new(Key::new(row, cf, cq, "", ts), value.as_bytes().to_vec())
    }

    fn prop(ts: i64, value: &str) -> Cell {
        cell("v1", "PROP", "age\u{1f}k", ts, value)
    }

    fn meta(ts: i64) -> Cell {
        cell("v1", "PROPMETA", "age\u{1f}k\u{1f}\u{1f}src", ts, "m")
    }

    fn run(cells: Vec<Cell>) -> Vec<Cell> {
        let mut source = RowDeduplicatingSource::new(MemoryCellSource::new(cells));
        source.seek(&ScanRange::all()).unwrap();
        collect_cells(&mut source).unwrap()
    }

    #[test]
    fn test_repeated_values_keep_oldest() {
        let out = run(vec![prop(1, "30"), prop(2, "30"), prop(3, "30")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].timestamp(), 1);
    }

    #[test]
    fn test_alternating_values_survive() {
        let out = run(vec![prop(1, "30"), prop(2, "31"), prop(3, "30")]);
        assert_eq!(out.len(), 3);
        let ts: Vec<i64> = out.iter().map(Cell::timestamp).collect();
        assert_eq!(ts, vec![3, 2, 1]);
    }

    #[test]
    fn test_metadata_of_removed_property_removed() {
        let out = run(vec![prop(1, "30"), meta(1), prop(2, "30"), meta(2), cell("v1", "V", "", 1, "")]);
        let kept: Vec<(String, i64)> = out
            .iter()
            .map(|c| (String::from_utf8_lossy(c.column_family()).into_owned(), c.timestamp()))
            .collect();
        assert_eq!(
            kept,
            vec![("PROP".into(), 1), ("PROPMETA".into(), 1), ("V".into(), 1)]
        );
    }

    #[test]
    fn test_other_families_untouched() {
        let out = run(vec![cell("v1", "V", "", 1, ""), cell("v1", "V", "", 2, "")]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_overflow_is_recoverable() {
        let big = "x".repeat(64);
        let mut source = RowDeduplicatingSource::with_max_buffer_size(
            MemoryCellSource::new(vec![
                cell("v1", "PROP", "a\u{1f}k", 1, &big),
                cell("v1", "PROP", "b\u{1f}k", 1, &big),
                cell("v2", "V", "", 1, ""),
            ]),
            100,
        );
        let err = source.seek(&ScanRange::all()).unwrap_err();
        assert_eq!(err.code(), "BUFFER_OVERFLOW");
        assert!(err.is_recoverable());

        source.next().unwrap();
        assert_eq!(source.top().map(|c| c.row().to_vec()), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_exclusive_seek_skips_to_next_row() {
        let cells = vec![
            cell("v1", "PROP", "a\u{1f}k", 1, "1"),
            cell("v1", "V", "", 1, ""),
            cell("v2", "V", "", 1, ""),
        ];
        let mut source = RowDeduplicatingSource::new(MemoryCellSource::new(cells));
        source.seek(&ScanRange::all()).unwrap();
        let first = source.top().unwrap().key.clone();
        assert_eq!(first.row, b"v1");

        source.seek(&ScanRange::after_key(first)).unwrap();
        let rest = collect_cells(&mut source).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].row(), b"v2");
    }

    #[test]
    fn test_from_options() {
        let mut opts = IteratorOptions::new();
        opts.insert(OPT_MAX_BUFFER_SIZE.into(), "2048".into());
        let source = RowDeduplicatingSource::from_options(MemoryCellSource::default(), &opts).unwrap();
        assert_eq!(source.max_buffer_size(), 2048);

        let source = RowDeduplicatingSource::from_options(MemoryCellSource::default(), &IteratorOptions::new()).unwrap();
        assert_eq!(source.max_buffer_size(), DEFAULT_MAX_BUFFER_SIZE);
    }
}
