//! Sorted cell model and the pull cursor every consumer is driven by.
//!
//! A row is a run of cells sharing `row`. Within a row cells are ordered by
//! column family, column qualifier, visibility and then **descending**
//! timestamp, so the newest version of a column is always seen first.
//!
//! Consumers borrow the current cell through [`CellSource::top`] and must copy
//! anything they keep before calling [`CellSource::next`].

pub mod family;

use std::cmp::Ordering;

pub use family::{ColumnFamily, ElementType, HiddenMarker};

use crate::error::{CellGraphError, Result};

// ── Key ────────────────────────────────────────────────────────────

/// Sort key of a cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Key {
    pub row: Vec<u8>,
    pub column_family: Vec<u8>,
    pub column_qualifier: Vec<u8>,
    pub visibility: Vec<u8>,
    pub timestamp: i64,
}

impl Key {
    pub fn new(
        row: impl Into<Vec<u8>>,
        column_family: impl Into<Vec<u8>>,
        column_qualifier: impl Into<Vec<u8>>,
        visibility: impl Into<Vec<u8>>,
        timestamp: i64,
    ) -> Self {
        Self {
            row: row.into(),
            column_family: column_family.into(),
            column_qualifier: column_qualifier.into(),
            visibility: visibility.into(),
            timestamp,
        }
    }

    /// Smallest possible key of `row`.
    pub fn row_start(row: impl Into<Vec<u8>>) -> Self {
        Self::new(row, Vec::new(), Vec::new(), Vec::new(), i64::MAX)
    }

    /// Compare everything except the timestamp.
    pub fn same_column(&self, other: &Key) -> bool {
        self.row == other.row
            && self.column_family == other.column_family
            && self.column_qualifier == other.column_qualifier
            && self.visibility == other.visibility
    }

    /// Approximate in-memory footprint, used for buffer budgets.
    pub fn size_bytes(&self) -> usize {
        self.row.len()
            + self.column_family.len()
            + self.column_qualifier.len()
            + self.visibility.len()
            + std::mem::size_of::<i64>()
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.row
            .cmp(&other.row)
            .then_with(|| self.column_family.cmp(&other.column_family))
            .then_with(|| self.column_qualifier.cmp(&other.column_qualifier))
            .then_with(|| self.visibility.cmp(&other.visibility))
            // newest first
            .then_with(|| other.timestamp.cmp(&self.timestamp))
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ── Cell ───────────────────────────────────────────────────────────

/// One versioned key/value record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cell {
    pub key: Key,
    pub value: Vec<u8>,
}

impl Cell {
    pub fn new(key: Key, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }

    #[inline]
    pub fn row(&self) -> &[u8] {
        &self.key.row
    }

    #[inline]
    pub fn column_family(&self) -> &[u8] {
        &self.key.column_family
    }

    #[inline]
    pub fn column_qualifier(&self) -> &[u8] {
        &self.key.column_qualifier
    }

    #[inline]
    pub fn visibility(&self) -> &[u8] {
        &self.key.visibility
    }

    #[inline]
    pub fn timestamp(&self) -> i64 {
        self.key.timestamp
    }

    #[inline]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Move the value out, leaving an empty buffer behind.
    pub fn take_value(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.value)
    }

    pub fn into_parts(self) -> (Key, Vec<u8>) {
        (self.key, self.value)
    }

    /// Role of this cell, from its column family (and the row-deletion sentinel).
    pub fn family(&self) -> ColumnFamily {
        ColumnFamily::classify(self.column_family(), self.column_qualifier(), self.value())
    }

    pub fn row_str(&self) -> Result<&str> {
        utf8(self.row(), "row")
    }

    pub fn qualifier_str(&self) -> Result<&str> {
        utf8(self.column_qualifier(), "column qualifier")
    }

    pub fn visibility_str(&self) -> Result<&str> {
        utf8(self.visibility(), "visibility")
    }

    pub fn size_bytes(&self) -> usize {
        self.key.size_bytes() + self.value.len()
    }
}

pub(crate) fn utf8<'a>(bytes: &'a [u8], what: &str) -> Result<&'a str> {
    std::str::from_utf8(bytes)
        .map_err(|e| CellGraphError::InvalidFormat(format!("{} is not UTF-8: {}", what, e)))
}

// ── Scan Range ─────────────────────────────────────────────────────

/// Range of keys a cursor is positioned over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanRange {
    pub start: Option<Key>,
    pub start_inclusive: bool,
    /// Last row (inclusive) to return.
    pub end_row: Option<Vec<u8>>,
}

impl ScanRange {
    pub fn all() -> Self {
        Self {
            start: None,
            start_inclusive: true,
            end_row: None,
        }
    }

    /// Exactly one row.
    pub fn row(row: impl Into<Vec<u8>>) -> Self {
        let row = row.into();
        Self {
            start: Some(Key::row_start(row.clone())),
            start_inclusive: true,
            end_row: Some(row),
        }
    }

    /// Every row from `row` (inclusive) onwards.
    pub fn from_row(row: impl Into<Vec<u8>>) -> Self {
        Self {
            start: Some(Key::row_start(row)),
            start_inclusive: true,
            end_row: None,
        }
    }

    /// Resume strictly after `key`.
    pub fn after_key(key: Key) -> Self {
        Self {
            start: Some(key),
            start_inclusive: false,
            end_row: None,
        }
    }

    pub fn with_end_row(mut self, end_row: impl Into<Vec<u8>>) -> Self {
        self.end_row = Some(end_row.into());
        self
    }

    pub fn is_before_start(&self, key: &Key) -> bool {
        match &self.start {
            None => false,
            Some(start) if self.start_inclusive => key < start,
            Some(start) => key <= start,
        }
    }

    pub fn is_past_end(&self, key: &Key) -> bool {
        match &self.end_row {
            None => false,
            Some(end) => key.row.as_slice() > end.as_slice(),
        }
    }

    pub fn contains(&self, key: &Key) -> bool {
        !self.is_before_start(key) && !self.is_past_end(key)
    }
}

// ── Cursor ─────────────────────────────────────────────────────────

/// Ordered pull cursor over cells.
///
/// `top` is a peek: it never allocates and the borrow ends before `next`.
pub trait CellSource {
    /// Reposition the cursor at the first cell inside `range`.
    fn seek(&mut self, range: &ScanRange) -> Result<()>;

    fn has_top(&self) -> bool;

    fn top(&self) -> Option<&Cell>;

    /// Advance past the current cell.
    fn next(&mut self) -> Result<()>;
}

impl<S: CellSource + ?Sized> CellSource for Box<S> {
    fn seek(&mut self, range: &ScanRange) -> Result<()> {
        (**self).seek(range)
    }

    fn has_top(&self) -> bool {
        (**self).has_top()
    }

    fn top(&self) -> Option<&Cell> {
        (**self).top()
    }

    fn next(&mut self) -> Result<()> {
        (**self).next()
    }
}

/// In-memory sorted cell table.
///
/// Cells are sorted on construction; it is the reference cursor used by
/// tests and by callers that already hold a row in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCellSource {
    cells: Vec<Cell>,
    pos: usize,
    range: ScanRange,
}

impl MemoryCellSource {
    pub fn new(mut cells: Vec<Cell>) -> Self {
        cells.sort_by(|a, b| a.key.cmp(&b.key));
        Self {
            cells,
            pos: 0,
            range: ScanRange::all(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

impl CellSource for MemoryCellSource {
    fn seek(&mut self, range: &ScanRange) -> Result<()> {
        self.range = range.clone();
        self.pos = self
            .cells
            .partition_point(|cell| range.is_before_start(&cell.key));
        Ok(())
    }

    fn has_top(&self) -> bool {
        self.top().is_some()
    }

    fn top(&self) -> Option<&Cell> {
        self.cells
            .get(self.pos)
            .filter(|cell| !self.range.is_past_end(&cell.key))
    }

    fn next(&mut self) -> Result<()> {
        if self.pos < self.cells.len() {
            self.pos += 1;
        }
        Ok(())
    }
}

/// Drain a cursor into a vector (test and tooling helper).
pub fn collect_cells<S: CellSource + ?Sized>(source: &mut S) -> Result<Vec<Cell>> {
    let mut out = Vec::new();
    while let Some(cell) = source.top() {
        out.push(cell.clone());
        source.next()?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: &str, cf: &str, cq: &str, ts: i64) -> Cell {
        Cell::new(Key::new(row, cf, cq, "", ts), Vec::new())
    }

    #[test]
    fn test_key_orders_newest_first_within_column() {
        let newer = Key::new("r", "PROP", "a", "", 100);
        let older = Key::new("r", "PROP", "a", "", 50);
        assert!(newer < older);
    }

    #[test]
    fn test_key_orders_by_row_then_family() {
        let a = Key::new("a", "Z", "", "", 0);
        let b = Key::new("b", "A", "", "", 0);
        assert!(a < b);
        let c = Key::new("a", "A", "z", "", 0);
        assert!(c < a);
    }

    #[test]
    fn test_row_start_is_smallest_in_row() {
        let start = Key::row_start("r");
        assert!(start <= Key::new("r", "", "", "", i64::MAX));
        assert!(start < Key::new("r", "A", "", "", 0));
    }

    #[test]
    fn test_memory_source_sorts_and_iterates() {
        let mut src = MemoryCellSource::new(vec![
            cell("r2", "V", "", 1),
            cell("r1", "PROP", "x", 5),
            cell("r1", "PROP", "x", 9),
        ]);
        src.seek(&ScanRange::all()).unwrap();
        let cells = collect_cells(&mut src).unwrap();
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].timestamp(), 9);
        assert_eq!(cells[1].timestamp(), 5);
        assert_eq!(cells[2].row(), b"r2");
    }

    #[test]
    fn test_memory_source_seek_single_row() {
        let mut src = MemoryCellSource::new(vec![
            cell("r1", "V", "", 1),
            cell("r2", "V", "", 1),
            cell("r3", "V", "", 1),
        ]);
        src.seek(&ScanRange::row("r2")).unwrap();
        let cells = collect_cells(&mut src).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].row(), b"r2");
    }

    #[test]
    fn test_memory_source_seek_after_key_is_exclusive() {
        // "PROP" sorts before "V"
        let first = cell("r1", "PROP", "a", 1);
        let mut src = MemoryCellSource::new(vec![cell("r1", "V", "", 1), first.clone()]);
        src.seek(&ScanRange::after_key(first.key.clone())).unwrap();
        let cells = collect_cells(&mut src).unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].column_family(), b"V");
    }

    #[test]
    fn test_take_value_leaves_empty() {
        let mut c = Cell::new(Key::new("r", "PROP", "a", "", 1), b"v".to_vec());
        assert_eq!(c.take_value(), b"v".to_vec());
        assert!(c.value().is_empty());
    }
}
