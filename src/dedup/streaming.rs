//! Streaming version deduplication for compaction.
//!
//! Within a column (row, family, qualifier, visibility) versions arrive
//! newest first. A run of consecutive versions with byte-identical values is
//! collapsed to the first version of the run; a value that reappears after a
//! different one starts a new run and is kept.

use crate::cell::{Cell, CellSource, ScanRange};
use crate::error::Result;

#[derive(Debug)]
pub struct VersionDeduplicatingSource<S> {
    source: S,
    removed: u64,
}

impl<S: CellSource> VersionDeduplicatingSource<S> {
    pub fn new(source: S) -> Self {
        Self { source, removed: 0 }
    }

    /// Versions dropped so far.
    pub fn removed(&self) -> u64 {
        self.removed
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn is_repeat(previous: &Cell, cell: &Cell) -> bool {
        cell.key.same_column(&previous.key) && cell.value == previous.value
    }
}

impl<S: CellSource> CellSource for VersionDeduplicatingSource<S> {
    fn seek(&mut self, range: &ScanRange) -> Result<()> {
        self.source.seek(range)
    }

    fn has_top(&self) -> bool {
        self.source.has_top()
    }

    fn top(&self) -> Option<&Cell> {
        self.source.top()
    }

    fn next(&mut self) -> Result<()> {
        let Some(previous) = self.source.top().cloned() else {
            return Ok(());
        };
        self.source.next()?;
        while self
            .source
            .top()
            .is_some_and(|cell| Self::is_repeat(&previous, cell))
        {
            self.removed += 1;
            self.source.next()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{collect_cells, Key, MemoryCellSource};

    fn version(cq: &str, ts: i64, value: &str) -> Cell {
        Cell::new(Key::new("v1", "PROP", cq, "", ts), value.as_bytes().to_vec())
    }

    fn dedup(cells: Vec<Cell>) -> Vec<Cell> {
        let mut source = VersionDeduplicatingSource::new(MemoryCellSource::new(cells));
        source.seek(&ScanRange::all()).unwrap();
        collect_cells(&mut source).unwrap()
    }

    #[test]
    fn test_identical_run_collapses_to_newest() {
        let out = dedup(vec![version("a", 1, "x"), version("a", 2, "x"), version("a", 3, "x")]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].timestamp(), 3);
    }

    #[test]
    fn test_alternating_values_are_kept() {
        let out = dedup(vec![version("a", 1, "x"), version("a", 2, "y"), version("a", 3, "x")]);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_runs_do_not_cross_columns() {
        let out = dedup(vec![version("a", 1, "x"), version("b", 1, "x"), version("b", 2, "x")]);
        let columns: Vec<&[u8]> = out.iter().map(|c| c.column_qualifier()).collect();
        assert_eq!(columns, vec![&b"a"[..], &b"b"[..]]);
    }

    #[test]
    fn test_removed_counter() {
        let mut source = VersionDeduplicatingSource::new(MemoryCellSource::new(vec![
            version("a", 1, "x"),
            version("a", 2, "x"),
        ]));
        source.seek(&ScanRange::all()).unwrap();
        collect_cells(&mut source).unwrap();
        assert_eq!(source.removed(), 1);
    }
}
