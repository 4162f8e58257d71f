//! Integration test: compaction-time deduplication, alone and stacked under
//! the row merge iterator.

mod common;

use cellgraph::cell::collect_cells;
use cellgraph::dedup::OPT_MAX_BUFFER_SIZE;
use cellgraph::{
    decode_snapshot, Cell, CellSource, FetchHints, IteratorOptions, MemoryCellSource, RowDeduplicatingSource,
    ScanRange, VersionDeduplicatingSource, VertexIterator,
};
use common::{cell, init_tracing, q};
use proptest::prelude::*;

fn prop(row: &str, ts: i64, value: &str) -> Cell {
    cell(row, "PROP", &q(&["age", "k"]), "", ts, value.as_bytes())
}

fn drain<S: CellSource>(mut source: S) -> Vec<Cell> {
    source.seek(&ScanRange::all()).unwrap();
    collect_cells(&mut source).unwrap()
}

fn values(cells: &[Cell]) -> Vec<(i64, String)> {
    cells
        .iter()
        .map(|c| (c.timestamp(), String::from_utf8_lossy(c.value()).into_owned()))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests: Both variants
// ---------------------------------------------------------------------------

#[test]
fn changed_then_restored_value_keeps_all_versions() {
    init_tracing();
    let cells = vec![prop("v1", 1, "V1"), prop("v1", 2, "V2"), prop("v1", 3, "V1")];

    let streamed = drain(VersionDeduplicatingSource::new(MemoryCellSource::new(cells.clone())));
    let buffered = drain(RowDeduplicatingSource::new(MemoryCellSource::new(cells)));
    assert_eq!(streamed.len(), 3);
    assert_eq!(values(&streamed), values(&buffered));
}

#[test]
fn identical_versions_collapse_to_one() {
    init_tracing();
    let cells = vec![prop("v1", 1, "V1"), prop("v1", 2, "V1"), prop("v1", 3, "V1")];

    let streamed = drain(VersionDeduplicatingSource::new(MemoryCellSource::new(cells.clone())));
    let buffered = drain(RowDeduplicatingSource::new(MemoryCellSource::new(cells)));
    assert_eq!(values(&streamed), vec![(3, "V1".to_string())]);
    assert_eq!(values(&buffered), vec![(1, "V1".to_string())]);
}

#[test]
fn stacked_deduplicators_feed_row_merge() {
    init_tracing();
    let cells = vec![
        cell("v1", "V", "", "", 1, b""),
        prop("v1", 1, "30"),
        prop("v1", 2, "30"),
        prop("v1", 3, "31"),
        cell("v2", "V", "", "", 1, b""),
        prop("v2", 5, "7"),
    ];
    let stacked = VersionDeduplicatingSource::new(RowDeduplicatingSource::new(MemoryCellSource::new(cells)));
    let mut iter = VertexIterator::new(stacked, FetchHints::all());
    iter.seek(&ScanRange::all()).unwrap();

    let mut rows = Vec::new();
    while let Some(element) = iter.take_top() {
        let snap = decode_snapshot(&element.value).unwrap();
        let newest = snap.property("age").map(|p| p.value.clone());
        rows.push((element.row, newest));
        iter.next().unwrap();
    }
    assert_eq!(
        rows,
        vec![
            ("v1".to_string(), Some(b"31".to_vec())),
            ("v2".to_string(), Some(b"7".to_vec())),
        ]
    );

    let source = iter.into_source();
    assert_eq!(source.into_inner().removed(), 1);
}

// ---------------------------------------------------------------------------
// Tests: Buffer limits
// ---------------------------------------------------------------------------

#[test]
fn oversized_row_is_reported_and_skipped() {
    init_tracing();
    let big = "x".repeat(200);
    let mut opts = IteratorOptions::new();
    opts.insert(OPT_MAX_BUFFER_SIZE.into(), "256".into());
    let mut source = RowDeduplicatingSource::from_options(
        MemoryCellSource::new(vec![
            prop("v1", 1, "a"),
            prop("v2", 1, &big),
            prop("v2", 2, &big),
            prop("v3", 1, "b"),
        ]),
        &opts,
    )
    .unwrap();

    source.seek(&ScanRange::all()).unwrap();
    assert_eq!(source.top().map(|c| c.row().to_vec()), Some(b"v1".to_vec()));

    let err = source.next().unwrap_err();
    assert_eq!(err.code(), "BUFFER_OVERFLOW");

    source.next().unwrap();
    assert_eq!(source.top().map(|c| c.row().to_vec()), Some(b"v3".to_vec()));
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    /// Both variants keep exactly one version per run of equal values.
    #[test]
    fn survivors_equal_number_of_value_runs(seq in proptest::collection::vec(0u8..3, 1..20)) {
        let cells: Vec<Cell> = seq
            .iter()
            .enumerate()
            .map(|(i, v)| prop("v1", i as i64 + 1, &v.to_string()))
            .collect();
        let runs = 1 + seq.windows(2).filter(|w| w[0] != w[1]).count();

        let streamed = drain(VersionDeduplicatingSource::new(MemoryCellSource::new(cells.clone())));
        let buffered = drain(RowDeduplicatingSource::new(MemoryCellSource::new(cells)));
        prop_assert_eq!(streamed.len(), runs);
        prop_assert_eq!(buffered.len(), runs);
    }
}
