//! Integration test: current-state element scans over multi-row tables.

mod common;

use cellgraph::cell::family::{hidden_value, soft_delete_value, visible_value};
use cellgraph::codec::edge_info;
use cellgraph::element::{EdgeRefTable, SnapshotKind};
use cellgraph::{
    decode_snapshot, Cell, EdgeIterator, ElementSnapshot, FetchHints, IteratorOptions, MemoryCellSource,
    ScanRange, VertexIterator,
};
use common::{cell, init_tracing, q};
use proptest::prelude::*;
use rayon::prelude::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn scan_vertices(cells: Vec<Cell>, hints: FetchHints) -> Vec<ElementSnapshot> {
    let mut iter = VertexIterator::new(MemoryCellSource::new(cells), hints);
    iter.seek(&ScanRange::all()).unwrap();
    let mut out = Vec::new();
    while let Some(element) = iter.top() {
        out.push(decode_snapshot(&element.value).unwrap());
        iter.next().unwrap();
    }
    out
}

fn vertex_with_edges() -> Vec<Cell> {
    vec![
        cell("v1", "V", "", "", 10, b""),
        cell("v1", "EOUT", "e1", "", 10, &edge_info::encode("knows", "v2").unwrap()),
        cell("v1", "EOUT", "e2", "", 11, &edge_info::encode("knows", "v3").unwrap()),
        cell("v1", "EOUT", "e3", "", 12, &edge_info::encode("likes", "v3").unwrap()),
        cell("v1", "EIN", "e4", "", 13, &edge_info::encode("knows", "v4").unwrap()),
        cell("v1", "EOUTD", "e2", "", 20, &soft_delete_value(None)),
    ]
}

// ---------------------------------------------------------------------------
// Tests: Properties
// ---------------------------------------------------------------------------

#[test]
fn soft_deleted_property_version_is_suppressed() {
    init_tracing();
    let cells = vec![
        cell("v1", "V", "", "", 100, b""),
        cell("v1", "PROP", &q(&["age", "k"]), "", 100, b"30"),
        cell("v1", "PROP", &q(&["age", "k"]), "", 50, b"29"),
        cell("v1", "PROPD", &q(&["age", "k"]), "", 60, &soft_delete_value(None)),
    ];
    let snaps = scan_vertices(cells, FetchHints::all());
    assert_eq!(snaps.len(), 1);
    let ages: Vec<&[u8]> = snaps[0].properties_named("age").map(|p| p.value.as_slice()).collect();
    assert_eq!(ages, vec![&b"30"[..]]);
    assert_eq!(snaps[0].timestamp, 100);
}

#[test]
fn property_at_element_soft_delete_time_survives() {
    init_tracing();
    let cells = vec![
        cell("v1", "V", "", "", 100, b""),
        cell("v1", "D", "", "", 50, &soft_delete_value(None)),
        cell("v1", "PROP", &q(&["age", "k"]), "", 50, b"30"),
        cell("v1", "PROP", &q(&["nick", "k"]), "", 49, b"bo"),
    ];
    let snaps = scan_vertices(cells, FetchHints::all());
    assert_eq!(snaps.len(), 1);

    let name = String::from("age");
    let age = snaps[0].property(&name).map(|p| p.value.clone());
    assert_eq!(age, Some(b"30".to_vec()));
    assert!(snaps[0].property("nick").is_none());
}

#[test]
fn hidden_property_needs_include_hidden() {
    init_tracing();
    let cells = vec![
        cell("v1", "V", "", "", 10, b""),
        cell("v1", "PROP", &q(&["ssn", "k"]), "pii", 10, b"123"),
        cell("v1", "PROPH", &q(&["ssn", "k", "pii"]), "auditor", 20, &hidden_value(None)),
        cell("v1", "PROP", &q(&["nick", "k"]), "", 10, b"bo"),
        cell("v1", "PROPH", &q(&["nick", "k", ""]), "x", 30, &visible_value(None)),
        cell("v1", "PROPH", &q(&["nick", "k", ""]), "x", 20, &hidden_value(None)),
    ];

    let visible = scan_vertices(cells.clone(), FetchHints::all());
    assert!(visible[0].property("ssn").is_none());
    assert!(visible[0].property("nick").is_some());

    let all = scan_vertices(cells, FetchHints::all_including_hidden());
    let ssn = all[0].property("ssn").unwrap();
    assert_eq!(ssn.hidden_visibilities, vec!["auditor"]);
}

#[test]
fn property_names_and_metadata_keys_filter() {
    init_tracing();
    let cells = vec![
        cell("v1", "V", "", "", 10, b""),
        cell("v1", "PROP", &q(&["age", "k"]), "", 10, b"30"),
        cell("v1", "PROPMETA", &q(&["age", "k", "", "source"]), "", 10, b"import"),
        cell("v1", "PROPMETA", &q(&["age", "k", "", "confidence"]), "", 10, b"0.9"),
        cell("v1", "PROP", &q(&["name", "k"]), "", 10, b"bob"),
    ];
    let mut options = IteratorOptions::new();
    options.insert("propertyNamesToInclude".into(), r#"["age"]"#.into());
    options.insert("metadataKeysToInclude".into(), r#"["source"]"#.into());
    let hints = FetchHints::from_options(&options).unwrap();

    let snaps = scan_vertices(cells, hints);
    let snap = &snaps[0];
    assert_eq!(snap.properties.len(), 1);
    let age = snap.property("age").unwrap();
    let metadata = snap.metadata_of(age);
    assert_eq!(metadata.len(), 1);
    assert_eq!(metadata[0].metadata_key, "source");
}

#[test]
fn extended_data_table_names_are_sorted() {
    let cells = vec![
        cell("v1", "V", "", "", 10, b""),
        cell("v1", "EXTDATA", "zeta", "", 10, b""),
        cell("v1", "EXTDATA", "alpha", "", 10, b""),
    ];
    let snaps = scan_vertices(cells, FetchHints::all());
    assert_eq!(snaps[0].extended_data_table_names, vec!["alpha", "zeta"]);
}

// ---------------------------------------------------------------------------
// Tests: Edge references
// ---------------------------------------------------------------------------

#[test]
fn full_edge_tables_drop_soft_deleted_refs() {
    init_tracing();
    let snaps = scan_vertices(vertex_with_edges(), FetchHints::all());
    match &snaps[0].kind {
        SnapshotKind::Vertex { out_edges, in_edges } => {
            assert_eq!(out_edges.edge_ids(), vec!["e1", "e3"]);
            assert_eq!(in_edges.edge_ids(), vec!["e4"]);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn label_counts_without_full_refs() {
    let hints = FetchHints {
        include_edge_labels_and_counts: true,
        ..FetchHints::default()
    };
    let snaps = scan_vertices(vertex_with_edges(), hints);
    match &snaps[0].kind {
        SnapshotKind::Vertex { out_edges, in_edges } => {
            assert_eq!(out_edges.label_count("knows"), Some(1));
            assert_eq!(out_edges.label_count("likes"), Some(1));
            assert_eq!(in_edges.label_count("knows"), Some(1));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn out_refs_only() {
    let hints = FetchHints {
        include_out_edge_refs: true,
        ..FetchHints::default()
    };
    let snaps = scan_vertices(vertex_with_edges(), hints);
    match &snaps[0].kind {
        SnapshotKind::Vertex { out_edges, in_edges } => {
            assert_eq!(out_edges.edge_ids().len(), 2);
            assert_eq!(in_edges, &EdgeRefTable::None);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn edge_rows_carry_endpoints_and_label() {
    init_tracing();
    let cells = vec![
        cell("e1", "E", "knows", "", 10, b""),
        cell("e1", "VOUT", "v1", "", 10, b""),
        cell("e1", "VIN", "v2", "", 10, b""),
        cell("e1", "PROP", &q(&["since", "k"]), "", 10, b"2020"),
        cell("e2", "VOUT", "v1", "", 10, b""),
        cell("e3", "E", "knows", "", 10, b""),
        cell("e3", "VOUT", "v1", "", 10, b""),
    ];
    let mut iter = EdgeIterator::new(MemoryCellSource::new(cells), FetchHints::all());
    iter.seek(&ScanRange::all()).unwrap();
    let snap = decode_snapshot(&iter.top().unwrap().value).unwrap();
    assert_eq!(
        snap.kind,
        SnapshotKind::Edge {
            out_vertex_id: "v1".into(),
            in_vertex_id: "v2".into(),
            label: "knows".into(),
        }
    );
    assert!(snap.property("since").is_some());

    iter.next().unwrap();
    assert!(!iter.has_top(), "edge rows without signal or endpoint must not be emitted");
    assert_eq!(iter.stats().rows_rejected, 2);
}

// ---------------------------------------------------------------------------
// Tests: Parallel forks
// ---------------------------------------------------------------------------

#[test]
fn forked_iterators_scan_in_parallel() {
    init_tracing();
    let prototype = VertexIterator::new(MemoryCellSource::default(), FetchHints::all());

    let shards: Vec<Vec<Cell>> = (0..8)
        .map(|shard| {
            (0..50)
                .flat_map(|i| {
                    let row = format!("v{:02}-{:03}", shard, i);
                    vec![
                        cell(&row, "V", "", "", 10, b""),
                        cell(&row, "PROP", &q(&["n", "k"]), "", 10, i.to_string().as_bytes()),
                    ]
                })
                .collect()
        })
        .collect();

    let counts: Vec<usize> = shards
        .into_par_iter()
        .map(|cells| {
            let mut iter = prototype.fork(MemoryCellSource::new(cells));
            iter.seek(&ScanRange::all()).unwrap();
            let mut n = 0;
            while iter.has_top() {
                n += 1;
                iter.next().unwrap();
            }
            assert_eq!(iter.stats().rows_emitted, n as u64);
            n
        })
        .collect();

    assert_eq!(counts, vec![50; 8]);
    assert_eq!(prototype.stats().rows_seen, 0);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn soft_delete_gating(prop_ts in 1i64..1_000, delete_ts in 1i64..1_000) {
        let cells = vec![
            cell("v1", "V", "", "", 2_000, b""),
            cell("v1", "PROP", &q(&["p", "k"]), "", prop_ts, b"x"),
            cell("v1", "PROPD", &q(&["p", "k"]), "", delete_ts, &soft_delete_value(None)),
        ];
        let snaps = scan_vertices(cells, FetchHints::all());
        let present = snaps[0].property("p").is_some();
        prop_assert_eq!(present, delete_ts < prop_ts);
    }

    #[test]
    fn encode_is_independent_of_previous_rows(values in proptest::collection::vec("[a-z]{1,8}", 1..6)) {
        let mut cells = vec![cell("a", "V", "", "", 10, b"")];
        for (i, v) in values.iter().enumerate() {
            let name = format!("p{}", i);
            cells.push(cell("a", "PROP", &q(&[name.as_str(), "k"]), "", 10, v.as_bytes()));
            cells.push(cell("a", "EXTDATA", v, "", 10, b""));
        }
        cells.push(cell("b", "V", "", "", 10, b""));

        let after_busy_row = scan_vertices(cells, FetchHints::all());
        let alone = scan_vertices(vec![cell("b", "V", "", "", 10, b"")], FetchHints::all());
        prop_assert_eq!(&after_busy_row[1], &alone[0]);
    }
}
