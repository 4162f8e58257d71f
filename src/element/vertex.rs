//! Vertex rows: edge references, their hidden markers and soft deletes.

use std::collections::{BTreeMap, HashSet};
use std::io::Write;

use crate::cell::family::HiddenMarker;
use crate::cell::{Cell, ColumnFamily, ElementType};
use crate::codec::{edge_info, wire, EdgeInfo};
use crate::element::snapshot;
use crate::element::ElementKind;
use crate::error::Result;
use crate::fetch_hints::{Direction, FetchHints};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct VertexData {
    /// edge id -> reference, sorted for deterministic encoding.
    pub out_edges: BTreeMap<String, EdgeInfo>,
    pub in_edges: BTreeMap<String, EdgeInfo>,
    pub hidden_edges: HashSet<String>,
    pub out_soft_deletes: Vec<(String, i64)>,
    pub in_soft_deletes: Vec<(String, i64)>,
    resolved_hidden: HashSet<(Direction, String, Vec<u8>)>,
}

impl VertexData {
    fn edges_mut(&mut self, direction: Direction) -> &mut BTreeMap<String, EdgeInfo> {
        match direction {
            Direction::Out => &mut self.out_edges,
            Direction::In => &mut self.in_edges,
        }
    }

    pub fn edges(&self, direction: Direction) -> &BTreeMap<String, EdgeInfo> {
        match direction {
            Direction::Out => &self.out_edges,
            Direction::In => &self.in_edges,
        }
    }

    fn add_edge_ref(&mut self, direction: Direction, cell: &Cell, hints: &FetchHints) -> Result<()> {
        if !hints.ingest_edge_refs(direction) {
            return Ok(());
        }
        let label = edge_info::read_label(cell.value())?;
        if !hints.include_edge_label(label) {
            return Ok(());
        }
        let edge_id = cell.qualifier_str()?;
        let timestamp = cell.timestamp();
        // Several visibilities of the same edge: keep the newest.
        if let Some(existing) = self.edges(direction).get(edge_id) {
            if existing.timestamp >= timestamp {
                return Ok(());
            }
        }
        let info = EdgeInfo::decode(cell.value(), cell.visibility_str()?, timestamp)?;
        self.edges_mut(direction).insert(edge_id.to_string(), info);
        Ok(())
    }

    fn add_hidden_marker(&mut self, direction: Direction, cell: &Cell) -> Result<()> {
        let edge_id = cell.qualifier_str()?;
        let first = self
            .resolved_hidden
            .insert((direction, edge_id.to_string(), cell.visibility().to_vec()));
        if first && HiddenMarker::parse(cell.value()).is_hidden() {
            self.hidden_edges.insert(edge_id.to_string());
        }
        Ok(())
    }

    fn add_soft_delete(&mut self, direction: Direction, cell: &Cell) -> Result<()> {
        let entry = (cell.qualifier_str()?.to_string(), cell.timestamp());
        match direction {
            Direction::Out => self.out_soft_deletes.push(entry),
            Direction::In => self.in_soft_deletes.push(entry),
        }
        Ok(())
    }

    fn label_counts(edges: &BTreeMap<String, EdgeInfo>) -> BTreeMap<String, u32> {
        let mut counts = BTreeMap::new();
        for info in edges.values() {
            *counts.entry(info.label.clone()).or_insert(0u32) += 1;
        }
        counts
    }

    fn encode_table<W: Write>(&self, writer: &mut W, direction: Direction, hints: &FetchHints) -> Result<()> {
        let edges = self.edges(direction);
        if hints.include_edge_refs(direction) {
            snapshot::write_full_edge_table(writer, edges.iter())
        } else if hints.include_edge_labels_and_counts {
            let counts = Self::label_counts(edges);
            snapshot::write_label_count_table(writer, counts.iter())
        } else {
            wire::write_u8(writer, snapshot::EDGE_TABLE_NONE)
        }
    }
}

impl ElementKind for VertexData {
    const ELEMENT_TYPE: ElementType = ElementType::Vertex;

    fn clear(&mut self) {
        self.out_edges.clear();
        self.in_edges.clear();
        self.hidden_edges.clear();
        self.out_soft_deletes.clear();
        self.in_soft_deletes.clear();
        self.resolved_hidden.clear();
    }

    fn process_signal(&mut self, _cell: &Cell) -> Result<()> {
        Ok(())
    }

    fn process_column(&mut self, family: ColumnFamily, cell: &Cell, hints: &FetchHints) -> Result<bool> {
        match family {
            ColumnFamily::OutEdgeRef => self.add_edge_ref(Direction::Out, cell, hints)?,
            ColumnFamily::InEdgeRef => self.add_edge_ref(Direction::In, cell, hints)?,
            ColumnFamily::OutEdgeRefHidden => self.add_hidden_marker(Direction::Out, cell)?,
            ColumnFamily::InEdgeRefHidden => self.add_hidden_marker(Direction::In, cell)?,
            ColumnFamily::OutEdgeRefSoftDelete => self.add_soft_delete(Direction::Out, cell)?,
            ColumnFamily::InEdgeRefSoftDelete => self.add_soft_delete(Direction::In, cell)?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Drop hidden edges (unless requested) and edges soft deleted at or
    /// after their own timestamp.
    fn finalize(&mut self, hints: &FetchHints) {
        if !hints.include_hidden && !self.hidden_edges.is_empty() {
            let hidden = &self.hidden_edges;
            self.out_edges.retain(|id, _| !hidden.contains(id));
            self.in_edges.retain(|id, _| !hidden.contains(id));
        }
        retain_not_soft_deleted(&mut self.out_edges, &self.out_soft_deletes);
        retain_not_soft_deleted(&mut self.in_edges, &self.in_soft_deletes);
    }

    fn encode<W: Write>(&self, writer: &mut W, hints: &FetchHints) -> Result<()> {
        self.encode_table(writer, Direction::Out, hints)?;
        self.encode_table(writer, Direction::In, hints)
    }
}

fn retain_not_soft_deleted(edges: &mut BTreeMap<String, EdgeInfo>, soft_deletes: &[(String, i64)]) {
    if soft_deletes.is_empty() {
        return;
    }
    edges.retain(|id, info| {
        !soft_deletes
            .iter()
            .any(|(deleted_id, ts)| deleted_id == id && *ts >= info.timestamp)
    });
}
