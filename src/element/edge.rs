//! Edge rows: label (from the signal qualifier) and both endpoints.

use std::io::Write;

use crate::cell::{Cell, ColumnFamily, ElementType};
use crate::codec::wire;
use crate::element::ElementKind;
use crate::error::Result;
use crate::fetch_hints::FetchHints;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EdgeData {
    pub label: Option<String>,
    pub out_vertex_id: Option<String>,
    pub in_vertex_id: Option<String>,
    out_vertex_timestamp: i64,
    in_vertex_timestamp: i64,
}

impl EdgeData {
    pub fn is_complete(&self) -> bool {
        self.label.is_some() && self.out_vertex_id.is_some() && self.in_vertex_id.is_some()
    }
}

/// Keep the endpoint written most recently.
fn capture_endpoint(slot: &mut Option<String>, slot_timestamp: &mut i64, cell: &Cell) -> Result<()> {
    if slot.is_none() || cell.timestamp() > *slot_timestamp {
        *slot = Some(cell.qualifier_str()?.to_string());
        *slot_timestamp = cell.timestamp();
    }
    Ok(())
}

impl ElementKind for EdgeData {
    const ELEMENT_TYPE: ElementType = ElementType::Edge;

    fn clear(&mut self) {
        self.label = None;
        self.out_vertex_id = None;
        self.in_vertex_id = None;
        self.out_vertex_timestamp = 0;
        self.in_vertex_timestamp = 0;
    }

    fn process_signal(&mut self, cell: &Cell) -> Result<()> {
        self.label = Some(cell.qualifier_str()?.to_string());
        Ok(())
    }

    fn has_required_columns(&self) -> bool {
        self.is_complete()
    }

    fn process_column(&mut self, family: ColumnFamily, cell: &Cell, _hints: &FetchHints) -> Result<bool> {
        match family {
            ColumnFamily::OutVertexRef => {
                capture_endpoint(&mut self.out_vertex_id, &mut self.out_vertex_timestamp, cell)?
            }
            ColumnFamily::InVertexRef => {
                capture_endpoint(&mut self.in_vertex_id, &mut self.in_vertex_timestamp, cell)?
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn encode<W: Write>(&self, writer: &mut W, _hints: &FetchHints) -> Result<()> {
        if !self.is_complete() {
            tracing::debug!(edge = ?self, "encoding edge with missing label or endpoint");
        }
        wire::write_str(writer, self.out_vertex_id.as_deref().unwrap_or(""))?;
        wire::write_str(writer, self.in_vertex_id.as_deref().unwrap_or(""))?;
        wire::write_str(writer, self.label.as_deref().unwrap_or(""))
    }
}
