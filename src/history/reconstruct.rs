//! History reconstructor
//!
//! Replays one row's cells in [`history_order`] and turns them into discrete
//! mutation events.
//!
//! Element shape (visibility, plus endpoints and label for edges) is tracked
//! twice: the *current* shape built from the cells seen so far, and the
//! *last emitted* shape. A signal or endpoint cell emits an add event only
//! when the current shape is complete and differs from the last emitted one.
//!
//! A delete followed by an add less than
//! [`ALTER_VISIBILITY_COALESCE_WINDOW`] later collapses into one
//! alter-visibility event.
//!
//! Property cells are accumulated (so trailing metadata can be folded in)
//! and flushed as one `AddProperty` event before the next cell that owns
//! an event.

use std::collections::HashMap;

use serde::Serialize;

use crate::cell::family::{is_deleted_signal, soft_delete_payload, HiddenMarker};
use crate::cell::{Cell, ColumnFamily, ElementType};
use crate::codec::qualifier::{self, PropertyHiddenColumnQualifier, PropertyMetadataColumnQualifier};
use crate::error::{CellGraphError, Result};
use crate::history::event::{HistoricalEvent, HistoricalEventId, HistoricalEventKind, PropertyMetadataValue};
use crate::history::options::HistoricalEventsOptions;
use crate::history::sort::history_order;

/// Largest timestamp gap (exclusive) across which a delete and the
/// following add are reported as a single visibility change.
pub const ALTER_VISIBILITY_COALESCE_WINDOW: i64 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub rows: u64,
    pub cells: u64,
    pub events: u64,
    pub coalesced: u64,
    pub suppressed: u64,
    pub orphan_metadata: u64,
    pub orphan_property_markers: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Shape {
    visibility: String,
    out_vertex_id: Option<String>,
    in_vertex_id: Option<String>,
    label: Option<String>,
}

#[derive(Debug)]
struct PendingProperty {
    key: String,
    name: String,
    visibility: String,
    timestamp: i64,
    value: Option<Vec<u8>>,
    metadata: Vec<PropertyMetadataValue>,
}

#[derive(Debug, Default)]
struct RowState {
    element_id: String,
    events: Vec<HistoricalEvent>,
    next_sequence: u32,
    pending: Option<PendingProperty>,
    visibility: Option<String>,
    out_vertex_id: Option<String>,
    in_vertex_id: Option<String>,
    label: Option<String>,
    last_emitted: Option<Shape>,
    /// (element type, key, name) -> (value, timestamp) of the last flushed property.
    previous_values: HashMap<(ElementType, String, String), (Option<Vec<u8>>, i64)>,
    /// (key, name, visibility) -> last value, for soft-delete joins.
    last_values: HashMap<(String, String, String), Option<Vec<u8>>>,
}

impl RowState {
    fn reset(&mut self, element_id: &str) {
        self.element_id.clear();
        self.element_id.push_str(element_id);
        self.events.clear();
        self.next_sequence = 0;
        self.pending = None;
        self.visibility = None;
        self.out_vertex_id = None;
        self.in_vertex_id = None;
        self.label = None;
        self.last_emitted = None;
        self.previous_values.clear();
        self.last_values.clear();
    }
}

#[derive(Debug)]
pub struct HistoryReconstructor {
    element_type: ElementType,
    include_property_values: bool,
    include_previous_property_values: bool,
    state: RowState,
    stats: HistoryStats,
}

impl HistoryReconstructor {
    pub fn new(options: &HistoricalEventsOptions) -> Self {
        Self {
            element_type: options.element_type,
            include_property_values: options.include_property_values,
            include_previous_property_values: options.include_previous_property_values,
            state: RowState::default(),
            stats: HistoryStats::default(),
        }
    }

    pub fn stats(&self) -> HistoryStats {
        self.stats
    }

    /// All events of one row, in production order (not yet filtered).
    pub fn reconstruct(&mut self, element_id: &str, cells: Vec<Cell>) -> Result<Vec<HistoricalEvent>> {
        self.state.reset(element_id);
        self.stats.rows += 1;

        for cell in history_order(cells)? {
            self.stats.cells += 1;
            self.process(&cell)?;
        }
        self.flush_property();

        Ok(std::mem::take(&mut self.state.events))
    }

    fn process(&mut self, cell: &Cell) -> Result<()> {
        match cell.family() {
            ColumnFamily::Signal(element_type) => {
                self.expect_type(element_type, cell)?;
                self.flush_property();
                self.on_signal(cell)
            }
            ColumnFamily::OutVertexRef | ColumnFamily::InVertexRef => {
                self.expect_type(ElementType::Edge, cell)?;
                self.flush_property();
                let vertex_id = cell.qualifier_str()?.to_string();
                if cell.family() == ColumnFamily::OutVertexRef {
                    self.state.out_vertex_id = Some(vertex_id);
                } else {
                    self.state.in_vertex_id = Some(vertex_id);
                }
                self.try_emit_shape(cell.timestamp());
                Ok(())
            }
            ColumnFamily::OutEdgeRef
            | ColumnFamily::InEdgeRef
            | ColumnFamily::OutEdgeRefHidden
            | ColumnFamily::InEdgeRefHidden
            | ColumnFamily::OutEdgeRefSoftDelete
            | ColumnFamily::InEdgeRefSoftDelete => {
                // Edge references live on vertex rows; the edge's own row
                // carries its history.
                self.expect_type(ElementType::Vertex, cell)
            }
            ColumnFamily::Property => {
                self.flush_property();
                let parts = qualifier::split(cell.qualifier_str()?, 2)?;
                self.state.pending = Some(PendingProperty {
                    key: parts[1].to_string(),
                    name: parts[0].to_string(),
                    visibility: cell.visibility_str()?.to_string(),
                    timestamp: cell.timestamp(),
                    value: self.include_property_values.then(|| cell.value().to_vec()),
                    metadata: Vec::new(),
                });
                Ok(())
            }
            ColumnFamily::PropertyMetadata => self.on_property_metadata(cell),
            ColumnFamily::PropertyHidden => {
                self.flush_property();
                self.on_property_hidden(cell)
            }
            ColumnFamily::PropertySoftDelete => {
                self.flush_property();
                self.on_property_soft_delete(cell)
            }
            ColumnFamily::ElementHidden => {
                self.flush_property();
                self.state.last_emitted = None;
                let hidden_visibility = cell.visibility_str()?.to_string();
                let kind = match HiddenMarker::parse(cell.value()) {
                    HiddenMarker::Hidden { payload } => HistoricalEventKind::MarkHidden {
                        hidden_visibility,
                        payload: payload.map(<[u8]>::to_vec),
                    },
                    HiddenMarker::Visible { payload } => HistoricalEventKind::MarkVisible {
                        hidden_visibility,
                        payload: payload.map(<[u8]>::to_vec),
                    },
                };
                self.push(cell.timestamp(), kind);
                Ok(())
            }
            ColumnFamily::ElementSoftDelete => {
                self.flush_property();
                self.state.last_emitted = None;
                let payload = soft_delete_payload(cell.value()).map(<[u8]>::to_vec);
                let kind = match self.element_type {
                    ElementType::Vertex => HistoricalEventKind::SoftDeleteVertex { payload },
                    ElementType::Edge => HistoricalEventKind::SoftDeleteEdge {
                        out_vertex_id: self.state.out_vertex_id.clone(),
                        in_vertex_id: self.state.in_vertex_id.clone(),
                        label: self.state.label.clone(),
                        payload,
                    },
                };
                self.push(cell.timestamp(), kind);
                Ok(())
            }
            other => {
                tracing::trace!(row = %self.state.element_id, family = ?other, "no history for cell");
                Ok(())
            }
        }
    }

    fn expect_type(&self, found: ElementType, cell: &Cell) -> Result<()> {
        if found == self.element_type {
            return Ok(());
        }
        Err(CellGraphError::UnhandledElementType(format!(
            "{} cell {:?} in {} history of {:?}",
            found,
            String::from_utf8_lossy(cell.column_family()),
            self.element_type,
            self.state.element_id
        )))
    }

    // -- Element shape --------------------------------------------------------

    fn on_signal(&mut self, cell: &Cell) -> Result<()> {
        let visibility = cell.visibility_str()?.to_string();
        if is_deleted_signal(cell.value()) {
            let kind = match self.element_type {
                ElementType::Vertex => HistoricalEventKind::DeleteVertex { visibility },
                ElementType::Edge => HistoricalEventKind::DeleteEdge { visibility },
            };
            self.push(cell.timestamp(), kind);
            self.state.visibility = None;
            self.state.last_emitted = None;
            return Ok(());
        }

        if self.element_type == ElementType::Edge {
            self.state.label = Some(cell.qualifier_str()?.to_string());
        }
        self.state.visibility = Some(visibility);
        self.try_emit_shape(cell.timestamp());
        Ok(())
    }

    fn current_shape(&self) -> Option<Shape> {
        let visibility = self.state.visibility.clone()?;
        match self.element_type {
            ElementType::Vertex => Some(Shape {
                visibility,
                out_vertex_id: None,
                in_vertex_id: None,
                label: None,
            }),
            ElementType::Edge => Some(Shape {
                visibility,
                out_vertex_id: Some(self.state.out_vertex_id.clone()?),
                in_vertex_id: Some(self.state.in_vertex_id.clone()?),
                label: Some(self.state.label.clone()?),
            }),
        }
    }

    fn try_emit_shape(&mut self, timestamp: i64) {
        let Some(shape) = self.current_shape() else {
            return;
        };

        if self.coalesce_with_delete(timestamp, &shape) {
            self.state.last_emitted = Some(shape);
            return;
        }

        if self.state.last_emitted.as_ref() == Some(&shape) {
            self.stats.suppressed += 1;
            return;
        }

        let kind = match (&self.state.last_emitted, self.element_type) {
            (Some(last), ElementType::Edge)
                if last.visibility == shape.visibility
                    && last.out_vertex_id == shape.out_vertex_id
                    && last.in_vertex_id == shape.in_vertex_id =>
            {
                HistoricalEventKind::AlterEdgeLabel {
                    old_label: last.label.clone().unwrap_or_default(),
                    new_label: shape.label.clone().unwrap_or_default(),
                }
            }
            (_, ElementType::Vertex) => HistoricalEventKind::AddVertex {
                visibility: shape.visibility.clone(),
            },
            (_, ElementType::Edge) => HistoricalEventKind::AddEdge {
                out_vertex_id: shape.out_vertex_id.clone().unwrap_or_default(),
                in_vertex_id: shape.in_vertex_id.clone().unwrap_or_default(),
                label: shape.label.clone().unwrap_or_default(),
                visibility: shape.visibility.clone(),
            },
        };
        self.push(timestamp, kind);
        self.state.last_emitted = Some(shape);
    }

    /// Turn a trailing delete into an alter-visibility event when the new
    /// shape arrives within the coalescing window.
    fn coalesce_with_delete(&mut self, timestamp: i64, shape: &Shape) -> bool {
        let Some(last) = self.state.events.last_mut() else {
            return false;
        };
        let old_visibility = match &last.kind {
            HistoricalEventKind::DeleteVertex { visibility } | HistoricalEventKind::DeleteEdge { visibility } => {
                visibility.clone()
            }
            _ => return false,
        };
        if timestamp.saturating_sub(last.id.timestamp) >= ALTER_VISIBILITY_COALESCE_WINDOW {
            return false;
        }

        last.id.timestamp = timestamp;
        last.kind = match self.element_type {
            ElementType::Vertex => HistoricalEventKind::AlterVertexVisibility {
                old_visibility,
                new_visibility: shape.visibility.clone(),
            },
            ElementType::Edge => HistoricalEventKind::AlterEdgeVisibility {
                out_vertex_id: shape.out_vertex_id.clone().unwrap_or_default(),
                in_vertex_id: shape.in_vertex_id.clone().unwrap_or_default(),
                label: shape.label.clone().unwrap_or_default(),
                old_visibility,
                new_visibility: shape.visibility.clone(),
            },
        };
        self.stats.coalesced += 1;
        true
    }

    // -- Properties -----------------------------------------------------------

    fn on_property_metadata(&mut self, cell: &Cell) -> Result<()> {
        let q = PropertyMetadataColumnQualifier::parse(cell.qualifier_str()?)?;
        let matches = self
            .state
            .pending
            .as_ref()
            .is_some_and(|p| p.key == q.key && p.name == q.name && p.visibility == q.visibility);
        if !matches {
            self.flush_property();
            self.stats.orphan_metadata += 1;
            tracing::debug!(
                row = %self.state.element_id,
                name = %q.name,
                key = %q.key,
                metadata_key = %q.metadata_key,
                "metadata without matching property"
            );
            return Ok(());
        }

        let entry = PropertyMetadataValue {
            metadata_key: q.metadata_key,
            metadata_visibility: cell.visibility_str()?.to_string(),
            value: cell.value().to_vec(),
        };
        if let Some(pending) = self.state.pending.as_mut() {
            pending.metadata.push(entry);
        }
        Ok(())
    }

    fn on_property_hidden(&mut self, cell: &Cell) -> Result<()> {
        let q = PropertyHiddenColumnQualifier::parse(cell.qualifier_str()?)?;
        self.note_orphan(&q.key, &q.name, &q.visibility, "hidden marker");
        let hidden_visibility = cell.visibility_str()?.to_string();
        let kind = match HiddenMarker::parse(cell.value()) {
            HiddenMarker::Hidden { payload } => HistoricalEventKind::MarkPropertyHidden {
                key: q.key,
                name: q.name,
                visibility: q.visibility,
                hidden_visibility,
                payload: payload.map(<[u8]>::to_vec),
            },
            HiddenMarker::Visible { payload } => HistoricalEventKind::MarkPropertyVisible {
                key: q.key,
                name: q.name,
                visibility: q.visibility,
                hidden_visibility,
                payload: payload.map(<[u8]>::to_vec),
            },
        };
        self.push(cell.timestamp(), kind);
        Ok(())
    }

    fn on_property_soft_delete(&mut self, cell: &Cell) -> Result<()> {
        let parts = qualifier::split(cell.qualifier_str()?, 2)?;
        let (name, key) = (parts[0].to_string(), parts[1].to_string());
        let visibility = cell.visibility_str()?.to_string();
        self.note_orphan(&key, &name, &visibility, "soft delete");
        let value = self
            .state
            .last_values
            .get(&(key.clone(), name.clone(), visibility.clone()))
            .cloned()
            .flatten();
        self.push(
            cell.timestamp(),
            HistoricalEventKind::SoftDeleteProperty {
                key,
                name,
                visibility,
                value,
                payload: soft_delete_payload(cell.value()).map(<[u8]>::to_vec),
            },
        );
        Ok(())
    }

    fn note_orphan(&mut self, key: &str, name: &str, visibility: &str, what: &str) {
        let known = self
            .state
            .last_values
            .contains_key(&(key.to_string(), name.to_string(), visibility.to_string()));
        if !known {
            self.stats.orphan_property_markers += 1;
            tracing::debug!(row = %self.state.element_id, %name, %key, "{} without matching property", what);
        }
    }

    fn flush_property(&mut self) {
        let Some(pending) = self.state.pending.take() else {
            return;
        };

        let history_key = (self.element_type, pending.key.clone(), pending.name.clone());
        let previous = self
            .state
            .previous_values
            .insert(history_key, (pending.value.clone(), pending.timestamp));
        let (previous_value, previous_timestamp) = match previous {
            Some((value, timestamp)) if self.include_previous_property_values => (value, Some(timestamp)),
            _ => (None, None),
        };
        self.state.last_values.insert(
            (pending.key.clone(), pending.name.clone(), pending.visibility.clone()),
            pending.value.clone(),
        );

        self.push(
            pending.timestamp,
            HistoricalEventKind::AddProperty {
                key: pending.key,
                name: pending.name,
                visibility: pending.visibility,
                value: pending.value,
                metadata: pending.metadata,
                previous_value,
                previous_timestamp,
            },
        );
    }

    fn push(&mut self, timestamp: i64, kind: HistoricalEventKind) {
        let sequence = self.state.next_sequence;
        self.state.next_sequence += 1;
        self.stats.events += 1;
        self.state.events.push(HistoricalEvent {
            id: HistoricalEventId::new(timestamp, sequence),
            element_type: self.element_type,
            element_id: self.state.element_id.clone(),
            kind,
        });
    }
}
