//! Historical event model and its record framing.
//!
//! A row's history is written as a run of records:
//!
//! ```text
//! [u32 BE length][MessagePack map (named fields)]  × N
//! ```
//!
//! The element id is not stored in the records; [`decode_events`] takes it
//! from the caller and re-attaches it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cell::ElementType;
use crate::codec::wire::{self, Reader};
use crate::error::{CellGraphError, Result};

/// Resume cursor of an event: its timestamp plus the position at which the
/// reconstructor produced it within the row. Ordered by timestamp first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HistoricalEventId {
    pub timestamp: i64,
    pub sequence: u32,
}

impl HistoricalEventId {
    pub fn new(timestamp: i64, sequence: u32) -> Self {
        Self { timestamp, sequence }
    }
}

impl fmt::Display for HistoricalEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.timestamp, self.sequence)
    }
}

impl FromStr for HistoricalEventId {
    type Err = CellGraphError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CellGraphError::InvalidFormat(format!("invalid event id {:?}", s));
        let (timestamp, sequence) = s.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            timestamp: timestamp.parse().map_err(|_| invalid())?,
            sequence: sequence.parse().map_err(|_| invalid())?,
        })
    }
}

/// Metadata folded into an `AddProperty` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyMetadataValue {
    pub metadata_key: String,
    pub metadata_visibility: String,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoricalEventKind {
    AddVertex {
        visibility: String,
    },
    AddEdge {
        out_vertex_id: String,
        in_vertex_id: String,
        label: String,
        visibility: String,
    },
    AlterVertexVisibility {
        old_visibility: String,
        new_visibility: String,
    },
    AlterEdgeVisibility {
        out_vertex_id: String,
        in_vertex_id: String,
        label: String,
        old_visibility: String,
        new_visibility: String,
    },
    AlterEdgeLabel {
        old_label: String,
        new_label: String,
    },
    DeleteVertex {
        visibility: String,
    },
    DeleteEdge {
        visibility: String,
    },
    SoftDeleteVertex {
        payload: Option<Vec<u8>>,
    },
    /// Endpoints and label are `None` when the edge was never seen whole.
    SoftDeleteEdge {
        out_vertex_id: Option<String>,
        in_vertex_id: Option<String>,
        label: Option<String>,
        payload: Option<Vec<u8>>,
    },
    MarkHidden {
        hidden_visibility: String,
        payload: Option<Vec<u8>>,
    },
    MarkVisible {
        hidden_visibility: String,
        payload: Option<Vec<u8>>,
    },
    AddProperty {
        key: String,
        name: String,
        visibility: String,
        value: Option<Vec<u8>>,
        metadata: Vec<PropertyMetadataValue>,
        previous_value: Option<Vec<u8>>,
        previous_timestamp: Option<i64>,
    },
    MarkPropertyHidden {
        key: String,
        name: String,
        visibility: String,
        hidden_visibility: String,
        payload: Option<Vec<u8>>,
    },
    MarkPropertyVisible {
        key: String,
        name: String,
        visibility: String,
        hidden_visibility: String,
        payload: Option<Vec<u8>>,
    },
    /// `value` is the last value seen for the property, `None` if the
    /// soft delete has no matching property.
    SoftDeleteProperty {
        key: String,
        name: String,
        visibility: String,
        value: Option<Vec<u8>>,
        payload: Option<Vec<u8>>,
    },
}

impl HistoricalEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            HistoricalEventKind::AddVertex { .. } => "AddVertex",
            HistoricalEventKind::AddEdge { .. } => "AddEdge",
            HistoricalEventKind::AlterVertexVisibility { .. } => "AlterVertexVisibility",
            HistoricalEventKind::AlterEdgeVisibility { .. } => "AlterEdgeVisibility",
            HistoricalEventKind::AlterEdgeLabel { .. } => "AlterEdgeLabel",
            HistoricalEventKind::DeleteVertex { .. } => "DeleteVertex",
            HistoricalEventKind::DeleteEdge { .. } => "DeleteEdge",
            HistoricalEventKind::SoftDeleteVertex { .. } => "SoftDeleteVertex",
            HistoricalEventKind::SoftDeleteEdge { .. } => "SoftDeleteEdge",
            HistoricalEventKind::MarkHidden { .. } => "MarkHidden",
            HistoricalEventKind::MarkVisible { .. } => "MarkVisible",
            HistoricalEventKind::AddProperty { .. } => "AddProperty",
            HistoricalEventKind::MarkPropertyHidden { .. } => "MarkPropertyHidden",
            HistoricalEventKind::MarkPropertyVisible { .. } => "MarkPropertyVisible",
            HistoricalEventKind::SoftDeleteProperty { .. } => "SoftDeleteProperty",
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            HistoricalEventKind::DeleteVertex { .. } | HistoricalEventKind::DeleteEdge { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalEvent {
    pub id: HistoricalEventId,
    pub element_type: ElementType,
    #[serde(skip)]
    pub element_id: String,
    pub kind: HistoricalEventKind,
}

impl HistoricalEvent {
    pub fn timestamp(&self) -> i64 {
        self.id.timestamp
    }
}

/// Frame `events` as length-prefixed MessagePack records.
pub fn encode_events(events: &[HistoricalEvent]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(events.len() * 64);
    for event in events {
        let record = rmp_serde::to_vec_named(event)?;
        wire::write_bytes(&mut buf, &record)?;
    }
    Ok(buf)
}

/// Inverse of [`encode_events`]; every event gets `element_id`.
pub fn decode_events(element_id: &str, bytes: &[u8]) -> Result<Vec<HistoricalEvent>> {
    let mut reader = Reader::new(bytes);
    let mut events = Vec::new();
    while !reader.is_empty() {
        let record = reader.read_bytes()?;
        let mut event: HistoricalEvent = rmp_serde::from_slice(record)?;
        event.element_id = element_id.to_string();
        events.push(event);
    }
    Ok(events)
}
