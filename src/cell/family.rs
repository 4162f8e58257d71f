//! Column-family roles and the marker values stored under them.
//!
//! ```text
//! Family    Qualifier                       Value
//! V / E     "" / edge label                 "" | "\0DEL"...
//! PROP      name␟key                        property value
//! PROPMETA  name␟key␟visibility␟metaKey     metadata value
//! PROPH     name␟key␟visibility             'H' | 'V' + payload
//! PROPD     name␟key                        'D' + payload
//! H / D     ""                              'H' | 'V' / 'D' + payload
//! EXTDATA   table name                      ""
//! VOUT/VIN  endpoint vertex id              ""
//! EOUT/EIN  edge id                         EdgeInfo
//! EOUTH...  edge id                         'H' | 'V' + payload
//! EOUTD...  edge id                         'D' + payload
//! ""        ""                              "DEL_ROW"
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CellGraphError;

pub const CF_VERTEX_SIGNAL: &[u8] = b"V";
pub const CF_EDGE_SIGNAL: &[u8] = b"E";
pub const CF_PROPERTY: &[u8] = b"PROP";
pub const CF_PROPERTY_METADATA: &[u8] = b"PROPMETA";
pub const CF_PROPERTY_HIDDEN: &[u8] = b"PROPH";
pub const CF_PROPERTY_SOFT_DELETE: &[u8] = b"PROPD";
pub const CF_HIDDEN: &[u8] = b"H";
pub const CF_SOFT_DELETE: &[u8] = b"D";
pub const CF_EXTENDED_DATA: &[u8] = b"EXTDATA";
pub const CF_OUT_VERTEX: &[u8] = b"VOUT";
pub const CF_IN_VERTEX: &[u8] = b"VIN";
pub const CF_OUT_EDGE: &[u8] = b"EOUT";
pub const CF_IN_EDGE: &[u8] = b"EIN";
pub const CF_OUT_EDGE_HIDDEN: &[u8] = b"EOUTH";
pub const CF_IN_EDGE_HIDDEN: &[u8] = b"EINH";
pub const CF_OUT_EDGE_SOFT_DELETE: &[u8] = b"EOUTD";
pub const CF_IN_EDGE_SOFT_DELETE: &[u8] = b"EIND";

/// Value of the row-deletion tombstone (empty family and qualifier).
pub const ROW_DELETION_VALUE: &[u8] = b"DEL_ROW";

/// Prefix of a signal value marking the element as deleted.
pub const DELETED_SIGNAL_PREFIX: &[u8] = b"\x00DEL";

pub const HIDDEN_MARKER: u8 = b'H';
pub const VISIBLE_MARKER: u8 = b'V';
pub const SOFT_DELETE_MARKER: u8 = b'D';

// ── Element Type ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ElementType {
    Vertex = 1,
    Edge = 2,
}

impl ElementType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::Vertex),
            2 => Some(Self::Edge),
            _ => None,
        }
    }

    pub fn signal_family(self) -> &'static [u8] {
        match self {
            ElementType::Vertex => CF_VERTEX_SIGNAL,
            ElementType::Edge => CF_EDGE_SIGNAL,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Vertex => "vertex",
            ElementType::Edge => "edge",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = CellGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vertex" => Ok(ElementType::Vertex),
            "edge" => Ok(ElementType::Edge),
            _ => Err(CellGraphError::UnhandledElementType(s.to_string())),
        }
    }
}

// ── Column Family ──────────────────────────────────────────────────

/// Semantic role of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnFamily {
    Signal(ElementType),
    Property,
    PropertyMetadata,
    PropertyHidden,
    PropertySoftDelete,
    ElementHidden,
    ElementSoftDelete,
    ExtendedDataTableMarker,
    OutVertexRef,
    InVertexRef,
    OutEdgeRef,
    InEdgeRef,
    OutEdgeRefHidden,
    InEdgeRefHidden,
    OutEdgeRefSoftDelete,
    InEdgeRefSoftDelete,
    RowDeletion,
    Unknown,
}

impl ColumnFamily {
    pub fn classify(column_family: &[u8], column_qualifier: &[u8], value: &[u8]) -> Self {
        match column_family {
            CF_VERTEX_SIGNAL => ColumnFamily::Signal(ElementType::Vertex),
            CF_EDGE_SIGNAL => ColumnFamily::Signal(ElementType::Edge),
            CF_PROPERTY => ColumnFamily::Property,
            CF_PROPERTY_METADATA => ColumnFamily::PropertyMetadata,
            CF_PROPERTY_HIDDEN => ColumnFamily::PropertyHidden,
            CF_PROPERTY_SOFT_DELETE => ColumnFamily::PropertySoftDelete,
            CF_HIDDEN => ColumnFamily::ElementHidden,
            CF_SOFT_DELETE => ColumnFamily::ElementSoftDelete,
            CF_EXTENDED_DATA => ColumnFamily::ExtendedDataTableMarker,
            CF_OUT_VERTEX => ColumnFamily::OutVertexRef,
            CF_IN_VERTEX => ColumnFamily::InVertexRef,
            CF_OUT_EDGE => ColumnFamily::OutEdgeRef,
            CF_IN_EDGE => ColumnFamily::InEdgeRef,
            CF_OUT_EDGE_HIDDEN => ColumnFamily::OutEdgeRefHidden,
            CF_IN_EDGE_HIDDEN => ColumnFamily::InEdgeRefHidden,
            CF_OUT_EDGE_SOFT_DELETE => ColumnFamily::OutEdgeRefSoftDelete,
            CF_IN_EDGE_SOFT_DELETE => ColumnFamily::InEdgeRefSoftDelete,
            b"" if column_qualifier.is_empty() && value == ROW_DELETION_VALUE => {
                ColumnFamily::RowDeletion
            }
            _ => ColumnFamily::Unknown,
        }
    }

    /// Physical family name; empty for the row tombstone and unknown roles.
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            ColumnFamily::Signal(element_type) => element_type.signal_family(),
            ColumnFamily::Property => CF_PROPERTY,
            ColumnFamily::PropertyMetadata => CF_PROPERTY_METADATA,
            ColumnFamily::PropertyHidden => CF_PROPERTY_HIDDEN,
            ColumnFamily::PropertySoftDelete => CF_PROPERTY_SOFT_DELETE,
            ColumnFamily::ElementHidden => CF_HIDDEN,
            ColumnFamily::ElementSoftDelete => CF_SOFT_DELETE,
            ColumnFamily::ExtendedDataTableMarker => CF_EXTENDED_DATA,
            ColumnFamily::OutVertexRef => CF_OUT_VERTEX,
            ColumnFamily::InVertexRef => CF_IN_VERTEX,
            ColumnFamily::OutEdgeRef => CF_OUT_EDGE,
            ColumnFamily::InEdgeRef => CF_IN_EDGE,
            ColumnFamily::OutEdgeRefHidden => CF_OUT_EDGE_HIDDEN,
            ColumnFamily::InEdgeRefHidden => CF_IN_EDGE_HIDDEN,
            ColumnFamily::OutEdgeRefSoftDelete => CF_OUT_EDGE_SOFT_DELETE,
            ColumnFamily::InEdgeRefSoftDelete => CF_IN_EDGE_SOFT_DELETE,
            ColumnFamily::RowDeletion | ColumnFamily::Unknown => b"",
        }
    }

    /// Families whose qualifier starts with `name␟key`.
    pub fn is_property_family(self) -> bool {
        matches!(
            self,
            ColumnFamily::Property
                | ColumnFamily::PropertyMetadata
                | ColumnFamily::PropertyHidden
                | ColumnFamily::PropertySoftDelete
        )
    }
}

// ── Marker Values ──────────────────────────────────────────────────

/// Parsed value of a hidden/visible marker cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HiddenMarker<'a> {
    Hidden { payload: Option<&'a [u8]> },
    Visible { payload: Option<&'a [u8]> },
}

impl<'a> HiddenMarker<'a> {
    /// An empty value is a bare hidden marker.
    pub fn parse(value: &'a [u8]) -> Self {
        match value.split_first() {
            Some((&VISIBLE_MARKER, rest)) => HiddenMarker::Visible {
                payload: non_empty(rest),
            },
            Some((&HIDDEN_MARKER, rest)) => HiddenMarker::Hidden {
                payload: non_empty(rest),
            },
            Some(_) => HiddenMarker::Hidden {
                payload: Some(value),
            },
            None => HiddenMarker::Hidden { payload: None },
        }
    }

    pub fn is_hidden(&self) -> bool {
        matches!(self, HiddenMarker::Hidden { .. })
    }

    pub fn payload(&self) -> Option<&'a [u8]> {
        match *self {
            HiddenMarker::Hidden { payload } | HiddenMarker::Visible { payload } => payload,
        }
    }
}

fn non_empty(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.is_empty() {
        None
    } else {
        Some(bytes)
    }
}

pub fn hidden_value(payload: Option<&[u8]>) -> Vec<u8> {
    marker_value(HIDDEN_MARKER, payload)
}

pub fn visible_value(payload: Option<&[u8]>) -> Vec<u8> {
    marker_value(VISIBLE_MARKER, payload)
}

pub fn soft_delete_value(payload: Option<&[u8]>) -> Vec<u8> {
    marker_value(SOFT_DELETE_MARKER, payload)
}

/// Payload attached to a soft-delete marker, if any.
pub fn soft_delete_payload(value: &[u8]) -> Option<&[u8]> {
    match value.split_first() {
        Some((&SOFT_DELETE_MARKER, rest)) => non_empty(rest),
        Some(_) => Some(value),
        None => None,
    }
}

pub fn is_deleted_signal(value: &[u8]) -> bool {
    value.starts_with(DELETED_SIGNAL_PREFIX)
}

pub fn deleted_signal_value() -> Vec<u8> {
    DELETED_SIGNAL_PREFIX.to_vec()
}

fn marker_value(marker: u8, payload: Option<&[u8]>) -> Vec<u8> {
    let payload = payload.unwrap_or_default();
    let mut value = Vec::with_capacity(1 + payload.len());
    value.push(marker);
    value.extend_from_slice(payload);
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_families() {
        assert_eq!(
            ColumnFamily::classify(b"V", b"", b""),
            ColumnFamily::Signal(ElementType::Vertex)
        );
        assert_eq!(
            ColumnFamily::classify(b"E", b"knows", b""),
            ColumnFamily::Signal(ElementType::Edge)
        );
        assert_eq!(ColumnFamily::classify(b"PROPMETA", b"x", b""), ColumnFamily::PropertyMetadata);
        assert_eq!(ColumnFamily::classify(b"EINH", b"e1", b"H"), ColumnFamily::InEdgeRefHidden);
        assert_eq!(ColumnFamily::classify(b"nope", b"", b""), ColumnFamily::Unknown);
    }

    #[test]
    fn test_classify_row_deletion_needs_sentinel() {
        assert_eq!(ColumnFamily::classify(b"", b"", b"DEL_ROW"), ColumnFamily::RowDeletion);
        assert_eq!(ColumnFamily::classify(b"", b"", b"other"), ColumnFamily::Unknown);
        assert_eq!(ColumnFamily::classify(b"", b"q", b"DEL_ROW"), ColumnFamily::Unknown);
    }

    #[test]
    fn test_as_bytes_matches_classify() {
        for family in [
            ColumnFamily::Property,
            ColumnFamily::PropertySoftDelete,
            ColumnFamily::OutEdgeRefSoftDelete,
            ColumnFamily::ExtendedDataTableMarker,
            ColumnFamily::Signal(ElementType::Edge),
        ] {
            assert_eq!(ColumnFamily::classify(family.as_bytes(), b"q", b""), family);
        }
    }

    #[test]
    fn test_hidden_marker_parse() {
        assert_eq!(HiddenMarker::parse(b"H"), HiddenMarker::Hidden { payload: None });
        assert_eq!(HiddenMarker::parse(b""), HiddenMarker::Hidden { payload: None });
        assert_eq!(
            HiddenMarker::parse(b"Vwhy"),
            HiddenMarker::Visible {
                payload: Some(b"why".as_slice())
            }
        );
        assert!(HiddenMarker::parse(&hidden_value(Some(b"x"))).is_hidden());
        assert_eq!(HiddenMarker::parse(&hidden_value(Some(b"x"))).payload(), Some(b"x".as_slice()));
    }

    #[test]
    fn test_soft_delete_payload() {
        assert_eq!(soft_delete_payload(&soft_delete_value(None)), None);
        assert_eq!(soft_delete_payload(b"Dgone"), Some(b"gone".as_slice()));
        assert_eq!(soft_delete_payload(b""), None);
    }

    #[test]
    fn test_element_type_parse() {
        assert_eq!("vertex".parse::<ElementType>().unwrap(), ElementType::Vertex);
        assert_eq!("EDGE".parse::<ElementType>().unwrap(), ElementType::Edge);
        let err = "node".parse::<ElementType>().unwrap_err();
        assert_eq!(err.code(), "UNHANDLED_ELEMENT_TYPE");
    }

    #[test]
    fn test_deleted_signal() {
        assert!(is_deleted_signal(&deleted_signal_value()));
        assert!(is_deleted_signal(b"\x00DELextra"));
        assert!(!is_deleted_signal(b""));
    }
}
