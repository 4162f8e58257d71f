//! Binary snapshot of one element, produced by the row merge.
//!
//! All integers are big-endian. Strings and byte arrays are `u32`
//! length-prefixed; lists are a `u32` count followed by items.
//!
//! ```text
//! magic "CGEL" | version: u8 | element_type: u8 (1 vertex, 2 edge)
//! id | timestamp: i64 | visibility | hidden_visibilities: [string]
//! 0xA1 | entry_count: u32 | (metadata_key, visibility, value: bytes)* | 0xA2
//! 0xB1 | (0xB3 key name visibility timestamp value hidden: [string] metadata: [u32])* | 0xB2
//! extended_data_table_names: [string]
//! vertex: out_table in_table
//!   table = 0 (none) | 1 count (edge_id label far_vertex_id visibility timestamp)*
//!                    | 2 count (label count: u32)*
//! edge:   out_vertex_id in_vertex_id label
//! ```
//!
//! Any change to field order or markers breaks existing readers.

use std::io::Write;

use crate::cell::ElementType;
use crate::codec::wire::{self, Reader};
use crate::codec::EdgeInfo;
use crate::element::data::MetadataEntry;
use crate::error::{CellGraphError, Result};

pub const MAGIC: [u8; 4] = *b"CGEL";
pub const FORMAT_VERSION: u8 = 1;

pub const METADATA_START: u8 = 0xA1;
pub const METADATA_END: u8 = 0xA2;
pub const PROPERTY_START: u8 = 0xB1;
pub const PROPERTY_END: u8 = 0xB2;
pub const PROPERTY_ENTRY: u8 = 0xB3;

pub const EDGE_TABLE_NONE: u8 = 0;
pub const EDGE_TABLE_FULL: u8 = 1;
pub const EDGE_TABLE_COUNTS: u8 = 2;

// ── Encoding ───────────────────────────────────────────────────────

pub fn write_header<W: Write>(writer: &mut W, element_type: ElementType) -> Result<()> {
    writer.write_all(&MAGIC)?;
    wire::write_u8(writer, FORMAT_VERSION)?;
    wire::write_u8(writer, element_type as u8)
}

pub fn write_metadata_table<W: Write>(writer: &mut W, entries: &[MetadataEntry]) -> Result<()> {
    wire::write_u8(writer, METADATA_START)?;
    wire::write_len(writer, entries.len())?;
    for entry in entries {
        wire::write_str(writer, &entry.metadata_key)?;
        wire::write_str(writer, &entry.metadata_visibility)?;
        wire::write_bytes(writer, &entry.value)?;
    }
    wire::write_u8(writer, METADATA_END)
}

/// Full `{edge_id -> EdgeInfo}` table; `edges` must already be sorted by id.
pub fn write_full_edge_table<'a, W, I>(writer: &mut W, edges: I) -> Result<()>
where
    W: Write,
    I: ExactSizeIterator<Item = (&'a String, &'a EdgeInfo)>,
{
    wire::write_u8(writer, EDGE_TABLE_FULL)?;
    wire::write_len(writer, edges.len())?;
    for (edge_id, info) in edges {
        wire::write_str(writer, edge_id)?;
        wire::write_str(writer, &info.label)?;
        wire::write_str(writer, &info.far_vertex_id)?;
        wire::write_str(writer, &info.visibility)?;
        wire::write_i64(writer, info.timestamp)?;
    }
    Ok(())
}

/// Compact `{label -> count}` table; `counts` must already be sorted by label.
pub fn write_label_count_table<'a, W, I>(writer: &mut W, counts: I) -> Result<()>
where
    W: Write,
    I: ExactSizeIterator<Item = (&'a String, &'a u32)>,
{
    wire::write_u8(writer, EDGE_TABLE_COUNTS)?;
    wire::write_len(writer, counts.len())?;
    for (label, count) in counts {
        wire::write_str(writer, label)?;
        wire::write_u32(writer, *count)?;
    }
    Ok(())
}

// ── Decoded Form ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotProperty {
    pub key: String,
    pub name: String,
    pub visibility: String,
    pub timestamp: i64,
    pub value: Vec<u8>,
    pub hidden_visibilities: Vec<String>,
    pub metadata_indexes: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeRefTable {
    None,
    Full(Vec<(String, EdgeInfo)>),
    LabelCounts(Vec<(String, u32)>),
}

impl EdgeRefTable {
    pub fn edge_ids(&self) -> Vec<&str> {
        match self {
            EdgeRefTable::Full(edges) => edges.iter().map(|(id, _)| id.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn label_count(&self, label: &str) -> Option<u32> {
        match self {
            EdgeRefTable::LabelCounts(counts) => {
                counts.iter().find(|(l, _)| l == label).map(|(_, c)| *c)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotKind {
    Vertex {
        out_edges: EdgeRefTable,
        in_edges: EdgeRefTable,
    },
    Edge {
        out_vertex_id: String,
        in_vertex_id: String,
        label: String,
    },
}

/// Decoded element snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSnapshot {
    pub element_type: ElementType,
    pub id: String,
    pub timestamp: i64,
    pub visibility: String,
    pub hidden_visibilities: Vec<String>,
    pub metadata_entries: Vec<MetadataEntry>,
    pub properties: Vec<SnapshotProperty>,
    pub extended_data_table_names: Vec<String>,
    pub kind: SnapshotKind,
}

impl ElementSnapshot {
    /// All versions of properties named `name`, in encode order.
    pub fn properties_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a SnapshotProperty> {
        self.properties.iter().filter(move |p| p.name == name)
    }

    pub fn property<'a>(&'a self, name: &'a str) -> Option<&'a SnapshotProperty> {
        self.properties_named(name).next()
    }

    /// Resolved metadata `(key, visibility, value)` of a property.
    pub fn metadata_of<'a>(&'a self, property: &'a SnapshotProperty) -> Vec<&'a MetadataEntry> {
        property
            .metadata_indexes
            .iter()
            .filter_map(|&i| self.metadata_entries.get(i as usize))
            .collect()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode_snapshot(bytes)
    }
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<ElementSnapshot> {
    let mut r = Reader::new(bytes);

    let magic = r.take(4)?;
    if magic != MAGIC {
        return Err(CellGraphError::InvalidFormat(format!(
            "Not an element snapshot: expected CGEL, got {:?}",
            magic
        )));
    }
    let version = r.read_u8()?;
    if version != FORMAT_VERSION {
        return Err(CellGraphError::InvalidFormat(format!(
            "Unsupported snapshot version: {}",
            version
        )));
    }
    let type_tag = r.read_u8()?;
    let element_type = ElementType::from_u8(type_tag).ok_or_else(|| {
        CellGraphError::InvalidFormat(format!("Unknown element type tag: {}", type_tag))
    })?;

    let id = r.read_string()?;
    let timestamp = r.read_i64()?;
    let visibility = r.read_string()?;
    let hidden_visibilities = r.read_str_list()?;

    r.expect_marker(METADATA_START, "metadata start")?;
    let count = r.read_u32()? as usize;
    let mut metadata_entries = Vec::with_capacity(count.min(r.remaining()));
    for _ in 0..count {
        metadata_entries.push(MetadataEntry {
            metadata_key: r.read_string()?,
            metadata_visibility: r.read_string()?,
            value: r.read_bytes()?.to_vec(),
        });
    }
    r.expect_marker(METADATA_END, "metadata end")?;

    r.expect_marker(PROPERTY_START, "property start")?;
    let mut properties = Vec::new();
    loop {
        match r.read_u8()? {
            PROPERTY_END => break,
            PROPERTY_ENTRY => {
                let key = r.read_string()?;
                let name = r.read_string()?;
                let visibility = r.read_string()?;
                let timestamp = r.read_i64()?;
                let value = r.read_bytes()?.to_vec();
                let hidden_visibilities = r.read_str_list()?;
                let index_count = r.read_u32()? as usize;
                let mut metadata_indexes = Vec::with_capacity(index_count.min(r.remaining()));
                for _ in 0..index_count {
                    let index = r.read_u32()?;
                    if index as usize >= metadata_entries.len() {
                        return Err(CellGraphError::InvalidFormat(format!(
                            "Metadata index {} out of range ({} entries)",
                            index,
                            metadata_entries.len()
                        )));
                    }
                    metadata_indexes.push(index);
                }
                properties.push(SnapshotProperty {
                    key,
                    name,
                    visibility,
                    timestamp,
                    value,
                    hidden_visibilities,
                    metadata_indexes,
                });
            }
            other => {
                return Err(CellGraphError::InvalidFormat(format!(
                    "Unexpected byte 0x{:02X} in property list",
                    other
                )))
            }
        }
    }

    let extended_data_table_names = r.read_str_list()?;

    let kind = match element_type {
        ElementType::Vertex => SnapshotKind::Vertex {
            out_edges: read_edge_table(&mut r)?,
            in_edges: read_edge_table(&mut r)?,
        },
        ElementType::Edge => SnapshotKind::Edge {
            out_vertex_id: r.read_string()?,
            in_vertex_id: r.read_string()?,
            label: r.read_string()?,
        },
    };

    if !r.is_empty() {
        return Err(CellGraphError::InvalidFormat(format!(
            "{} trailing bytes after snapshot",
            r.remaining()
        )));
    }

    Ok(ElementSnapshot {
        element_type,
        id,
        timestamp,
        visibility,
        hidden_visibilities,
        metadata_entries,
        properties,
        extended_data_table_names,
        kind,
    })
}

fn read_edge_table(r: &mut Reader<'_>) -> Result<EdgeRefTable> {
    match r.read_u8()? {
        EDGE_TABLE_NONE => Ok(EdgeRefTable::None),
        EDGE_TABLE_FULL => {
            let count = r.read_u32()? as usize;
            let mut edges = Vec::with_capacity(count.min(r.remaining()));
            for _ in 0..count {
                let edge_id = r.read_string()?;
                let label = r.read_string()?;
                let far_vertex_id = r.read_string()?;
                let visibility = r.read_string()?;
                let timestamp = r.read_i64()?;
                edges.push((edge_id, EdgeInfo::new(label, far_vertex_id, visibility, timestamp)));
            }
            Ok(EdgeRefTable::Full(edges))
        }
        EDGE_TABLE_COUNTS => {
            let count = r.read_u32()? as usize;
            let mut counts = Vec::with_capacity(count.min(r.remaining()));
            for _ in 0..count {
                let label = r.read_string()?;
                counts.push((label, r.read_u32()?));
            }
            Ok(EdgeRefTable::LabelCounts(counts))
        }
        other => Err(CellGraphError::InvalidFormat(format!(
            "Unknown edge table tag: {}",
            other
        ))),
    }
}
