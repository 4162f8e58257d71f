//! Edge reference stored as the value of `EOUT`/`EIN` cells.
//!
//! ```text
//! [label_len: u32 BE][label: utf8][vertex_id_len: u32 BE][vertex_id: utf8]
//! ```
//!
//! Visibility and timestamp come from the cell key, not the value.

use crate::codec::wire::{write_str, Reader};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeInfo {
    pub label: String,
    /// Vertex at the far end of the edge, seen from the row's vertex.
    pub far_vertex_id: String,
    pub visibility: String,
    pub timestamp: i64,
}

impl EdgeInfo {
    pub fn new(
        label: impl Into<String>,
        far_vertex_id: impl Into<String>,
        visibility: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            label: label.into(),
            far_vertex_id: far_vertex_id.into(),
            visibility: visibility.into(),
            timestamp,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(&self.label, &self.far_vertex_id)
    }

    /// Decode a cell value; visibility and timestamp are taken from the key.
    pub fn decode(value: &[u8], visibility: &str, timestamp: i64) -> Result<Self> {
        let (label, far_vertex_id) = decode(value)?;
        Ok(Self::new(label, far_vertex_id, visibility, timestamp))
    }
}

/// Encode `(label, far_vertex_id)`. Fails if either part exceeds a u32 length prefix.
pub fn encode(label: &str, far_vertex_id: &str) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(encoded_len(label, far_vertex_id));
    write_str(&mut buf, label)?;
    write_str(&mut buf, far_vertex_id)?;
    Ok(buf)
}

/// Decode `(label, far_vertex_id)`.
pub fn decode(value: &[u8]) -> Result<(&str, &str)> {
    let mut reader = Reader::new(value);
    let label = reader.read_str()?;
    let far_vertex_id = reader.read_str()?;
    Ok((label, far_vertex_id))
}

/// Read only the label.
pub fn read_label(value: &[u8]) -> Result<&str> {
    Reader::new(value).read_str()
}

/// Fast path: skip the label without validating it and read the far vertex id.
pub fn read_far_vertex_id(value: &[u8]) -> Result<&str> {
    let mut reader = Reader::new(value);
    reader.skip_bytes()?;
    reader.read_str()
}

/// Encoded size of an edge reference, used for buffer accounting.
pub fn encoded_len(label: &str, far_vertex_id: &str) -> usize {
    8 + label.len() + far_vertex_id.len()
}
