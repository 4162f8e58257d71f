//! Byte-level codecs: composite qualifiers, edge references and the
//! big-endian primitives shared by the snapshot layout.

pub mod edge_info;
pub mod qualifier;
pub mod wire;

pub use edge_info::EdgeInfo;
pub use qualifier::{
    PropertyColumnQualifier, PropertyHiddenColumnQualifier, PropertyMetadataColumnQualifier,
    SEPARATOR,
};
