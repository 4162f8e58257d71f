//! Error types for the row-merge engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CellGraphError>;

#[derive(Error, Debug)]
pub enum CellGraphError {
    #[error("Malformed qualifier: expected {expected} parts, found {found} in {qualifier:?}")]
    MalformedQualifier {
        expected: usize,
        found: usize,
        qualifier: String,
    },

    #[error("Invalid key: {0:?} contains the reserved separator")]
    InvalidKey(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("Row {row:?} exceeds buffer budget ({size} > {max} bytes)")]
    BufferOverflow { row: String, size: usize, max: usize },

    #[error("Unhandled element type: {0}")]
    UnhandledElementType(String),

    #[error("Unhandled sort direction: {0}")]
    UnhandledSortDirection(String),

    #[error("Invalid option {key}: {reason}")]
    InvalidOption { key: String, reason: String },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event encode error: {0}")]
    EventEncode(#[from] rmp_serde::encode::Error),

    #[error("Event decode error: {0}")]
    EventDecode(#[from] rmp_serde::decode::Error),
}

impl CellGraphError {
    /// Stable error code for the host pipeline.
    pub fn code(&self) -> &'static str {
        match self {
            CellGraphError::MalformedQualifier { .. } => "MALFORMED_QUALIFIER",
            CellGraphError::InvalidKey(_) => "INVALID_KEY",
            CellGraphError::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            CellGraphError::BufferOverflow { .. } => "BUFFER_OVERFLOW",
            CellGraphError::UnhandledElementType(_) => "UNHANDLED_ELEMENT_TYPE",
            CellGraphError::UnhandledSortDirection(_) => "UNHANDLED_SORT_DIRECTION",
            CellGraphError::InvalidOption { .. } => "INVALID_OPTION",
            CellGraphError::InvalidFormat(_) => "INVALID_FORMAT",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Whether the host may skip the offending row and keep scanning.
    ///
    /// Only buffer overflows are recoverable; everything else points at a
    /// writer/reader mismatch or a programming error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CellGraphError::BufferOverflow { .. })
    }

    pub(crate) fn invalid_option(key: &str, reason: impl Into<String>) -> Self {
        CellGraphError::InvalidOption {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}
