//! Element accumulator: merges the classified cells of one row into
//! `ElementData` and encodes the result as a snapshot.
//!
//! Vertex- and edge-specific families are handled by an [`ElementKind`]
//! hook; everything else is shared.

pub mod data;
pub mod edge;
pub mod snapshot;
pub mod vertex;

use std::fmt;
use std::io::Write;
use std::num::NonZeroUsize;

use lru::LruCache;

use crate::cell::family::{is_deleted_signal, HiddenMarker};
use crate::cell::{Cell, ColumnFamily, ElementType};
use crate::codec::qualifier::{self, PropertyHiddenColumnQualifier, PropertyMetadataColumnQualifier};
use crate::codec::wire;
use crate::error::{CellGraphError, Result};
use crate::fetch_hints::FetchHints;

pub use data::{ElementData, HiddenProperty, MetadataEntry, PropertyValue, SoftDeletedProperty};
pub use edge::EdgeData;
pub use snapshot::{decode_snapshot, EdgeRefTable, ElementSnapshot, SnapshotKind, SnapshotProperty};
pub use vertex::VertexData;

/// Default capacity of the per-instance metadata qualifier cache.
pub const DEFAULT_QUALIFIER_CACHE_SIZE: usize = 1024;

/// Outcome of ingesting one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowControl {
    Continue,
    /// Drop the whole row; remaining cells need not be read.
    Reject,
}

/// Vertex/edge specific part of the accumulator.
pub trait ElementKind: Default + fmt::Debug + Send + 'static {
    const ELEMENT_TYPE: ElementType;

    fn clear(&mut self);

    /// Called for the accepted (newest) signal cell.
    fn process_signal(&mut self, cell: &Cell) -> Result<()>;

    /// Absorb a kind-specific family. Returns `false` if not handled.
    fn process_column(
        &mut self,
        family: ColumnFamily,
        cell: &Cell,
        hints: &FetchHints,
    ) -> Result<bool>;

    /// Columns the kind needs beyond the signal are all present.
    fn has_required_columns(&self) -> bool {
        true
    }

    /// Post-ingestion cleanup, run once per accepted row.
    fn finalize(&mut self, _hints: &FetchHints) {}

    /// Kind-specific tail of the snapshot.
    fn encode<W: Write>(&self, writer: &mut W, hints: &FetchHints) -> Result<()>;
}

/// Reusable per-row state: shared `ElementData` plus the kind hook.
pub struct ElementAccumulator<K: ElementKind> {
    pub data: ElementData,
    pub kind: K,
    metadata_qualifiers: LruCache<Vec<u8>, PropertyMetadataColumnQualifier>,
}

impl<K: ElementKind> fmt::Debug for ElementAccumulator<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementAccumulator")
            .field("data", &self.data)
            .field("kind", &self.kind)
            .field("cached_qualifiers", &self.metadata_qualifiers.len())
            .finish()
    }
}

impl<K: ElementKind> Default for ElementAccumulator<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ElementKind> ElementAccumulator<K> {
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_QUALIFIER_CACHE_SIZE)
    }

    pub fn with_cache_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            data: ElementData::new(),
            kind: K::default(),
            metadata_qualifiers: LruCache::new(capacity),
        }
    }

    /// Forget the previous row. The qualifier cache is kept.
    pub fn clear(&mut self) {
        self.data.clear();
        self.kind.clear();
    }

    pub fn start_row(&mut self, id: &str) {
        self.clear();
        self.data.id.push_str(id);
    }

    pub fn cached_qualifiers(&self) -> usize {
        self.metadata_qualifiers.len()
    }

    /// Merge one cell of the current row.
    pub fn ingest(&mut self, cell: &Cell, hints: &FetchHints) -> Result<RowControl> {
        let family = cell.family();
        if self.kind.process_column(family, cell, hints)? {
            return Ok(RowControl::Continue);
        }

        match family {
            ColumnFamily::RowDeletion => return Ok(RowControl::Reject),
            ColumnFamily::Signal(element_type) if element_type == K::ELEMENT_TYPE => {
                let deleted = is_deleted_signal(cell.value());
                if self
                    .data
                    .accept_signal(cell.visibility_str()?, cell.timestamp(), deleted)
                {
                    self.kind.process_signal(cell)?;
                }
            }
            ColumnFamily::Property => self.ingest_property(cell, hints)?,
            ColumnFamily::PropertyMetadata => self.ingest_property_metadata(cell, hints)?,
            ColumnFamily::PropertySoftDelete => {
                let parts = qualifier::split(cell.qualifier_str()?, 2)?;
                if hints.include_property(parts[0]) {
                    self.data.soft_deleted_properties.push(SoftDeletedProperty {
                        key: parts[1].to_string(),
                        name: parts[0].to_string(),
                        timestamp: cell.timestamp(),
                        visibility: cell.visibility_str()?.to_string(),
                    });
                }
            }
            ColumnFamily::PropertyHidden => {
                let q = PropertyHiddenColumnQualifier::parse(cell.qualifier_str()?)?;
                let first = self.data.resolve_marker(
                    cell.column_family(),
                    cell.column_qualifier(),
                    cell.visibility(),
                );
                if first && HiddenMarker::parse(cell.value()).is_hidden() {
                    self.data.hidden_properties.push(HiddenProperty {
                        key: q.key,
                        name: q.name,
                        visibility: q.visibility,
                        hidden_visibility: cell.visibility_str()?.to_string(),
                    });
                }
            }
            ColumnFamily::ElementHidden => {
                let first = self.data.resolve_marker(
                    cell.column_family(),
                    cell.column_qualifier(),
                    cell.visibility(),
                );
                if first && HiddenMarker::parse(cell.value()).is_hidden() {
                    self.data.add_hidden_visibility(cell.visibility_str()?);
                }
            }
            ColumnFamily::ElementSoftDelete => self.data.record_soft_delete(cell.timestamp()),
            ColumnFamily::ExtendedDataTableMarker => {
                if hints.include_extended_data_table_names {
                    let table = cell.qualifier_str()?;
                    if !self.data.extended_data_table_names.contains(table) {
                        self.data.extended_data_table_names.insert(table.to_string());
                    }
                }
            }
            other => {
                tracing::trace!(row = %self.data.id, family = ?other, "ignoring cell");
            }
        }
        Ok(RowControl::Continue)
    }

    fn ingest_property(&mut self, cell: &Cell, hints: &FetchHints) -> Result<()> {
        let parts = qualifier::split(cell.qualifier_str()?, 2)?;
        if !hints.include_property(parts[0]) {
            return Ok(());
        }
        self.data.add_property(PropertyValue {
            name: parts[0].to_string(),
            key: parts[1].to_string(),
            visibility: cell.visibility_str()?.to_string(),
            timestamp: cell.timestamp(),
            value: cell.value().to_vec(),
        })
    }

    fn ingest_property_metadata(&mut self, cell: &Cell, hints: &FetchHints) -> Result<()> {
        let q = cached_metadata_qualifier(&mut self.metadata_qualifiers, cell)?;
        if !hints.include_property(&q.name) || !hints.include_metadata(&q.metadata_key) {
            return Ok(());
        }
        let discriminator = q.property_discriminator(cell.timestamp())?;
        let entry = MetadataEntry {
            metadata_key: q.metadata_key.clone(),
            metadata_visibility: cell.visibility_str()?.to_string(),
            value: cell.value().to_vec(),
        };
        self.data.add_property_metadata(discriminator, entry);
        Ok(())
    }

    /// Whether the ingested row yields an element under `hints`.
    pub fn is_valid(&self, hints: &FetchHints) -> bool {
        self.data.has_element()
            && self.kind.has_required_columns()
            && (hints.include_hidden || !self.data.is_hidden())
    }

    pub fn finalize(&mut self, hints: &FetchHints) {
        self.kind.finalize(hints);
    }

    /// Encode the accumulated element. Deterministic for a given state.
    pub fn encode(&self, hints: &FetchHints) -> Result<Vec<u8>> {
        let data = &self.data;
        let mut buf = Vec::with_capacity(256);

        snapshot::write_header(&mut buf, K::ELEMENT_TYPE)?;
        wire::write_str(&mut buf, &data.id)?;
        wire::write_i64(&mut buf, data.timestamp)?;
        wire::write_str(&mut buf, data.visibility.as_deref().unwrap_or(""))?;
        wire::write_str_list(&mut buf, data.hidden_visibilities.iter().map(String::as_str))?;

        snapshot::write_metadata_table(&mut buf, &data.metadata_entries)?;

        wire::write_u8(&mut buf, snapshot::PROPERTY_START)?;
        for (discriminator, property) in data.visible_properties(hints.include_hidden) {
            wire::write_u8(&mut buf, snapshot::PROPERTY_ENTRY)?;
            wire::write_str(&mut buf, &property.key)?;
            wire::write_str(&mut buf, &property.name)?;
            wire::write_str(&mut buf, &property.visibility)?;
            wire::write_i64(&mut buf, property.timestamp)?;
            wire::write_bytes(&mut buf, &property.value)?;
            let hidden = data.property_hidden_visibilities(property);
            wire::write_str_list(&mut buf, hidden.iter().copied())?;
            let indexes = data
                .property_metadata
                .get(discriminator)
                .map(Vec::as_slice)
                .unwrap_or_default();
            wire::write_len(&mut buf, indexes.len())?;
            for &index in indexes {
                wire::write_u32(&mut buf, index)?;
            }
        }
        wire::write_u8(&mut buf, snapshot::PROPERTY_END)?;

        wire::write_str_list(
            &mut buf,
            data.extended_data_table_names.iter().map(String::as_str),
        )?;

        self.kind.encode(&mut buf, hints)?;
        Ok(buf)
    }
}

fn cached_metadata_qualifier<'a>(
    cache: &'a mut LruCache<Vec<u8>, PropertyMetadataColumnQualifier>,
    cell: &Cell,
) -> Result<&'a PropertyMetadataColumnQualifier> {
    if !cache.contains(cell.column_qualifier()) {
        let parsed = PropertyMetadataColumnQualifier::parse(cell.qualifier_str()?)?;
        cache.put(cell.column_qualifier().to_vec(), parsed);
    }
    cache.get(cell.column_qualifier()).ok_or_else(|| {
        CellGraphError::InvalidFormat("metadata qualifier evicted during lookup".into())
    })
}
