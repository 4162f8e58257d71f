//! Per-row working state shared by vertices and edges.
//!
//! `ElementData` is reused across rows: `clear()` empties every collection
//! but keeps their allocations.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::codec::qualifier;
use crate::error::Result;

/// Metadata attached to a property. Entries are shared between properties
/// through their index in `ElementData::metadata_entries`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataEntry {
    pub metadata_key: String,
    pub metadata_visibility: String,
    pub value: Vec<u8>,
}

/// One live property version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyValue {
    pub name: String,
    pub key: String,
    pub visibility: String,
    pub timestamp: i64,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDeletedProperty {
    pub key: String,
    pub name: String,
    pub timestamp: i64,
    pub visibility: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HiddenProperty {
    pub key: String,
    pub name: String,
    pub visibility: String,
    pub hidden_visibility: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    pub id: String,
    /// Timestamp of the newest accepted signal; `i64::MIN` until one is seen.
    pub timestamp: i64,
    /// Set by the signal cell. `None` means the row has no element.
    pub visibility: Option<String>,
    /// Newest signal carried the deletion prefix.
    pub deleted: bool,
    pub soft_delete_timestamp: i64,
    pub hidden_visibilities: Vec<String>,
    pub soft_deleted_properties: Vec<SoftDeletedProperty>,
    pub hidden_properties: Vec<HiddenProperty>,
    pub metadata_entries: Vec<MetadataEntry>,
    metadata_entry_index: HashMap<MetadataEntry, u32>,
    /// Discriminator -> indexes into `metadata_entries`.
    pub property_metadata: HashMap<String, Vec<u32>>,
    /// Discriminator -> property version.
    pub properties: HashMap<String, PropertyValue>,
    pub extended_data_table_names: BTreeSet<String>,
    /// (family, qualifier, visibility) of hidden markers already resolved.
    resolved_markers: HashSet<(Vec<u8>, Vec<u8>, Vec<u8>)>,
}

impl Default for ElementData {
    fn default() -> Self {
        Self {
            id: String::new(),
            timestamp: i64::MIN,
            visibility: None,
            deleted: false,
            soft_delete_timestamp: i64::MIN,
            hidden_visibilities: Vec::new(),
            soft_deleted_properties: Vec::new(),
            hidden_properties: Vec::new(),
            metadata_entries: Vec::new(),
            metadata_entry_index: HashMap::new(),
            property_metadata: HashMap::new(),
            properties: HashMap::new(),
            extended_data_table_names: BTreeSet::new(),
            resolved_markers: HashSet::new(),
        }
    }
}

impl ElementData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the empty state, keeping allocations.
    pub fn clear(&mut self) {
        self.id.clear();
        self.timestamp = i64::MIN;
        self.visibility = None;
        self.deleted = false;
        self.soft_delete_timestamp = i64::MIN;
        self.hidden_visibilities.clear();
        self.soft_deleted_properties.clear();
        self.hidden_properties.clear();
        self.metadata_entries.clear();
        self.metadata_entry_index.clear();
        self.property_metadata.clear();
        self.properties.clear();
        self.extended_data_table_names.clear();
        self.resolved_markers.clear();
    }

    /// A row yields an element iff a live signal was seen and the element's
    /// own soft delete is older than that signal.
    pub fn has_element(&self) -> bool {
        self.visibility.is_some() && !self.deleted && self.soft_delete_timestamp < self.timestamp
    }

    pub fn is_hidden(&self) -> bool {
        !self.hidden_visibilities.is_empty()
    }

    // -- Ingestion helpers ----------------------------------------------------

    /// Accept a signal if it is newer than any seen so far.
    pub fn accept_signal(&mut self, visibility: &str, timestamp: i64, deleted: bool) -> bool {
        if timestamp <= self.timestamp {
            return false;
        }
        self.timestamp = timestamp;
        self.visibility = Some(visibility.to_string());
        self.deleted = deleted;
        true
    }

    pub fn add_property(&mut self, property: PropertyValue) -> Result<()> {
        let discriminator = qualifier::discriminator(
            &property.name,
            &property.key,
            &property.visibility,
            property.timestamp,
        )?;
        self.properties.insert(discriminator, property);
        Ok(())
    }

    /// Attach metadata to the property identified by `discriminator`,
    /// reusing a structurally equal entry when one exists.
    pub fn add_property_metadata(&mut self, discriminator: String, entry: MetadataEntry) {
        let index = match self.metadata_entry_index.get(&entry) {
            Some(&index) => index,
            None => {
                let index = self.metadata_entries.len() as u32;
                self.metadata_entries.push(entry.clone());
                self.metadata_entry_index.insert(entry, index);
                index
            }
        };
        let indexes = self.property_metadata.entry(discriminator).or_default();
        if !indexes.contains(&index) {
            indexes.push(index);
        }
    }

    pub fn record_soft_delete(&mut self, timestamp: i64) {
        self.soft_delete_timestamp = self.soft_delete_timestamp.max(timestamp);
    }

    pub fn add_hidden_visibility(&mut self, visibility: &str) {
        if !self.hidden_visibilities.iter().any(|v| v == visibility) {
            self.hidden_visibilities.push(visibility.to_string());
        }
    }

    /// Markers are seen newest-first; only the first per column decides.
    /// Returns `true` the first time a column is seen.
    pub fn resolve_marker(&mut self, family: &[u8], qualifier: &[u8], visibility: &[u8]) -> bool {
        self.resolved_markers
            .insert((family.to_vec(), qualifier.to_vec(), visibility.to_vec()))
    }

    // -- Encode-time queries --------------------------------------------------

    pub fn is_property_soft_deleted(&self, property: &PropertyValue) -> bool {
        self.soft_deleted_properties.iter().any(|sd| {
            sd.timestamp >= property.timestamp
                && sd.key == property.key
                && sd.name == property.name
                && sd.visibility == property.visibility
        })
    }

    pub fn property_hidden_visibilities(&self, property: &PropertyValue) -> Vec<&str> {
        self.hidden_properties
            .iter()
            .filter(|h| {
                h.key == property.key && h.name == property.name && h.visibility == property.visibility
            })
            .map(|h| h.hidden_visibility.as_str())
            .collect()
    }

    /// Live properties in encode order: (name, key, visibility, newest first).
    ///
    /// Drops versions older than the element soft delete, versions covered by
    /// a property soft delete, and hidden versions unless `include_hidden`.
    pub fn visible_properties(&self, include_hidden: bool) -> Vec<(&String, &PropertyValue)> {
        let mut out: Vec<(&String, &PropertyValue)> = self
            .properties
            .iter()
            .filter(|(_, p)| p.timestamp >= self.soft_delete_timestamp)
            .filter(|(_, p)| !self.is_property_soft_deleted(p))
            .filter(|(_, p)| include_hidden || self.property_hidden_visibilities(p).is_empty())
            .collect();
        out.sort_by(|(_, a), (_, b)| {
            a.name
                .cmp(&b.name)
                .then_with(|| a.key.cmp(&b.key))
                .then_with(|| a.visibility.cmp(&b.visibility))
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        out
    }
}
