//! Fetch hints: which categories of element data are ingested and emitted.
//!
//! Unset name/key/label sets mean "no restriction"; the matching
//! `include_all_*` flag then decides. Property names and metadata keys that
//! are not wanted are dropped while the row is ingested, not at encode time.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::options::{self, IteratorOptions};

pub const OPT_INCLUDE_ALL_PROPERTIES: &str = "includeAllProperties";
pub const OPT_PROPERTY_NAMES_TO_INCLUDE: &str = "propertyNamesToInclude";
pub const OPT_INCLUDE_ALL_PROPERTY_METADATA: &str = "includeAllPropertyMetadata";
pub const OPT_METADATA_KEYS_TO_INCLUDE: &str = "metadataKeysToInclude";
pub const OPT_INCLUDE_HIDDEN: &str = "includeHidden";
pub const OPT_INCLUDE_ALL_EDGE_REFS: &str = "includeAllEdgeRefs";
pub const OPT_INCLUDE_OUT_EDGE_REFS: &str = "includeOutEdgeRefs";
pub const OPT_INCLUDE_IN_EDGE_REFS: &str = "includeInEdgeRefs";
pub const OPT_EDGE_LABELS_OF_EDGE_REFS_TO_INCLUDE: &str = "edgeLabelsOfEdgeRefsToInclude";
pub const OPT_INCLUDE_EDGE_LABELS_AND_COUNTS: &str = "includeEdgeLabelsAndCounts";
pub const OPT_INCLUDE_EXTENDED_DATA_TABLE_NAMES: &str = "includeExtendedDataTableNames";

/// Direction of an edge reference seen from a vertex row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Out,
    In,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchHints {
    pub include_all_properties: bool,
    pub property_names_to_include: Option<BTreeSet<String>>,
    pub include_all_property_metadata: bool,
    pub metadata_keys_to_include: Option<BTreeSet<String>>,
    pub include_hidden: bool,
    pub include_all_edge_refs: bool,
    pub include_out_edge_refs: bool,
    pub include_in_edge_refs: bool,
    pub edge_labels_of_edge_refs_to_include: Option<BTreeSet<String>>,
    pub include_edge_labels_and_counts: bool,
    pub include_extended_data_table_names: bool,
}

impl FetchHints {
    /// Everything except hidden data.
    pub fn all() -> Self {
        Self {
            include_all_properties: true,
            include_all_property_metadata: true,
            include_all_edge_refs: true,
            include_extended_data_table_names: true,
            ..Self::default()
        }
    }

    /// Everything, hidden data included.
    pub fn all_including_hidden() -> Self {
        Self {
            include_hidden: true,
            ..Self::all()
        }
    }

    /// Only the element's own signal (id, visibility, timestamp).
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_options(opts: &IteratorOptions) -> Result<Self> {
        Ok(Self {
            include_all_properties: options::get_bool(opts, OPT_INCLUDE_ALL_PROPERTIES)?,
            property_names_to_include: options::get(opts, OPT_PROPERTY_NAMES_TO_INCLUDE)?,
            include_all_property_metadata: options::get_bool(opts, OPT_INCLUDE_ALL_PROPERTY_METADATA)?,
            metadata_keys_to_include: options::get(opts, OPT_METADATA_KEYS_TO_INCLUDE)?,
            include_hidden: options::get_bool(opts, OPT_INCLUDE_HIDDEN)?,
            include_all_edge_refs: options::get_bool(opts, OPT_INCLUDE_ALL_EDGE_REFS)?,
            include_out_edge_refs: options::get_bool(opts, OPT_INCLUDE_OUT_EDGE_REFS)?,
            include_in_edge_refs: options::get_bool(opts, OPT_INCLUDE_IN_EDGE_REFS)?,
            edge_labels_of_edge_refs_to_include: options::get(
                opts,
                OPT_EDGE_LABELS_OF_EDGE_REFS_TO_INCLUDE,
            )?,
            include_edge_labels_and_counts: options::get_bool(
                opts,
                OPT_INCLUDE_EDGE_LABELS_AND_COUNTS,
            )?,
            include_extended_data_table_names: options::get_bool(
                opts,
                OPT_INCLUDE_EXTENDED_DATA_TABLE_NAMES,
            )?,
        })
    }

    /// Write these hints into an option map (inverse of `from_options`).
    pub fn to_options(&self, opts: &mut IteratorOptions) -> Result<()> {
        options::put(opts, OPT_INCLUDE_ALL_PROPERTIES, &self.include_all_properties)?;
        if let Some(names) = &self.property_names_to_include {
            options::put(opts, OPT_PROPERTY_NAMES_TO_INCLUDE, names)?;
        }
        options::put(opts, OPT_INCLUDE_ALL_PROPERTY_METADATA, &self.include_all_property_metadata)?;
        if let Some(keys) = &self.metadata_keys_to_include {
            options::put(opts, OPT_METADATA_KEYS_TO_INCLUDE, keys)?;
        }
        options::put(opts, OPT_INCLUDE_HIDDEN, &self.include_hidden)?;
        options::put(opts, OPT_INCLUDE_ALL_EDGE_REFS, &self.include_all_edge_refs)?;
        options::put(opts, OPT_INCLUDE_OUT_EDGE_REFS, &self.include_out_edge_refs)?;
        options::put(opts, OPT_INCLUDE_IN_EDGE_REFS, &self.include_in_edge_refs)?;
        if let Some(labels) = &self.edge_labels_of_edge_refs_to_include {
            options::put(opts, OPT_EDGE_LABELS_OF_EDGE_REFS_TO_INCLUDE, labels)?;
        }
        options::put(opts, OPT_INCLUDE_EDGE_LABELS_AND_COUNTS, &self.include_edge_labels_and_counts)?;
        options::put(
            opts,
            OPT_INCLUDE_EXTENDED_DATA_TABLE_NAMES,
            &self.include_extended_data_table_names,
        )?;
        Ok(())
    }

    // -- Queries --------------------------------------------------------------

    pub fn include_property(&self, name: &str) -> bool {
        self.include_all_properties
            || self
                .property_names_to_include
                .as_ref()
                .map_or(false, |names| names.contains(name))
    }

    pub fn include_any_properties(&self) -> bool {
        self.include_all_properties
            || self
                .property_names_to_include
                .as_ref()
                .map_or(false, |names| !names.is_empty())
    }

    pub fn include_metadata(&self, metadata_key: &str) -> bool {
        self.include_all_property_metadata
            || self
                .metadata_keys_to_include
                .as_ref()
                .map_or(false, |keys| keys.contains(metadata_key))
    }

    /// Full `{edge_id -> EdgeInfo}` tables are emitted for `direction`.
    pub fn include_edge_refs(&self, direction: Direction) -> bool {
        self.include_all_edge_refs
            || match direction {
                Direction::Out => self.include_out_edge_refs,
                Direction::In => self.include_in_edge_refs,
            }
    }

    /// Edge references for `direction` are ingested at all (full or counted).
    pub fn ingest_edge_refs(&self, direction: Direction) -> bool {
        self.include_edge_refs(direction) || self.include_edge_labels_and_counts
    }

    pub fn include_edge_label(&self, label: &str) -> bool {
        self.edge_labels_of_edge_refs_to_include
            .as_ref()
            .map_or(true, |labels| labels.contains(label))
    }
}
