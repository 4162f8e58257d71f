//! Settings of a history scan, parsed from the flat option map.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cell::ElementType;
use crate::error::{CellGraphError, Result};
use crate::history::event::HistoricalEventId;
use crate::options::{self, IteratorOptions};

pub const OPT_ELEMENT_TYPE: &str = "elementType";
pub const OPT_START_TIME: &str = "startTime";
pub const OPT_END_TIME: &str = "endTime";
pub const OPT_SORT_DIRECTION: &str = "sortDirection";
pub const OPT_LIMIT: &str = "limit";
pub const OPT_AFTER: &str = "after";
pub const OPT_INCLUDE_PREVIOUS_PROPERTY_VALUES: &str = "includePreviousPropertyValues";
pub const OPT_INCLUDE_PROPERTY_VALUES: &str = "includePropertyValues";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ascending",
            SortDirection::Descending => "descending",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = CellGraphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ascending" | "asc" => Ok(SortDirection::Ascending),
            "descending" | "desc" => Ok(SortDirection::Descending),
            _ => Err(CellGraphError::UnhandledSortDirection(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalEventsOptions {
    pub element_type: ElementType,
    /// Inclusive lower bound on event timestamps.
    pub start_time: Option<i64>,
    /// Inclusive upper bound on event timestamps.
    pub end_time: Option<i64>,
    pub sort_direction: SortDirection,
    pub limit: Option<usize>,
    /// Resume strictly after (ascending) or before (descending) this id.
    pub after: Option<HistoricalEventId>,
    pub include_previous_property_values: bool,
    pub include_property_values: bool,
}

impl HistoricalEventsOptions {
    pub fn new(element_type: ElementType) -> Self {
        Self {
            element_type,
            start_time: None,
            end_time: None,
            sort_direction: SortDirection::Ascending,
            limit: None,
            after: None,
            include_previous_property_values: false,
            include_property_values: false,
        }
    }

    pub fn from_options(opts: &IteratorOptions) -> Result<Self> {
        let element_type = match options::get_str(opts, OPT_ELEMENT_TYPE) {
            Some(raw) => raw.parse()?,
            None => {
                return Err(CellGraphError::UnhandledElementType(format!(
                    "missing {}",
                    OPT_ELEMENT_TYPE
                )))
            }
        };
        let sort_direction = match options::get_str(opts, OPT_SORT_DIRECTION) {
            Some(raw) => raw.parse()?,
            None => SortDirection::Ascending,
        };
        let after = match options::get_str(opts, OPT_AFTER) {
            Some(raw) => Some(
                raw.parse()
                    .map_err(|e: CellGraphError| CellGraphError::invalid_option(OPT_AFTER, e.to_string()))?,
            ),
            None => None,
        };
        Ok(Self {
            element_type,
            start_time: options::get(opts, OPT_START_TIME)?,
            end_time: options::get(opts, OPT_END_TIME)?,
            sort_direction,
            limit: options::get(opts, OPT_LIMIT)?,
            after,
            include_previous_property_values: options::get_bool(opts, OPT_INCLUDE_PREVIOUS_PROPERTY_VALUES)?,
            include_property_values: options::get_bool(opts, OPT_INCLUDE_PROPERTY_VALUES)?,
        })
    }

    pub fn to_options(&self, opts: &mut IteratorOptions) -> Result<()> {
        options::put(opts, OPT_ELEMENT_TYPE, &self.element_type)?;
        if let Some(start) = self.start_time {
            options::put(opts, OPT_START_TIME, &start)?;
        }
        if let Some(end) = self.end_time {
            options::put(opts, OPT_END_TIME, &end)?;
        }
        options::put(opts, OPT_SORT_DIRECTION, &self.sort_direction)?;
        if let Some(limit) = self.limit {
            options::put(opts, OPT_LIMIT, &limit)?;
        }
        if let Some(after) = self.after {
            options::put(opts, OPT_AFTER, &after.to_string())?;
        }
        options::put(opts, OPT_INCLUDE_PREVIOUS_PROPERTY_VALUES, &self.include_previous_property_values)?;
        options::put(opts, OPT_INCLUDE_PROPERTY_VALUES, &self.include_property_values)?;
        Ok(())
    }
}
