//! Cell order for history replay.
//!
//! One logical mutation is written as several cells sharing a timestamp
//! (creating an edge writes both endpoints and the signal). Replay sorts a
//! row by ascending timestamp and breaks ties so that the reconstructor sees
//! those cells in a causally consistent order:
//!
//! 1. edge endpoint references (`VOUT`, `VIN`)
//! 2. the element signal
//! 3. properties by (name, key, visibility), each followed by its metadata
//! 4. everything else
//!
//! The sort is stable, so cells that compare equal keep their scan order.

use std::cmp::Ordering;

use crate::cell::{Cell, ColumnFamily};
use crate::codec::qualifier;
use crate::error::Result;

const RANK_ENDPOINT: u8 = 0;
const RANK_SIGNAL: u8 = 1;
const RANK_PROPERTY: u8 = 2;
const RANK_OTHER: u8 = 3;

#[derive(Debug, PartialEq, Eq)]
struct ReplayKey {
    timestamp: i64,
    rank: u8,
    /// (name, key, visibility) of the owning property.
    property: Option<(String, String, String)>,
    /// Metadata sorts after its property.
    is_metadata: bool,
}

impl Ord for ReplayKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.rank.cmp(&other.rank))
            .then_with(|| self.property.cmp(&other.property))
            .then_with(|| self.is_metadata.cmp(&other.is_metadata))
    }
}

impl PartialOrd for ReplayKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn replay_key(cell: &Cell) -> Result<ReplayKey> {
    let timestamp = cell.timestamp();
    let key = match cell.family() {
        ColumnFamily::OutVertexRef | ColumnFamily::InVertexRef => ReplayKey {
            timestamp,
            rank: RANK_ENDPOINT,
            property: None,
            is_metadata: false,
        },
        ColumnFamily::Signal(_) => ReplayKey {
            timestamp,
            rank: RANK_SIGNAL,
            property: None,
            is_metadata: false,
        },
        ColumnFamily::Property => {
            let parts = qualifier::split(cell.qualifier_str()?, 2)?;
            ReplayKey {
                timestamp,
                rank: RANK_PROPERTY,
                property: Some((
                    parts[0].to_string(),
                    parts[1].to_string(),
                    cell.visibility_str()?.to_string(),
                )),
                is_metadata: false,
            }
        }
        ColumnFamily::PropertyMetadata => {
            let parts = qualifier::split(cell.qualifier_str()?, 4)?;
            ReplayKey {
                timestamp,
                rank: RANK_PROPERTY,
                property: Some((parts[0].to_string(), parts[1].to_string(), parts[2].to_string())),
                is_metadata: true,
            }
        }
        _ => ReplayKey {
            timestamp,
            rank: RANK_OTHER,
            property: None,
            is_metadata: false,
        },
    };
    Ok(key)
}

/// Reorder one row's cells for replay. Fails on a malformed property or
/// metadata qualifier.
pub fn history_order(cells: Vec<Cell>) -> Result<Vec<Cell>> {
    let mut keyed = cells
        .into_iter()
        .map(|cell| Ok((replay_key(&cell)?, cell)))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(keyed.into_iter().map(|(_, cell)| cell).collect())
}
