//! Map-wide attributes: start positions, sea level and metadata

use crate::grid::GridCoord;
use crate::{MapError, MapResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of player start positions a map can hold
pub const MAX_START_POSITIONS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapAttributes {
    /// Start positions by player slot; `None` means not placed
    pub start_positions: [Option<GridCoord>; MAX_START_POSITIONS],
    pub sea_level: i32,
    /// Free-form key/value metadata (name, description, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl MapAttributes {
    pub fn new(sea_level: i32) -> Self {
        Self {
            sea_level,
            ..Default::default()
        }
    }

    pub fn start_position(&self, index: usize) -> MapResult<Option<GridCoord>> {
        check_index(index)?;
        Ok(self.start_positions[index])
    }

    /// Place or clear a start position, returning the previous value
    pub fn set_start_position(
        &mut self,
        index: usize,
        location: Option<GridCoord>,
    ) -> MapResult<Option<GridCoord>> {
        check_index(index)?;
        Ok(std::mem::replace(&mut self.start_positions[index], location))
    }

    /// Slots that currently hold a start position
    pub fn placed_start_positions(&self) -> impl Iterator<Item = (usize, GridCoord)> + '_ {
        self.start_positions
            .iter()
            .enumerate()
            .filter_map(|(i, pos)| pos.map(|p| (i, p)))
    }
}

fn check_index(index: usize) -> MapResult {
    if index >= MAX_START_POSITIONS {
        return Err(MapError::StartPositionIndex(index));
    }
    Ok(())
}
