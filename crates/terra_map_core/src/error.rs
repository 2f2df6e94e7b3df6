//! Error types shared by the grids, the document and its operations

use crate::{FeatureId, GridCoord};
use std::fmt;
use thiserror::Error;

/// Which side of a copy/merge a rectangle belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionSide {
    Source,
    Destination,
}

impl fmt::Display for RegionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionSide::Source => write!(f, "source"),
            RegionSide::Destination => write!(f, "destination"),
        }
    }
}

/// Errors raised by grid, document and operation code
///
/// Every variant is raised before any mutation takes place, so a caller
/// receiving one can assume the target is unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// A single cell lies outside the grid
    #[error("cell ({x}, {y}) lies outside the {width}x{height} grid")]
    OutOfBounds {
        x: i64,
        y: i64,
        width: usize,
        height: usize,
    },
    /// A copy or merge rectangle does not fit its grid
    #[error("{side} area overlaps {side} bounds")]
    RegionOutOfBounds { side: RegionSide },
    /// An argument is malformed (e.g. negative dimensions)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A start position was used before being placed
    #[error("start position {0} has not been placed")]
    StartPositionNotPlaced(usize),
    /// Start position indices are limited to `0..MAX_START_POSITIONS`
    #[error("start position index {0} is out of range")]
    StartPositionIndex(usize),
    #[error("no floating tile at index {0}")]
    NoSuchFloatingTile(usize),
    #[error("no feature with id {0}")]
    NoSuchFeature(FeatureId),
    #[error("feature {0} is already placed")]
    DuplicateFeature(FeatureId),
    #[error("cell {0} is already occupied")]
    CellOccupied(GridCoord),
    /// A batch move would overwrite a stationary entry or leave the grid
    #[error("move blocked at {0}")]
    Blocked(GridCoord),
    #[error("expected dimensions {expected_width}x{expected_height}, got {width}x{height}")]
    DimensionMismatch {
        expected_width: usize,
        expected_height: usize,
        width: usize,
        height: usize,
    },
    /// An operation was executed or undone twice in a row
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Result type for grid and document operations
pub type MapResult<T = ()> = Result<T, MapError>;
