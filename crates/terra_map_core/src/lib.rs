//! Core data structures for terrain map editing
//!
//! This crate provides the editable map model and its undo engine:
//! - `DenseGrid` / `SparseGrid` - Coordinate-indexed storage with change events
//! - `MapTile` - Tile graphics plus a heightmap at twice the resolution
//! - `MapDocument` - Base terrain, floating tiles, features, attributes and selection
//! - `Operation` - Reversible, combinable edits
//! - `OperationManager` - Undo/redo stacks with dirty tracking

mod attributes;
mod document;
mod error;
mod events;
mod feature;
mod grid;
mod history;
mod operation;
mod selection;
mod sparse_grid;
mod tile;

pub use attributes::{MapAttributes, MAX_START_POSITIONS};
pub use document::{DocumentEvent, FloatingTilesChange, MapDocument, MergeRecord};
pub use error::{MapError, MapResult, RegionSide};
pub use events::{ListenerId, Listeners};
pub use feature::{FeatureId, FeatureInstance};
pub use grid::{DenseGrid, GridCoord, GridEvent, GridRect};
pub use history::{HistoryEvent, OperationManager, DEFAULT_MAX_UNDO};
pub use operation::Operation;
pub use selection::Selection;
pub use sparse_grid::{SparseGrid, SparseGridAction, SparseGridEvent};
pub use tile::{LocationChanged, MapTile, Positioned, TileRef, HEIGHT_SCALE};
