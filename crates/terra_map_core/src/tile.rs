//! Terrain fragments and positioned wrappers

use crate::events::{ListenerId, Listeners};
use crate::grid::{DenseGrid, GridCoord};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Heightmap cells per tile cell along each axis
pub const HEIGHT_SCALE: usize = 2;

/// Opaque reference to a tile graphic
///
/// The value is a key into an external content-addressed tile cache; the
/// document never looks inside it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileRef(pub u64);

impl fmt::Display for TileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tile#{:016x}", self.0)
    }
}

/// A rectangular terrain fragment: tile graphics plus a heightmap
///
/// By convention the height grid samples at [`HEIGHT_SCALE`] times the tile
/// grid resolution, but nothing in storage forces that.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapTile {
    pub tiles: DenseGrid<TileRef>,
    pub heights: DenseGrid<i32>,
}

impl MapTile {
    /// A blank fragment of `width` x `height` tiles with a flat heightmap
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            tiles: DenseGrid::new(width, height),
            heights: DenseGrid::new(width * HEIGHT_SCALE, height * HEIGHT_SCALE),
        }
    }

    pub fn from_grids(tiles: DenseGrid<TileRef>, heights: DenseGrid<i32>) -> Self {
        Self { tiles, heights }
    }

    /// Width in tiles
    pub fn width(&self) -> usize {
        self.tiles.width()
    }

    /// Height in tiles
    pub fn height(&self) -> usize {
        self.tiles.height()
    }
}

/// Raised when a [`Positioned`] value moves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationChanged {
    pub from: GridCoord,
    pub to: GridCoord,
}

/// An item with a mutable location that announces its moves
#[derive(Debug, Clone, PartialEq)]
pub struct Positioned<T> {
    item: T,
    location: GridCoord,
    listeners: Listeners<LocationChanged>,
}

impl<T> Positioned<T> {
    pub fn new(item: T, location: GridCoord) -> Self {
        Self {
            item,
            location,
            listeners: Listeners::new(),
        }
    }

    pub fn item(&self) -> &T {
        &self.item
    }

    pub fn into_item(self) -> T {
        self.item
    }

    pub fn location(&self) -> GridCoord {
        self.location
    }

    pub fn set_location(&mut self, location: GridCoord) {
        let from = self.location;
        self.location = location;
        self.listeners.emit(&LocationChanged { from, to: location });
    }

    pub fn translate(&mut self, dx: i32, dy: i32) {
        self.set_location(self.location.offset(dx, dy));
    }

    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&LocationChanged) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }
}
