//! The editable map document
//!
//! A [`MapDocument`] owns the base terrain, the floating tiles stacked on top
//! of it, the feature grid, the map attributes and the current selection.
//! Everything can be read freely; mutation goes through
//! [`Operation`](crate::Operation)s so that every change is undoable.

use crate::events::{ListenerId, Listeners};
use crate::grid::{DenseGrid, GridCoord, GridEvent, GridRect};
use crate::sparse_grid::{SparseGrid, SparseGridEvent};
use crate::tile::{LocationChanged, MapTile, Positioned, TileRef, HEIGHT_SCALE};
use crate::{FeatureId, FeatureInstance, MapAttributes, MapError, MapResult, Selection};
use std::collections::{HashMap, HashSet};

/// How the floating tile sequence changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatingTilesChange {
    Inserted(usize),
    Removed(usize),
    Moved(usize),
}

/// Document-level property notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    SelectionChanged,
    FloatingTilesChanged(FloatingTilesChange),
    StartPositionChanged(usize),
    SeaLevelChanged(i32),
    AttributesChanged,
}

/// Base-grid content overwritten by a merge, kept so the merge can be undone
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRecord {
    index: usize,
    tile: Positioned<MapTile>,
    tiles_backup: Option<(GridCoord, DenseGrid<TileRef>)>,
    heights_backup: Option<(GridCoord, DenseGrid<i32>)>,
}

impl MergeRecord {
    /// Floating tile index the merged tile occupied
    pub fn index(&self) -> usize {
        self.index
    }
}

#[cfg_attr(feature = "bevy", derive(bevy::prelude::Resource))]
#[derive(Debug, Clone, PartialEq)]
pub struct MapDocument {
    base: MapTile,
    floating_tiles: Vec<Positioned<MapTile>>,
    features: SparseGrid<FeatureInstance>,
    feature_locations: HashMap<FeatureId, GridCoord>,
    attributes: MapAttributes,
    selection: Selection,
    listeners: Listeners<DocumentEvent>,
}

impl MapDocument {
    /// A blank map of `width` x `height` tiles
    pub fn new(width: usize, height: usize) -> Self {
        Self::from_base(MapTile::new(width, height), MapAttributes::default())
    }

    /// Wrap loaded terrain; the feature grid matches the heightmap resolution
    pub fn from_base(base: MapTile, attributes: MapAttributes) -> Self {
        let features = SparseGrid::new(base.heights.width(), base.heights.height());
        Self {
            base,
            floating_tiles: Vec::new(),
            features,
            feature_locations: HashMap::new(),
            attributes,
            selection: Selection::None,
            listeners: Listeners::new(),
        }
    }

    /// Wrap loaded terrain together with its placed features
    pub fn with_features(
        base: MapTile,
        attributes: MapAttributes,
        features: impl IntoIterator<Item = FeatureInstance>,
    ) -> MapResult<Self> {
        let mut document = Self::from_base(base, attributes);
        for feature in features {
            document.add_feature(feature)?;
        }
        Ok(document)
    }

    pub fn base(&self) -> &MapTile {
        &self.base
    }

    /// Map width in tiles
    pub fn map_width(&self) -> usize {
        self.base.width()
    }

    /// Map height in tiles
    pub fn map_height(&self) -> usize {
        self.base.height()
    }

    pub fn feature_grid_width(&self) -> usize {
        self.features.width()
    }

    pub fn feature_grid_height(&self) -> usize {
        self.features.height()
    }

    /// Floating tiles in z-order (index 0 is drawn first)
    pub fn floating_tiles(&self) -> &[Positioned<MapTile>] {
        &self.floating_tiles
    }

    pub fn floating_tile(&self, index: usize) -> MapResult<&Positioned<MapTile>> {
        self.floating_tiles
            .get(index)
            .ok_or(MapError::NoSuchFloatingTile(index))
    }

    pub fn features(&self) -> &SparseGrid<FeatureInstance> {
        &self.features
    }

    pub fn feature(&self, id: FeatureId) -> Option<&FeatureInstance> {
        let location = self.feature_locations.get(&id)?;
        self.features.try_get(location.x, location.y)
    }

    pub fn feature_at(&self, x: i32, y: i32) -> Option<&FeatureInstance> {
        self.features.try_get(x, y)
    }

    pub fn has_feature_at(&self, x: i32, y: i32) -> bool {
        self.features.has(x, y)
    }

    pub fn attributes(&self) -> &MapAttributes {
        &self.attributes
    }

    pub fn sea_level(&self) -> i32 {
        self.attributes.sea_level
    }

    pub fn start_position(&self, index: usize) -> MapResult<Option<GridCoord>> {
        self.attributes.start_position(index)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selected_tile(&self) -> Option<usize> {
        self.selection.selected_tile()
    }

    pub fn selected_start_position(&self) -> Option<usize> {
        self.selection.selected_start_position()
    }

    pub fn selected_features(&self) -> Vec<FeatureId> {
        self.selection.selected_features().collect()
    }

    /// Whether moving `ids` by `(dx, dy)` keeps every feature on the grid
    /// without landing on a feature outside the batch. A repeated id counts once.
    pub fn can_translate_features(&self, ids: &[FeatureId], dx: i32, dy: i32) -> bool {
        if dx == 0 && dy == 0 {
            return true;
        }

        let mut current = HashSet::with_capacity(ids.len());
        for id in ids {
            match self.feature_locations.get(id) {
                Some(location) => {
                    current.insert(*location);
                }
                None => return false,
            }
        }

        current.iter().all(|location| {
            let target = location.offset(dx, dy);
            self.features.in_bounds(target)
                && (current.contains(&target) || !self.features.has(target.x, target.y))
        })
    }

    /// Shrink a floating-tile move so the tile keeps at least one row and one
    /// column over the base grid
    pub fn clamp_tile_translation(&self, index: usize, dx: i32, dy: i32) -> MapResult<(i32, i32)> {
        let tile = self.floating_tile(index)?;
        let location = tile.location();
        let (x, y) = (i64::from(location.x), i64::from(location.y));
        let (width, height) = (tile.item().width() as i64, tile.item().height() as i64);
        let (map_width, map_height) = (self.map_width() as i64, self.map_height() as i64);
        let (mut dx, mut dy) = (i64::from(dx), i64::from(dy));

        if x + width + dx <= 0 {
            dx = -x - (width - 1);
        }
        if y + height + dy <= 0 {
            dy = -y - (height - 1);
        }
        if x + dx >= map_width {
            dx = map_width - x - 1;
        }
        if y + dy >= map_height {
            dy = map_height - y - 1;
        }
        Ok((saturate_i32(dx), saturate_i32(dy)))
    }

    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&DocumentEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Observe writes to the base tile graphics
    pub fn subscribe_tile_grid(
        &mut self,
        callback: impl FnMut(&GridEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.base.tiles.subscribe(callback)
    }

    pub fn unsubscribe_tile_grid(&mut self, id: ListenerId) -> bool {
        self.base.tiles.unsubscribe(id)
    }

    /// Observe writes to the base heightmap
    pub fn subscribe_height_grid(
        &mut self,
        callback: impl FnMut(&GridEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.base.heights.subscribe(callback)
    }

    pub fn unsubscribe_height_grid(&mut self, id: ListenerId) -> bool {
        self.base.heights.unsubscribe(id)
    }

    /// Observe feature placement, removal and moves
    pub fn subscribe_features(
        &mut self,
        callback: impl FnMut(&SparseGridEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.features.subscribe(callback)
    }

    pub fn unsubscribe_features(&mut self, id: ListenerId) -> bool {
        self.features.unsubscribe(id)
    }

    /// Observe the location of one floating tile
    pub fn subscribe_floating_tile(
        &mut self,
        index: usize,
        callback: impl FnMut(&LocationChanged) + Send + Sync + 'static,
    ) -> MapResult<ListenerId> {
        let tile = self
            .floating_tiles
            .get_mut(index)
            .ok_or(MapError::NoSuchFloatingTile(index))?;
        Ok(tile.subscribe(callback))
    }

    // Mutation primitives, reachable only through operations

    pub(crate) fn set_selection(&mut self, selection: Selection) -> Selection {
        let previous = std::mem::replace(&mut self.selection, selection);
        if previous != self.selection {
            self.listeners.emit(&DocumentEvent::SelectionChanged);
        }
        previous
    }

    pub(crate) fn insert_floating_tile(
        &mut self,
        index: usize,
        tile: Positioned<MapTile>,
    ) -> MapResult {
        if index > self.floating_tiles.len() {
            return Err(MapError::NoSuchFloatingTile(index));
        }
        self.floating_tiles.insert(index, tile);
        self.listeners
            .emit(&DocumentEvent::FloatingTilesChanged(FloatingTilesChange::Inserted(index)));
        Ok(())
    }

    pub(crate) fn remove_floating_tile(&mut self, index: usize) -> MapResult<Positioned<MapTile>> {
        if index >= self.floating_tiles.len() {
            return Err(MapError::NoSuchFloatingTile(index));
        }
        let tile = self.floating_tiles.remove(index);
        self.listeners
            .emit(&DocumentEvent::FloatingTilesChanged(FloatingTilesChange::Removed(index)));
        Ok(tile)
    }

    pub(crate) fn translate_floating_tile(&mut self, index: usize, dx: i32, dy: i32) -> MapResult {
        let tile = self
            .floating_tiles
            .get_mut(index)
            .ok_or(MapError::NoSuchFloatingTile(index))?;
        tile.translate(dx, dy);
        self.listeners
            .emit(&DocumentEvent::FloatingTilesChanged(FloatingTilesChange::Moved(index)));
        Ok(())
    }

    /// Commit a floating tile into the base grids and drop it from the
    /// floating sequence. Parts hanging off the map are discarded.
    pub(crate) fn merge_floating_tile(&mut self, index: usize) -> MapResult<MergeRecord> {
        let floating = self
            .floating_tiles
            .get(index)
            .ok_or(MapError::NoSuchFloatingTile(index))?;
        let location = floating.location();
        let height_location = GridCoord::new(
            location.x * HEIGHT_SCALE as i32,
            location.y * HEIGHT_SCALE as i32,
        );

        let tiles_backup = paste_clipped(&mut self.base.tiles, &floating.item().tiles, location)?;
        let heights_backup = match paste_clipped(
            &mut self.base.heights,
            &floating.item().heights,
            height_location,
        ) {
            Ok(backup) => backup,
            Err(e) => {
                if let Some((at, backup)) = &tiles_backup {
                    self.base.tiles.copy_from(backup, at.x, at.y)?;
                }
                return Err(e);
            }
        };

        let tile = self.remove_floating_tile(index)?;
        Ok(MergeRecord {
            index,
            tile,
            tiles_backup,
            heights_backup,
        })
    }

    /// Reverse [`merge_floating_tile`](Self::merge_floating_tile)
    pub(crate) fn unmerge_floating_tile(&mut self, record: MergeRecord) -> MapResult {
        if record.index > self.floating_tiles.len() {
            return Err(MapError::NoSuchFloatingTile(record.index));
        }
        if let Some((at, backup)) = &record.heights_backup {
            self.base.heights.copy_from(backup, at.x, at.y)?;
        }
        if let Some((at, backup)) = &record.tiles_backup {
            self.base.tiles.copy_from(backup, at.x, at.y)?;
        }
        self.insert_floating_tile(record.index, record.tile)
    }

    /// Copy the part of `area` that lies on the map into a new floating tile
    pub(crate) fn lift_area(&self, area: GridRect) -> MapResult<Positioned<MapTile>> {
        if area.width < 0 || area.height < 0 {
            return Err(MapError::InvalidArgument(
                "lift area has negative dimensions".to_string(),
            ));
        }
        let bounds = GridRect::new(0, 0, self.map_width() as i32, self.map_height() as i32);
        let clipped = area.intersect(&bounds).ok_or_else(|| {
            MapError::InvalidArgument("lift area lies outside the map".to_string())
        })?;

        let scale = HEIGHT_SCALE as i32;
        let tiles = self
            .base
            .tiles
            .region(clipped.x, clipped.y, clipped.width, clipped.height)?;
        let heights = self.base.heights.region(
            clipped.x * scale,
            clipped.y * scale,
            clipped.width * scale,
            clipped.height * scale,
        )?;

        Ok(Positioned::new(
            MapTile::from_grids(tiles, heights),
            GridCoord::new(clipped.x, clipped.y),
        ))
    }

    pub(crate) fn add_feature(&mut self, feature: FeatureInstance) -> MapResult {
        let location = feature.location;
        if !self.features.in_bounds(location) {
            return Err(MapError::OutOfBounds {
                x: location.x as i64,
                y: location.y as i64,
                width: self.features.width(),
                height: self.features.height(),
            });
        }
        if self.feature_locations.contains_key(&feature.id) {
            return Err(MapError::DuplicateFeature(feature.id));
        }
        if self.features.has(location.x, location.y) {
            return Err(MapError::CellOccupied(location));
        }

        self.feature_locations.insert(feature.id, location);
        self.features.set(location.x, location.y, feature);
        Ok(())
    }

    pub(crate) fn remove_feature(&mut self, id: FeatureId) -> MapResult<FeatureInstance> {
        let location = self
            .feature_locations
            .remove(&id)
            .ok_or(MapError::NoSuchFeature(id))?;
        self.features
            .take(location.x, location.y)
            .ok_or(MapError::NoSuchFeature(id))
    }

    /// Move a batch of features; a repeated id moves once
    pub(crate) fn translate_features(&mut self, ids: &[FeatureId], dx: i32, dy: i32) -> MapResult {
        let mut seen = HashSet::with_capacity(ids.len());
        let ids: Vec<FeatureId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let coords = ids
            .iter()
            .map(|id| {
                self.feature_locations
                    .get(id)
                    .copied()
                    .ok_or(MapError::NoSuchFeature(*id))
            })
            .collect::<MapResult<Vec<_>>>()?;

        self.features.translate_entries(&coords, dx, dy)?;

        for id in &ids {
            if let Some(location) = self.feature_locations.get_mut(id) {
                *location = location.offset(dx, dy);
                if let Some(feature) = self.features.value_mut(*location) {
                    feature.location = *location;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn set_start_position(
        &mut self,
        index: usize,
        location: Option<GridCoord>,
    ) -> MapResult<Option<GridCoord>> {
        let previous = self.attributes.set_start_position(index, location)?;
        self.listeners.emit(&DocumentEvent::StartPositionChanged(index));
        Ok(previous)
    }

    pub(crate) fn set_sea_level(&mut self, level: i32) -> i32 {
        let previous = std::mem::replace(&mut self.attributes.sea_level, level);
        if previous != level {
            self.listeners.emit(&DocumentEvent::SeaLevelChanged(level));
        }
        previous
    }

    pub(crate) fn set_attributes(&mut self, attributes: MapAttributes) -> MapAttributes {
        let previous = std::mem::replace(&mut self.attributes, attributes);

        for index in 0..previous.start_positions.len() {
            if previous.start_positions[index] != self.attributes.start_positions[index] {
                self.listeners.emit(&DocumentEvent::StartPositionChanged(index));
            }
        }
        if previous.sea_level != self.attributes.sea_level {
            self.listeners
                .emit(&DocumentEvent::SeaLevelChanged(self.attributes.sea_level));
        }
        self.listeners.emit(&DocumentEvent::AttributesChanged);
        previous
    }

    /// Copy a heightmap area into the base, returning the overwritten cells
    pub(crate) fn copy_heights(
        &mut self,
        source: &DenseGrid<i32>,
        src_x: i32,
        src_y: i32,
        dst_x: i32,
        dst_y: i32,
        width: i32,
        height: i32,
    ) -> MapResult<DenseGrid<i32>> {
        let backup = self.base.heights.region(dst_x, dst_y, width, height)?;
        self.base
            .heights
            .copy_region(source, src_x, src_y, dst_x, dst_y, width, height)?;
        Ok(backup)
    }

    pub(crate) fn restore_heights(&mut self, backup: &DenseGrid<i32>, x: i32, y: i32) -> MapResult {
        self.base.heights.copy_from(backup, x, y)
    }
}

/// Paste `src` at `at`, clipped to `dst`; returns what was overwritten
fn paste_clipped<T: Clone>(
    dst: &mut DenseGrid<T>,
    src: &DenseGrid<T>,
    at: GridCoord,
) -> MapResult<Option<(GridCoord, DenseGrid<T>)>> {
    let target = GridRect::new(at.x, at.y, src.width() as i32, src.height() as i32);
    let bounds = GridRect::new(0, 0, dst.width() as i32, dst.height() as i32);
    let Some(overlap) = target.intersect(&bounds) else {
        return Ok(None);
    };

    let backup = dst.region(overlap.x, overlap.y, overlap.width, overlap.height)?;
    dst.copy_region(
        src,
        overlap.x - at.x,
        overlap.y - at.y,
        overlap.x,
        overlap.y,
        overlap.width,
        overlap.height,
    )?;
    Ok(Some((GridCoord::new(overlap.x, overlap.y), backup)))
}

fn saturate_i32(value: i64) -> i32 {
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
