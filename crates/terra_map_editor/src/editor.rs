//! The editing session
//!
//! [`MapEditor`] owns a [`MapDocument`] and its [`OperationManager`] and turns
//! user gestures (selecting, dragging, dropping, deleting, pasting, saving)
//! into operations. It implements two protocols on top of the core:
//!
//! - every selection change starts by deselecting and merging the selected
//!   floating tile, so at most one floating edit is live at a time
//! - continuous gestures (drags, the sea level slider) coalesce into one undo
//!   step until the gesture is flushed

use crate::config::EditorConfig;
use crate::error::EditorResult;
use crate::services::{
    ClipboardItem, DialogService, DiscardChoice, FeatureCatalog, JobOutcome, MapWriter,
};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use terra_map_core::{
    DenseGrid, FeatureId, FeatureInstance, GridCoord, GridRect, MapAttributes, MapDocument,
    MapError, MapTile, Operation, OperationManager, Positioned, Selection,
};

#[cfg_attr(feature = "bevy", derive(bevy::prelude::Resource))]
#[derive(Debug)]
pub struct MapEditor {
    document: MapDocument,
    history: OperationManager,
    config: EditorConfig,
    translation_open: bool,
    sea_level_open: bool,
    /// Pointer movement not yet consumed by a quantized drag step, in pixels
    delta_x: i32,
    delta_y: i32,
    /// Top-left of the visible area, in pixels
    viewport_location: GridCoord,
    file_path: Option<PathBuf>,
    read_only: bool,
}

impl Default for MapEditor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl MapEditor {
    /// A session on a blank map sized from `config`
    pub fn new(config: EditorConfig) -> Self {
        let document = blank_document(&config, config.new_map_width, config.new_map_height);
        Self {
            document,
            history: OperationManager::new(config.max_undo),
            config,
            translation_open: false,
            sea_level_open: false,
            delta_x: 0,
            delta_y: 0,
            viewport_location: GridCoord::new(0, 0),
            file_path: None,
            read_only: false,
        }
    }

    pub fn document(&self) -> &MapDocument {
        &self.document
    }

    /// Mutable access for subscribing to document events; edits still go
    /// through the session
    pub fn document_mut(&mut self) -> &mut MapDocument {
        &mut self.document
    }

    pub fn history(&self) -> &OperationManager {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut OperationManager {
        &mut self.history
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn is_dirty(&self) -> bool {
        self.history.is_dirty()
    }

    pub fn viewport_location(&self) -> GridCoord {
        self.viewport_location
    }

    pub fn set_viewport_location(&mut self, x: i32, y: i32) {
        self.viewport_location = GridCoord::new(x, y);
    }

    /// Start over on a blank `width` x `height` map
    pub fn new_map(&mut self, width: usize, height: usize) {
        let document = blank_document(&self.config, width, height);
        self.replace_document(document, None, false);
        info!("Created new {}x{} map", width, height);
    }

    /// Start editing a loaded document
    pub fn open_document(&mut self, document: MapDocument, path: PathBuf, read_only: bool) {
        info!("Opened map {:?}", path);
        self.replace_document(document, Some(path), read_only);
    }

    fn replace_document(&mut self, document: MapDocument, path: Option<PathBuf>, read_only: bool) {
        self.document = document;
        self.history.clear();
        self.file_path = path;
        self.read_only = read_only;
        self.flush_translation();
        self.flush_sea_level();
    }

    pub fn undo(&mut self) -> EditorResult {
        self.flush_translation();
        self.flush_sea_level();
        Ok(self.history.undo(&mut self.document)?)
    }

    pub fn redo(&mut self) -> EditorResult {
        self.flush_translation();
        self.flush_sea_level();
        Ok(self.history.redo(&mut self.document)?)
    }

    // Selection

    pub fn select_tile(&mut self, index: usize) -> EditorResult {
        let index = match self.document.selected_tile() {
            Some(selected) if selected == index => return Ok(()),
            // merging the selected tile shifts everything above it down
            Some(selected) if selected < index => index - 1,
            _ => index,
        };
        self.execute_after_deselect(vec![Operation::select_tile(index)])
    }

    pub fn select_feature(&mut self, id: FeatureId) -> EditorResult {
        self.execute_after_deselect(vec![Operation::select_feature(id)])
    }

    /// Replace the selection with a group of features
    pub fn select_features(&mut self, ids: &[FeatureId]) -> EditorResult {
        if ids.is_empty() {
            return self.clear_selection();
        }
        let operations = ids.iter().copied().map(Operation::select_feature).collect();
        self.execute_after_deselect(operations)
    }

    pub fn select_start_position(&mut self, index: usize) -> EditorResult {
        self.execute_after_deselect(vec![Operation::select_start_position(index)])
    }

    pub fn clear_selection(&mut self) -> EditorResult {
        if self.document.selection().is_empty() {
            return Ok(());
        }
        self.flush_translation();
        let operation = Operation::deselect_and_merge(&self.document);
        self.execute(operation)
    }

    /// Remove whatever is selected: features, the floating tile, or the start
    /// position
    pub fn delete_selection(&mut self) -> EditorResult {
        let mut operations = vec![Operation::deselect()];
        match self.document.selection() {
            Selection::None => return Ok(()),
            Selection::Features(ids) => {
                operations.extend(ids.iter().copied().map(Operation::remove_feature));
            }
            Selection::Tile(index) => operations.push(Operation::remove_floating_tile(*index)),
            Selection::StartPosition(index) => {
                operations.push(Operation::set_start_position(*index, None));
            }
        }
        self.flush_translation();
        self.execute(Operation::Composite(operations))
    }

    /// Copy a base region (in tiles) into a new floating tile and select it
    pub fn lift_and_select_area(&mut self, x: i32, y: i32, width: i32, height: i32) -> EditorResult {
        let index = self.next_floating_index();
        self.execute_after_deselect(vec![
            Operation::lift_area(GridRect::new(x, y, width, height)),
            Operation::select_tile(index),
        ])
    }

    // Drops and pastes; coordinates are in pixels

    /// Drop a terrain fragment with its top-left under the pointer
    pub fn drag_drop_tile(&mut self, tile: MapTile, x: i32, y: i32) -> EditorResult {
        let size = self.config.tile_pixels();
        self.add_and_select_tile(tile, x / size, y / size)
    }

    /// Paste a terrain fragment centred on the pointer
    pub fn paste_tile(&mut self, tile: MapTile, x: i32, y: i32) -> EditorResult {
        let size = self.config.tile_pixels();
        let x = x / size - tile.width() as i32 / 2;
        let y = y / size - tile.height() as i32 / 2;
        self.add_and_select_tile(tile, x, y)
    }

    /// Place a new feature of type `name` under the pointer and select it
    ///
    /// Returns false, changing nothing, when the type is unknown, the spot is
    /// outside the map or already taken, or the footprint does not fit.
    pub fn drag_drop_feature(
        &mut self,
        catalog: &dyn FeatureCatalog,
        name: &str,
        x: i32,
        y: i32,
    ) -> EditorResult<bool> {
        let Some((width, height)) = catalog.footprint(name) else {
            warn!("Unknown feature type '{}'", name);
            return Ok(false);
        };
        let Some(location) = self.screen_to_feature_cell(x, y) else {
            return Ok(false);
        };
        if self.document.has_feature_at(location.x, location.y) {
            debug!("Feature drop at {} rejected: cell occupied", location);
            return Ok(false);
        }
        let footprint = GridRect::new(location.x, location.y, width as i32, height as i32);
        let bounds = GridRect::new(
            0,
            0,
            self.document.feature_grid_width() as i32,
            self.document.feature_grid_height() as i32,
        );
        if footprint.intersect(&bounds) != Some(footprint) {
            debug!("Feature drop at {} rejected: footprint leaves the map", location);
            return Ok(false);
        }

        let instance = FeatureInstance::new(name, location);
        let id = instance.id;
        self.execute_after_deselect(vec![
            Operation::add_feature(instance),
            Operation::select_feature(id),
        ])?;
        Ok(true)
    }

    /// Place start position `index` at a pixel location and select it
    pub fn drag_drop_start_position(&mut self, index: usize, x: i32, y: i32) -> EditorResult {
        self.execute_after_deselect(vec![
            Operation::set_start_position(index, Some(GridCoord::new(x, y))),
            Operation::select_start_position(index),
        ])?;
        self.translation_open = false;
        Ok(())
    }

    // Dragging

    /// Move the selection by a pointer delta in pixels
    ///
    /// Start positions move by the raw delta. Floating tiles and features
    /// accumulate the delta and move in whole cells. Consecutive calls
    /// coalesce into one undo step until [`flush_translation`](Self::flush_translation).
    /// Returns false when a feature move was blocked.
    pub fn translate_selection(&mut self, dx: i32, dy: i32) -> EditorResult<bool> {
        match self.document.selection().clone() {
            Selection::None => Ok(true),
            Selection::StartPosition(index) => {
                self.translate_start_position(index, dx, dy)?;
                Ok(true)
            }
            Selection::Tile(index) => {
                let size = self.config.tile_pixels();
                self.delta_x = self.delta_x.saturating_add(dx);
                self.delta_y = self.delta_y.saturating_add(dy);
                self.translate_tile(index, self.delta_x / size, self.delta_y / size)?;
                self.delta_x %= size;
                self.delta_y %= size;
                Ok(true)
            }
            Selection::Features(ids) => {
                let size = self.config.feature_cell_size();
                self.delta_x = self.delta_x.saturating_add(dx);
                self.delta_y = self.delta_y.saturating_add(dy);
                let ids: Vec<FeatureId> = ids.into_iter().collect();
                let moved = self.translate_features(ids, self.delta_x / size, self.delta_y / size)?;
                if moved {
                    self.delta_x %= size;
                    self.delta_y %= size;
                }
                Ok(moved)
            }
        }
    }

    /// End the current drag gesture
    pub fn flush_translation(&mut self) {
        self.translation_open = false;
        self.delta_x = 0;
        self.delta_y = 0;
    }

    fn translate_start_position(&mut self, index: usize, dx: i32, dy: i32) -> EditorResult {
        let current = self
            .document
            .start_position(index)?
            .ok_or(MapError::StartPositionNotPlaced(index))?;
        let operation = Operation::set_start_position(index, Some(current.offset(dx, dy)));
        self.execute_coalesced(operation, self.translation_open)?;
        self.translation_open = true;
        Ok(())
    }

    fn translate_tile(&mut self, index: usize, dx: i32, dy: i32) -> EditorResult {
        let (dx, dy) = self.document.clamp_tile_translation(index, dx, dy)?;
        if dx == 0 && dy == 0 {
            return Ok(());
        }
        self.execute_coalesced(Operation::move_tile(index, dx, dy), self.translation_open)?;
        self.translation_open = true;
        Ok(())
    }

    fn translate_features(&mut self, ids: Vec<FeatureId>, dx: i32, dy: i32) -> EditorResult<bool> {
        if dx == 0 && dy == 0 {
            return Ok(true);
        }
        if !self.document.can_translate_features(&ids, dx, dy) {
            warn!("Feature move by ({}, {}) blocked", dx, dy);
            return Ok(false);
        }
        self.execute_coalesced(Operation::move_features(ids, dx, dy), self.translation_open)?;
        self.translation_open = true;
        Ok(true)
    }

    // Attributes

    /// Move the sea level slider; one undo step per slider gesture
    pub fn set_sea_level(&mut self, level: i32) -> EditorResult {
        if self.document.sea_level() == level {
            return Ok(());
        }
        self.execute_coalesced(Operation::set_sea_level(level), self.sea_level_open)?;
        self.sea_level_open = true;
        Ok(())
    }

    /// End the current sea level gesture
    pub fn flush_sea_level(&mut self) {
        self.sea_level_open = false;
    }

    pub fn update_attributes(&mut self, attributes: MapAttributes) -> EditorResult {
        if *self.document.attributes() == attributes {
            return Ok(());
        }
        self.execute(Operation::set_attributes(attributes))
    }

    /// Let the user edit the map attributes in a dialog
    pub fn open_map_attributes(&mut self, dialogs: &mut dyn DialogService) -> EditorResult {
        match dialogs.ask_map_attributes(self.document.attributes()) {
            Some(attributes) => self.update_attributes(attributes),
            None => Ok(()),
        }
    }

    /// Swap in a new heightmap of exactly the current dimensions
    pub fn replace_heightmap(&mut self, heights: DenseGrid<i32>) -> EditorResult {
        let current = &self.document.base().heights;
        if heights.width() != current.width() || heights.height() != current.height() {
            return Err(MapError::DimensionMismatch {
                expected_width: current.width(),
                expected_height: current.height(),
                width: heights.width(),
                height: heights.height(),
            }
            .into());
        }
        self.execute(Operation::replace_heights(heights))
    }

    // Clipboard

    /// Whether the selection is a floating tile or a feature
    pub fn can_copy(&self) -> bool {
        match self.document.selection() {
            Selection::Tile(_) => true,
            Selection::Features(ids) => !ids.is_empty(),
            _ => false,
        }
    }

    pub fn can_cut(&self) -> bool {
        self.can_copy()
    }

    /// Snapshot the selection; `None` when there is nothing to copy
    pub fn copy_selection(&self) -> Option<ClipboardItem> {
        match self.document.selection() {
            Selection::Features(ids) => {
                let id = ids.iter().next()?;
                let feature = self.document.feature(*id)?;
                Some(ClipboardItem::Feature {
                    type_name: feature.type_name.clone(),
                })
            }
            Selection::Tile(index) => {
                let tile = self.document.floating_tile(*index).ok()?;
                Some(ClipboardItem::Tile(tile.item().clone()))
            }
            _ => None,
        }
    }

    /// Copy the selection, then delete it
    pub fn cut_selection(&mut self) -> EditorResult<Option<ClipboardItem>> {
        let Some(item) = self.copy_selection() else {
            return Ok(None);
        };
        self.delete_selection()?;
        Ok(Some(item))
    }

    /// Paste a clipboard item at a pixel location
    pub fn paste(
        &mut self,
        item: &ClipboardItem,
        catalog: &dyn FeatureCatalog,
        x: i32,
        y: i32,
    ) -> EditorResult {
        match item {
            ClipboardItem::Tile(tile) => self.paste_tile(tile.clone(), x, y),
            ClipboardItem::Feature { type_name } => {
                self.drag_drop_feature(catalog, type_name, x, y)?;
                Ok(())
            }
        }
    }

    // Persistence

    /// Save to the current path, asking for one if there is none or the file
    /// is read-only. Returns false if the user cancelled.
    pub fn save(
        &mut self,
        writer: &mut dyn MapWriter,
        dialogs: &mut dyn DialogService,
    ) -> EditorResult<bool> {
        let path = match &self.file_path {
            Some(path) if !self.read_only => path.clone(),
            _ => match dialogs.ask_save_path() {
                Some(path) => path,
                None => return Ok(false),
            },
        };
        self.save_as(writer, &path)?;
        Ok(true)
    }

    /// Write a flattened snapshot to `path`
    ///
    /// Floating tiles are merged for the write and restored afterwards; the
    /// merge does not enter the history.
    pub fn save_as(&mut self, writer: &mut dyn MapWriter, path: &Path) -> EditorResult {
        let mut flatten = Operation::flatten(&self.document);
        flatten.execute(&mut self.document)?;
        let written = writer.write(&self.document, path);
        flatten.undo(&mut self.document)?;
        written?;

        self.history.set_now_as_mark();
        self.file_path = Some(path.to_path_buf());
        self.read_only = false;
        info!("Saved map to {:?}", path);
        Ok(())
    }

    /// Whether unsaved changes may be dropped, saving first if the user asks
    pub fn check_okay_discard(
        &mut self,
        writer: &mut dyn MapWriter,
        dialogs: &mut dyn DialogService,
    ) -> EditorResult<bool> {
        if !self.is_dirty() {
            return Ok(true);
        }
        match dialogs.ask_discard_changes() {
            DiscardChoice::Save => self.save(writer, dialogs),
            DiscardChoice::Discard => Ok(true),
            DiscardChoice::Cancel => Ok(false),
        }
    }

    /// Apply the result of a background section import
    ///
    /// A completed import lands at the top-left of the viewport and is
    /// selected. Returns true if the document changed.
    pub fn finish_section_import(
        &mut self,
        outcome: JobOutcome<MapTile>,
        dialogs: &mut dyn DialogService,
    ) -> EditorResult<bool> {
        match outcome {
            JobOutcome::Completed(tile) => {
                let size = self.config.tile_pixels();
                let x = self.viewport_location.x / size;
                let y = self.viewport_location.y / size;
                self.add_and_select_tile(tile, x, y)?;
                Ok(true)
            }
            JobOutcome::Cancelled => {
                debug!("Section import cancelled");
                Ok(false)
            }
            JobOutcome::Failed(message) => {
                warn!("Section import failed: {}", message);
                dialogs.show_error(&format!(
                    "There was a problem importing the section: {}",
                    message
                ));
                Ok(false)
            }
        }
    }

    // Helpers

    fn add_and_select_tile(&mut self, tile: MapTile, x: i32, y: i32) -> EditorResult {
        let index = self.next_floating_index();
        self.execute_after_deselect(vec![
            Operation::add_floating_tile(index, Positioned::new(tile, GridCoord::new(x, y))),
            Operation::select_tile(index),
        ])
    }

    /// Index a tile appended after deselect-and-merge will get
    fn next_floating_index(&self) -> usize {
        let len = self.document.floating_tiles().len();
        match self.document.selected_tile() {
            Some(_) => len - 1,
            None => len,
        }
    }

    fn screen_to_feature_cell(&self, x: i32, y: i32) -> Option<GridCoord> {
        if x < 0 || y < 0 {
            return None;
        }
        let size = self.config.feature_cell_size();
        let cell = GridCoord::new(x / size, y / size);
        let in_grid = (cell.x as usize) < self.document.feature_grid_width()
            && (cell.y as usize) < self.document.feature_grid_height();
        in_grid.then_some(cell)
    }

    fn execute_after_deselect(&mut self, operations: Vec<Operation>) -> EditorResult {
        let mut all = Vec::with_capacity(operations.len() + 1);
        all.push(Operation::deselect_and_merge(&self.document));
        all.extend(operations);
        self.execute(Operation::Composite(all))
    }

    fn execute(&mut self, operation: Operation) -> EditorResult {
        Ok(self.history.execute(operation, &mut self.document)?)
    }

    /// Execute `operation`, folding it into the previous undo step when a
    /// gesture is open and both edit the same target
    fn execute_coalesced(&mut self, mut operation: Operation, session_open: bool) -> EditorResult {
        let combined = if session_open {
            self.history
                .peek_undo()
                .and_then(|top| top.combine(&operation))
        } else {
            None
        };

        match combined {
            Some(combined) => {
                operation.execute(&mut self.document)?;
                self.history.replace(combined);
                Ok(())
            }
            None => self.execute(operation),
        }
    }
}

fn blank_document(config: &EditorConfig, width: usize, height: usize) -> MapDocument {
    MapDocument::from_base(
        MapTile::new(width, height),
        MapAttributes::new(config.default_sea_level),
    )
}
