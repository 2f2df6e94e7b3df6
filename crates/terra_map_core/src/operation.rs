//! Reversible edits applied to a [`MapDocument`]
//!
//! Every change to a document is expressed as an [`Operation`]. An operation
//! caches whatever it overwrote during [`execute`](Operation::execute) so that
//! [`undo`](Operation::undo) restores the previous state exactly. Consecutive
//! edits of the same kind on the same target (a drag, a slider) can be
//! coalesced into a single undo step with [`combine`](Operation::combine).

use crate::document::{MapDocument, MergeRecord};
use crate::grid::{DenseGrid, GridCoord, GridRect};
use crate::tile::{MapTile, Positioned};
use crate::{FeatureId, FeatureInstance, MapAttributes, MapError, MapResult, Selection};
use log::warn;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Select the floating tile at `index`
    SelectTile {
        index: usize,
        previous: Option<Selection>,
    },
    /// Add a feature to the current feature selection
    SelectFeature {
        id: FeatureId,
        previous: Option<Selection>,
    },
    SelectStartPosition {
        index: usize,
        previous: Option<Selection>,
    },
    Deselect {
        previous: Option<Selection>,
    },
    /// Insert a floating tile at `index` in the floating sequence
    AddFloatingTile {
        index: usize,
        tile: Box<Positioned<MapTile>>,
    },
    RemoveFloatingTile {
        index: usize,
        removed: Option<Box<Positioned<MapTile>>>,
    },
    /// Commit a floating tile into the base grids
    MergeFloatingTile {
        index: usize,
        record: Option<Box<MergeRecord>>,
    },
    /// Copy a base region into a new floating tile on top of the stack
    LiftArea {
        area: GridRect,
        index: Option<usize>,
    },
    MoveTile {
        index: usize,
        dx: i32,
        dy: i32,
    },
    AddFeature {
        instance: FeatureInstance,
    },
    RemoveFeature {
        id: FeatureId,
        removed: Option<FeatureInstance>,
    },
    /// Move a batch of features; rejected as a whole when any is blocked
    MoveFeatures {
        ids: Vec<FeatureId>,
        dx: i32,
        dy: i32,
    },
    /// Place (`Some`) or clear (`None`) a start position
    SetStartPosition {
        index: usize,
        location: Option<GridCoord>,
        previous: Option<Option<GridCoord>>,
    },
    SetSeaLevel {
        level: i32,
        previous: Option<i32>,
    },
    SetAttributes {
        attributes: Box<MapAttributes>,
        previous: Option<Box<MapAttributes>>,
    },
    /// Copy `area` of `source` into the base heightmap at `destination`
    CopyHeights {
        source: Box<DenseGrid<i32>>,
        area: GridRect,
        destination: GridCoord,
        backup: Option<Box<DenseGrid<i32>>>,
    },
    /// Sub-operations executed in order and undone in reverse
    Composite(Vec<Operation>),
}

impl Operation {
    pub fn select_tile(index: usize) -> Self {
        Self::SelectTile {
            index,
            previous: None,
        }
    }

    pub fn select_feature(id: FeatureId) -> Self {
        Self::SelectFeature { id, previous: None }
    }

    pub fn select_start_position(index: usize) -> Self {
        Self::SelectStartPosition {
            index,
            previous: None,
        }
    }

    pub fn deselect() -> Self {
        Self::Deselect { previous: None }
    }

    pub fn add_floating_tile(index: usize, tile: Positioned<MapTile>) -> Self {
        Self::AddFloatingTile {
            index,
            tile: Box::new(tile),
        }
    }

    pub fn remove_floating_tile(index: usize) -> Self {
        Self::RemoveFloatingTile {
            index,
            removed: None,
        }
    }

    /// Merge the floating tile at `index` into the base grids
    pub fn merge_floating_tile(index: usize) -> Self {
        Self::MergeFloatingTile {
            index,
            record: None,
        }
    }

    pub fn lift_area(area: GridRect) -> Self {
        Self::LiftArea { area, index: None }
    }

    pub fn move_tile(index: usize, dx: i32, dy: i32) -> Self {
        Self::MoveTile { index, dx, dy }
    }

    pub fn add_feature(instance: FeatureInstance) -> Self {
        Self::AddFeature { instance }
    }

    pub fn remove_feature(id: FeatureId) -> Self {
        Self::RemoveFeature { id, removed: None }
    }

    pub fn move_features(ids: Vec<FeatureId>, dx: i32, dy: i32) -> Self {
        Self::MoveFeatures { ids, dx, dy }
    }

    pub fn set_start_position(index: usize, location: Option<GridCoord>) -> Self {
        Self::SetStartPosition {
            index,
            location,
            previous: None,
        }
    }

    pub fn set_sea_level(level: i32) -> Self {
        Self::SetSeaLevel {
            level,
            previous: None,
        }
    }

    pub fn set_attributes(attributes: MapAttributes) -> Self {
        Self::SetAttributes {
            attributes: Box::new(attributes),
            previous: None,
        }
    }

    /// Replace the whole base heightmap with `heights`
    pub fn replace_heights(heights: DenseGrid<i32>) -> Self {
        let area = GridRect::new(0, 0, heights.width() as i32, heights.height() as i32);
        Self::CopyHeights {
            source: Box::new(heights),
            area,
            destination: GridCoord::new(0, 0),
            backup: None,
        }
    }

    pub fn copy_heights(source: DenseGrid<i32>, area: GridRect, destination: GridCoord) -> Self {
        Self::CopyHeights {
            source: Box::new(source),
            area,
            destination,
            backup: None,
        }
    }

    /// Clear the selection, first merging a selected floating tile into the
    /// base. Every selection change starts with this step so that at most one
    /// floating edit is live at a time.
    pub fn deselect_and_merge(document: &MapDocument) -> Self {
        match document.selected_tile() {
            Some(index) => {
                Self::Composite(vec![Self::deselect(), Self::merge_floating_tile(index)])
            }
            None => Self::deselect(),
        }
    }

    /// Merge every floating tile into the base, bottom-most first
    pub fn flatten(document: &MapDocument) -> Self {
        let mut operations = vec![Self::deselect()];
        operations.extend(
            (0..document.floating_tiles().len()).map(|_| Self::merge_floating_tile(0)),
        );
        Self::Composite(operations)
    }

    /// Short human-readable label for undo/redo menus
    pub fn description(&self) -> &'static str {
        match self {
            Self::SelectTile { .. } => "Select tile",
            Self::SelectFeature { .. } => "Select feature",
            Self::SelectStartPosition { .. } => "Select start position",
            Self::Deselect { .. } => "Deselect",
            Self::AddFloatingTile { .. } => "Add tile",
            Self::RemoveFloatingTile { .. } => "Remove tile",
            Self::MergeFloatingTile { .. } => "Merge tile",
            Self::LiftArea { .. } => "Lift area",
            Self::MoveTile { .. } => "Move tile",
            Self::AddFeature { .. } => "Add feature",
            Self::RemoveFeature { .. } => "Remove feature",
            Self::MoveFeatures { .. } => "Move features",
            Self::SetStartPosition { .. } => "Set start position",
            Self::SetSeaLevel { .. } => "Set sea level",
            Self::SetAttributes { .. } => "Edit map attributes",
            Self::CopyHeights { .. } => "Replace heightmap",
            Self::Composite(operations) => operations
                .last()
                .map(Operation::description)
                .unwrap_or("Edit"),
        }
    }

    /// Apply the edit, remembering what it overwrote
    ///
    /// On error the document is left as it was before the call.
    pub fn execute(&mut self, document: &mut MapDocument) -> MapResult {
        match self {
            Self::SelectTile { index, previous } => {
                document.floating_tile(*index)?;
                *previous = Some(document.set_selection(Selection::Tile(*index)));
            }
            Self::SelectFeature { id, previous } => {
                if document.feature(*id).is_none() {
                    return Err(MapError::NoSuchFeature(*id));
                }
                let selection = document.selection().with_feature(*id);
                *previous = Some(document.set_selection(selection));
            }
            Self::SelectStartPosition { index, previous } => {
                document.start_position(*index)?;
                *previous = Some(document.set_selection(Selection::StartPosition(*index)));
            }
            Self::Deselect { previous } => {
                *previous = Some(document.set_selection(Selection::None));
            }
            Self::AddFloatingTile { index, tile } => {
                document.insert_floating_tile(*index, tile.as_ref().clone())?;
            }
            Self::RemoveFloatingTile { index, removed } => {
                *removed = Some(Box::new(document.remove_floating_tile(*index)?));
            }
            Self::MergeFloatingTile { index, record } => {
                *record = Some(Box::new(document.merge_floating_tile(*index)?));
            }
            Self::LiftArea { area, index } => {
                let lifted = document.lift_area(*area)?;
                let at = document.floating_tiles().len();
                document.insert_floating_tile(at, lifted)?;
                *index = Some(at);
            }
            Self::MoveTile { index, dx, dy } => {
                document.translate_floating_tile(*index, *dx, *dy)?;
            }
            Self::AddFeature { instance } => {
                document.add_feature(instance.clone())?;
            }
            Self::RemoveFeature { id, removed } => {
                *removed = Some(document.remove_feature(*id)?);
            }
            Self::MoveFeatures { ids, dx, dy } => {
                document.translate_features(ids, *dx, *dy)?;
            }
            Self::SetStartPosition {
                index,
                location,
                previous,
            } => {
                *previous = Some(document.set_start_position(*index, *location)?);
            }
            Self::SetSeaLevel { level, previous } => {
                *previous = Some(document.set_sea_level(*level));
            }
            Self::SetAttributes {
                attributes,
                previous,
            } => {
                *previous = Some(Box::new(
                    document.set_attributes(attributes.as_ref().clone()),
                ));
            }
            Self::CopyHeights {
                source,
                area,
                destination,
                backup,
            } => {
                let overwritten = document.copy_heights(
                    source,
                    area.x,
                    area.y,
                    destination.x,
                    destination.y,
                    area.width,
                    area.height,
                )?;
                *backup = Some(Box::new(overwritten));
            }
            Self::Composite(operations) => {
                for done in 0..operations.len() {
                    if let Err(e) = operations[done].execute(document) {
                        for operation in operations[..done].iter_mut().rev() {
                            if let Err(rollback) = operation.undo(document) {
                                warn!(
                                    "Failed to roll back '{}': {}",
                                    operation.description(),
                                    rollback
                                );
                            }
                        }
                        return Err(e);
                    }
                }
            }
        }
        Ok(())
    }

    /// Restore the state from before the last [`execute`](Self::execute)
    ///
    /// A composite whose child fails to undo re-applies the children it had
    /// already undone, leaving the document as it was before the call.
    pub fn undo(&mut self, document: &mut MapDocument) -> MapResult {
        match self {
            Self::SelectTile { previous, .. }
            | Self::SelectFeature { previous, .. }
            | Self::SelectStartPosition { previous, .. }
            | Self::Deselect { previous } => {
                let selection = previous.take().ok_or_else(not_executed)?;
                document.set_selection(selection);
            }
            Self::AddFloatingTile { index, .. } => {
                document.remove_floating_tile(*index)?;
            }
            Self::RemoveFloatingTile { index, removed } => {
                let tile = removed.take().ok_or_else(not_executed)?;
                document.insert_floating_tile(*index, *tile)?;
            }
            Self::MergeFloatingTile { record, .. } => {
                let merged = record.take().ok_or_else(not_executed)?;
                document.unmerge_floating_tile(*merged)?;
            }
            Self::LiftArea { index, .. } => {
                let at = index.take().ok_or_else(not_executed)?;
                document.remove_floating_tile(at)?;
            }
            Self::MoveTile { index, dx, dy } => {
                document.translate_floating_tile(
                    *index,
                    dx.saturating_neg(),
                    dy.saturating_neg(),
                )?;
            }
            Self::AddFeature { instance } => {
                document.remove_feature(instance.id)?;
            }
            Self::RemoveFeature { removed, .. } => {
                let instance = removed.take().ok_or_else(not_executed)?;
                document.add_feature(instance)?;
            }
            Self::MoveFeatures { ids, dx, dy } => {
                document.translate_features(ids, dx.saturating_neg(), dy.saturating_neg())?;
            }
            Self::SetStartPosition {
                index, previous, ..
            } => {
                let location = previous.ok_or_else(not_executed)?;
                document.set_start_position(*index, location)?;
            }
            Self::SetSeaLevel { previous, .. } => {
                let level = previous.ok_or_else(not_executed)?;
                document.set_sea_level(level);
            }
            Self::SetAttributes { previous, .. } => {
                let attributes = previous.take().ok_or_else(not_executed)?;
                document.set_attributes(*attributes);
            }
            Self::CopyHeights {
                destination,
                backup,
                ..
            } => {
                let overwritten = backup.take().ok_or_else(not_executed)?;
                document.restore_heights(&overwritten, destination.x, destination.y)?;
            }
            Self::Composite(operations) => {
                for pending in (0..operations.len()).rev() {
                    if let Err(e) = operations[pending].undo(document) {
                        warn!(
                            "Failed to undo '{}': {}",
                            operations[pending].description(),
                            e
                        );
                        for operation in operations[pending + 1..].iter_mut() {
                            if let Err(reapply) = operation.execute(document) {
                                warn!(
                                    "Failed to re-apply '{}': {}",
                                    operation.description(),
                                    reapply
                                );
                            }
                        }
                        return Err(e);
                    }
                }
            }
        }
        Ok(())
    }

    /// Fold `next` into this operation when both edit the same target
    ///
    /// The result behaves as `self` followed by `next`: its undo restores the
    /// state from before `self`, so `self` must already be executed.
    pub fn combine(&self, next: &Operation) -> Option<Operation> {
        match (self, next) {
            (
                Self::MoveTile { index, dx, dy },
                Self::MoveTile {
                    index: next_index,
                    dx: next_dx,
                    dy: next_dy,
                },
            ) if index == next_index => Some(Self::MoveTile {
                index: *index,
                dx: dx.saturating_add(*next_dx),
                dy: dy.saturating_add(*next_dy),
            }),
            (
                Self::MoveFeatures { ids, dx, dy },
                Self::MoveFeatures {
                    ids: next_ids,
                    dx: next_dx,
                    dy: next_dy,
                },
            ) if same_features(ids, next_ids) => Some(Self::MoveFeatures {
                ids: ids.clone(),
                dx: dx.saturating_add(*next_dx),
                dy: dy.saturating_add(*next_dy),
            }),
            (
                Self::SetStartPosition {
                    index, previous, ..
                },
                Self::SetStartPosition {
                    index: next_index,
                    location,
                    ..
                },
            ) if index == next_index => Some(Self::SetStartPosition {
                index: *index,
                location: *location,
                previous: *previous,
            }),
            (Self::SetSeaLevel { previous, .. }, Self::SetSeaLevel { level, .. }) => {
                Some(Self::SetSeaLevel {
                    level: *level,
                    previous: *previous,
                })
            }
            _ => None,
        }
    }
}

fn same_features(a: &[FeatureId], b: &[FeatureId]) -> bool {
    a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}

fn not_executed() -> MapError {
    MapError::InvalidState("operation undone before it was executed".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::TileRef;

    fn document_with_tile() -> MapDocument {
        let mut doc = MapDocument::new(6, 6);
        let mut fragment = MapTile::new(2, 2);
        fragment.tiles.fill(TileRef(3));
        fragment.heights.fill(12);
        Operation::add_floating_tile(0, Positioned::new(fragment, GridCoord::new(1, 1)))
            .execute(&mut doc)
            .unwrap();
        doc
    }

    fn check_roundtrip(doc: &mut MapDocument, mut operation: Operation) {
        let before = doc.clone();
        operation.execute(doc).unwrap();
        assert_ne!(*doc, before, "{} changed nothing", operation.description());
        operation.undo(doc).unwrap();
        assert_eq!(*doc, before, "{} did not undo", operation.description());
    }

    #[test]
    fn test_execute_undo_restores_document() {
        let mut doc = document_with_tile();
        let tree = FeatureInstance::new("tree", GridCoord::new(2, 2));
        let tree_id = tree.id;
        Operation::add_feature(tree).execute(&mut doc).unwrap();
        Operation::set_start_position(0, Some(GridCoord::new(4, 4)))
            .execute(&mut doc)
            .unwrap();

        check_roundtrip(&mut doc, Operation::select_tile(0));
        check_roundtrip(&mut doc, Operation::select_feature(tree_id));
        check_roundtrip(&mut doc, Operation::select_start_position(0));
        check_roundtrip(&mut doc, Operation::merge_floating_tile(0));
        check_roundtrip(&mut doc, Operation::remove_floating_tile(0));
        check_roundtrip(&mut doc, Operation::lift_area(GridRect::new(0, 0, 3, 3)));
        check_roundtrip(&mut doc, Operation::move_tile(0, 2, -1));
        check_roundtrip(&mut doc, Operation::remove_feature(tree_id));
        check_roundtrip(&mut doc, Operation::move_features(vec![tree_id], 1, 1));
        check_roundtrip(&mut doc, Operation::set_start_position(0, None));
        check_roundtrip(&mut doc, Operation::set_sea_level(40));
        check_roundtrip(&mut doc, Operation::set_attributes(MapAttributes::new(7)));
        check_roundtrip(&mut doc, Operation::replace_heights(DenseGrid::filled(12, 12, 5)));
        let flatten = Operation::flatten(&doc);
        check_roundtrip(&mut doc, flatten);
    }

    #[test]
    fn test_undo_restores_selection() {
        let mut doc = document_with_tile();
        Operation::select_tile(0).execute(&mut doc).unwrap();
        let before = doc.clone();

        let mut op = Operation::deselect_and_merge(&doc);
        op.execute(&mut doc).unwrap();
        assert!(doc.floating_tiles().is_empty());
        assert_eq!(doc.selection(), &Selection::None);

        op.undo(&mut doc).unwrap();
        assert_eq!(doc, before);
        assert_eq!(doc.selected_tile(), Some(0));
    }

    #[test]
    fn test_combined_tile_moves_undo_together() {
        let mut doc = document_with_tile();
        let before = doc.clone();

        let mut first = Operation::move_tile(0, 1, 0);
        first.execute(&mut doc).unwrap();
        let mut second = Operation::move_tile(0, 0, 2);
        second.execute(&mut doc).unwrap();

        let mut combined = first.combine(&second).unwrap();
        assert_eq!(combined, Operation::move_tile(0, 1, 2));
        assert_eq!(doc.floating_tiles()[0].location(), GridCoord::new(2, 3));

        combined.undo(&mut doc).unwrap();
        assert_eq!(doc, before);
    }

    #[test]
    fn test_combine_requires_same_target() {
        let a = FeatureId::new();
        let b = FeatureId::new();

        assert!(Operation::move_tile(0, 1, 1)
            .combine(&Operation::move_tile(1, 1, 1))
            .is_none());
        assert!(Operation::move_features(vec![a, b], 1, 0)
            .combine(&Operation::move_features(vec![b, a], 1, 0))
            .is_some());
        assert!(Operation::move_features(vec![a], 1, 0)
            .combine(&Operation::move_features(vec![a, b], 1, 0))
            .is_none());
        assert!(Operation::set_sea_level(1)
            .combine(&Operation::move_tile(0, 1, 1))
            .is_none());
        assert!(Operation::deselect()
            .combine(&Operation::deselect())
            .is_none());
    }

    #[test]
    fn test_combined_sea_level_keeps_first_previous() {
        let mut doc = MapDocument::new(2, 2);
        let mut first = Operation::set_sea_level(10);
        first.execute(&mut doc).unwrap();
        let mut second = Operation::set_sea_level(20);
        second.execute(&mut doc).unwrap();

        let mut combined = first.combine(&second).unwrap();
        assert_eq!(doc.sea_level(), 20);
        combined.undo(&mut doc).unwrap();
        assert_eq!(doc.sea_level(), 0);
    }

    #[test]
    fn test_failed_composite_rolls_back() {
        let mut doc = document_with_tile();
        let before = doc.clone();

        let mut op = Operation::Composite(vec![
            Operation::select_tile(0),
            Operation::set_sea_level(9),
            Operation::remove_floating_tile(5),
        ]);
        assert_eq!(op.execute(&mut doc), Err(MapError::NoSuchFloatingTile(5)));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_failed_composite_undo_reapplies_undone_children() {
        let mut doc = MapDocument::new(4, 4);
        let tree = FeatureInstance::new("tree", GridCoord::new(1, 1));
        let id = tree.id;
        let mut op = Operation::Composite(vec![
            Operation::add_feature(tree),
            Operation::set_sea_level(9),
        ]);
        op.execute(&mut doc).unwrap();
        doc.remove_feature(id).unwrap();
        let before = doc.clone();

        assert_eq!(op.undo(&mut doc), Err(MapError::NoSuchFeature(id)));
        assert_eq!(doc.sea_level(), 9);
        assert_eq!(doc, before);
    }

    #[test]
    fn test_repeated_feature_id_moves_once() {
        let mut doc = MapDocument::new(4, 4);
        let tree = FeatureInstance::new("tree", GridCoord::new(1, 1));
        let id = tree.id;
        Operation::add_feature(tree).execute(&mut doc).unwrap();

        let mut op = Operation::move_features(vec![id, id], 1, 0);
        op.execute(&mut doc).unwrap();
        assert_eq!(doc.feature(id).map(|f| f.location), Some(GridCoord::new(2, 1)));
        assert_eq!(doc.feature_at(2, 1).map(|f| f.id), Some(id));

        op.undo(&mut doc).unwrap();
        assert_eq!(doc.feature(id).map(|f| f.location), Some(GridCoord::new(1, 1)));
        assert!(!doc.has_feature_at(2, 1));
    }

    #[test]
    fn test_combined_moves_saturate() {
        let first = Operation::MoveTile {
            index: 0,
            dx: i32::MAX,
            dy: i32::MIN,
        };
        let second = Operation::MoveTile {
            index: 0,
            dx: 1,
            dy: -1,
        };
        match first.combine(&second) {
            Some(Operation::MoveTile { dx, dy, .. }) => {
                assert_eq!((dx, dy), (i32::MAX, i32::MIN));
            }
            other => panic!("unexpected combination: {other:?}"),
        }
    }

    #[test]
    fn test_blocked_move_is_rejected() {
        let mut doc = MapDocument::new(2, 2);
        let a = FeatureInstance::new("tree", GridCoord::new(0, 0));
        let b = FeatureInstance::new("rock", GridCoord::new(1, 0));
        let a_id = a.id;
        Operation::add_feature(a).execute(&mut doc).unwrap();
        Operation::add_feature(b).execute(&mut doc).unwrap();
        let before = doc.clone();

        let mut op = Operation::move_features(vec![a_id], 1, 0);
        assert_eq!(
            op.execute(&mut doc),
            Err(MapError::Blocked(GridCoord::new(1, 0)))
        );
        assert_eq!(doc, before);
    }

    #[test]
    fn test_flatten_merges_in_z_order() {
        let mut doc = MapDocument::new(4, 4);
        for (i, tile) in [1u64, 2].into_iter().enumerate() {
            let mut fragment = MapTile::new(2, 2);
            fragment.tiles.fill(TileRef(tile));
            Operation::add_floating_tile(i, Positioned::new(fragment, GridCoord::new(i as i32, 0)))
                .execute(&mut doc)
                .unwrap();
        }
        Operation::select_tile(1).execute(&mut doc).unwrap();

        let mut flatten = Operation::flatten(&doc);
        flatten.execute(&mut doc).unwrap();

        assert!(doc.floating_tiles().is_empty());
        assert_eq!(doc.selection(), &Selection::None);
        assert_eq!(*doc.base().tiles.get(0, 0).unwrap(), TileRef(1));
        // the upper tile wins where they overlap
        assert_eq!(*doc.base().tiles.get(1, 0).unwrap(), TileRef(2));
        assert_eq!(*doc.base().tiles.get(2, 1).unwrap(), TileRef(2));
    }

    #[test]
    fn test_undo_before_execute_is_invalid_state() {
        let mut doc = MapDocument::new(1, 1);
        assert!(matches!(
            Operation::set_sea_level(3).undo(&mut doc),
            Err(MapError::InvalidState(_))
        ));
    }
}
