//! Sparse coordinate-keyed grids with batched change events

use crate::events::{ListenerId, Listeners};
use crate::grid::{check_dimensions, check_region, GridCoord, GridRect};
use crate::{MapError, MapResult, RegionSide};
use std::collections::{HashMap, HashSet};

/// Kind of change carried by a [`SparseGridEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SparseGridAction {
    Set,
    Remove,
    Move,
}

/// One batched notification per logical sparse-grid operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SparseGridEvent {
    /// Entries were inserted or overwritten at these coordinates
    Set(Vec<GridCoord>),
    /// Entries at these coordinates were removed
    Removed(Vec<GridCoord>),
    /// Entries moved from the first to the second coordinate of each pair
    Moved(Vec<(GridCoord, GridCoord)>),
}

impl SparseGridEvent {
    pub fn action(&self) -> SparseGridAction {
        match self {
            SparseGridEvent::Set(_) => SparseGridAction::Set,
            SparseGridEvent::Removed(_) => SparseGridAction::Remove,
            SparseGridEvent::Moved(_) => SparseGridAction::Move,
        }
    }

    /// Every coordinate whose content is stale after this event
    pub fn coordinates(&self) -> Vec<GridCoord> {
        match self {
            SparseGridEvent::Set(coords) | SparseGridEvent::Removed(coords) => coords.clone(),
            SparseGridEvent::Moved(moves) => moves
                .iter()
                .flat_map(|(from, to)| [*from, *to])
                .collect(),
        }
    }
}

/// A mapping from cell coordinates to values; unoccupied cells are absent
///
/// `width` and `height` only bound merge and batch-move destinations; single
/// `set` calls are not range-checked.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseGrid<T> {
    width: usize,
    height: usize,
    entries: HashMap<GridCoord, T>,
    listeners: Listeners<SparseGridEvent>,
}

impl<T> SparseGrid<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            entries: HashMap::new(),
            listeners: Listeners::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether `coord` lies within the logical bounds
    pub fn in_bounds(&self, coord: GridCoord) -> bool {
        GridRect::new(0, 0, self.width as i32, self.height as i32).contains(coord)
    }

    pub fn has(&self, x: i32, y: i32) -> bool {
        self.entries.contains_key(&GridCoord::new(x, y))
    }

    pub fn try_get(&self, x: i32, y: i32) -> Option<&T> {
        self.entries.get(&GridCoord::new(x, y))
    }

    /// Insert or overwrite the value at `(x, y)`
    pub fn set(&mut self, x: i32, y: i32, value: T) {
        let coord = GridCoord::new(x, y);
        self.entries.insert(coord, value);
        self.listeners.emit(&SparseGridEvent::Set(vec![coord]));
    }

    /// Remove the value at `(x, y)`; false if the cell was empty
    pub fn remove(&mut self, x: i32, y: i32) -> bool {
        self.take(x, y).is_some()
    }

    /// Remove and return the value at `(x, y)`
    pub fn take(&mut self, x: i32, y: i32) -> Option<T> {
        let coord = GridCoord::new(x, y);
        let value = self.entries.remove(&coord)?;
        self.listeners.emit(&SparseGridEvent::Removed(vec![coord]));
        Some(value)
    }

    /// Occupied cells and their values
    ///
    /// Restartable: call again for a fresh pass. The order is unspecified but
    /// stays the same while the grid is not modified.
    pub fn entries(&self) -> impl Iterator<Item = (GridCoord, &T)> + Clone + '_ {
        self.entries.iter().map(|(coord, value)| (*coord, value))
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + Clone + '_ {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move a batch of entries by `(dx, dy)` as one operation
    ///
    /// Fails without mutation if any source cell is empty, any destination
    /// leaves the bounds, or any destination holds an entry that is not part
    /// of the batch. Raises a single [`SparseGridEvent::Moved`].
    pub fn translate_entries(&mut self, coords: &[GridCoord], dx: i32, dy: i32) -> MapResult {
        let moving: HashSet<GridCoord> = coords.iter().copied().collect();

        for coord in &moving {
            if !self.entries.contains_key(coord) {
                return Err(MapError::InvalidArgument(format!(
                    "no entry to move at {coord}"
                )));
            }
            let target = coord.offset(dx, dy);
            if !self.in_bounds(target) {
                return Err(MapError::Blocked(target));
            }
            if !moving.contains(&target) && self.entries.contains_key(&target) {
                return Err(MapError::Blocked(target));
            }
        }

        if moving.is_empty() || (dx == 0 && dy == 0) {
            return Ok(());
        }

        let lifted: Vec<(GridCoord, T)> = moving
            .iter()
            .filter_map(|coord| self.entries.remove(coord).map(|value| (*coord, value)))
            .collect();

        let mut moves = Vec::with_capacity(lifted.len());
        for (from, value) in lifted {
            let to = from.offset(dx, dy);
            self.entries.insert(to, value);
            moves.push((from, to));
        }

        self.listeners.emit(&SparseGridEvent::Moved(moves));
        Ok(())
    }

    /// Mutable access that raises no event; callers announce the change
    /// themselves (the document uses it to refresh values after a move)
    pub(crate) fn value_mut(&mut self, coord: GridCoord) -> Option<&mut T> {
        self.entries.get_mut(&coord)
    }

    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&SparseGridEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }
}

impl<T: Clone> SparseGrid<T> {
    /// Copy the occupied cells of a source rectangle into this grid
    ///
    /// Each source cell at `(sx, sy)` inside the rectangle lands at
    /// `(sx - src_x + dst_x, sy - src_y + dst_y)`, overwriting what is there.
    /// Empty source cells leave the destination untouched.
    pub fn merge_region(
        &mut self,
        src: &SparseGrid<T>,
        src_x: i32,
        src_y: i32,
        dst_x: i32,
        dst_y: i32,
        width: i32,
        height: i32,
    ) -> MapResult {
        check_dimensions(width, height)?;
        check_region(
            RegionSide::Source,
            src_x,
            src_y,
            width,
            height,
            src.width,
            src.height,
        )?;
        check_region(
            RegionSide::Destination,
            dst_x,
            dst_y,
            width,
            height,
            self.width,
            self.height,
        )?;

        let area = GridRect::new(src_x, src_y, width, height);
        let copied: Vec<(GridCoord, T)> = src
            .entries()
            .filter(|(coord, _)| area.contains(*coord))
            .map(|(coord, value)| (coord.offset(dst_x - src_x, dst_y - src_y), value.clone()))
            .collect();

        self.insert_batch(copied);
        Ok(())
    }

    /// Copy every entry of `src` translated by `(x, y)`
    ///
    /// The whole source grid, not just its occupied cells, must fit inside
    /// this grid's bounds.
    pub fn merge(&mut self, src: &SparseGrid<T>, x: i32, y: i32) -> MapResult {
        check_region(
            RegionSide::Destination,
            x,
            y,
            src.width as i32,
            src.height as i32,
            self.width,
            self.height,
        )?;

        let copied: Vec<(GridCoord, T)> = src
            .entries()
            .map(|(coord, value)| (coord.offset(x, y), value.clone()))
            .collect();

        self.insert_batch(copied);
        Ok(())
    }

    fn insert_batch(&mut self, batch: Vec<(GridCoord, T)>) {
        if batch.is_empty() {
            return;
        }
        let mut coords = Vec::with_capacity(batch.len());
        for (coord, value) in batch {
            self.entries.insert(coord, value);
            coords.push(coord);
        }
        self.listeners.emit(&SparseGridEvent::Set(coords));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn observe(grid: &mut SparseGrid<char>) -> Arc<Mutex<Vec<SparseGridEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        grid.subscribe(move |e| sink.lock().unwrap().push(e.clone()));
        events
    }

    fn sorted(mut coords: Vec<GridCoord>) -> Vec<GridCoord> {
        coords.sort();
        coords
    }

    #[test]
    fn test_set_get_remove() {
        let mut grid = SparseGrid::new(4, 4);
        assert!(!grid.has(1, 1));
        grid.set(1, 1, 'a');
        assert_eq!(grid.try_get(1, 1), Some(&'a'));
        grid.set(1, 1, 'b');
        assert_eq!(grid.try_get(1, 1), Some(&'b'));
        assert_eq!(grid.len(), 1);

        assert!(grid.remove(1, 1));
        assert!(!grid.remove(1, 1));
        assert!(grid.is_empty());
    }

    #[test]
    fn test_merge_whole_grid_at_offset() {
        let mut src = SparseGrid::new(2, 2);
        src.set(0, 0, 'a');
        src.set(1, 0, 'b');
        src.set(0, 1, 'c');
        src.set(1, 1, 'd');

        let mut dst = SparseGrid::new(4, 4);
        dst.set(3, 3, 'z');
        dst.set(0, 0, 'y');
        let events = observe(&mut dst);

        dst.merge(&src, 1, 1).unwrap();

        assert_eq!(dst.len(), 6);
        assert_eq!(dst.try_get(1, 1), Some(&'a'));
        assert_eq!(dst.try_get(2, 1), Some(&'b'));
        assert_eq!(dst.try_get(1, 2), Some(&'c'));
        assert_eq!(dst.try_get(2, 2), Some(&'d'));
        assert_eq!(dst.try_get(3, 3), Some(&'z'));
        assert_eq!(dst.try_get(0, 0), Some(&'y'));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action(), SparseGridAction::Set);
        assert_eq!(
            sorted(events[0].coordinates()),
            vec![
                GridCoord::new(1, 1),
                GridCoord::new(1, 2),
                GridCoord::new(2, 1),
                GridCoord::new(2, 2),
            ]
        );
    }

    #[test]
    fn test_merge_rejects_out_of_bounds_source() {
        let src = SparseGrid::<char>::new(3, 3);
        let mut dst = SparseGrid::new(4, 4);
        dst.set(0, 0, 'x');
        let before = dst.clone();

        assert!(dst.merge(&src, 2, 0).is_err());
        assert!(dst.merge(&src, -1, 0).is_err());
        assert_eq!(dst, before);
    }

    #[test]
    fn test_merge_region() {
        let mut src = SparseGrid::new(4, 4);
        src.set(0, 0, 'a');
        src.set(1, 1, 'b');
        src.set(2, 2, 'c');

        let mut dst = SparseGrid::new(4, 4);
        dst.set(3, 3, 'z');
        dst.merge_region(&src, 1, 1, 2, 2, 2, 2).unwrap();

        assert_eq!(dst.try_get(2, 2), Some(&'b'));
        assert_eq!(dst.try_get(3, 3), Some(&'c'));
        assert!(!dst.has(1, 1));
        assert_eq!(dst.len(), 2);
    }

    #[test]
    fn test_merge_region_is_all_or_nothing() {
        let mut src = SparseGrid::new(2, 2);
        src.set(0, 0, 'a');
        let mut dst = SparseGrid::new(2, 2);
        let events = observe(&mut dst);

        assert!(dst.merge_region(&src, 0, 0, 1, 1, 2, 2).is_err());
        assert!(dst.merge_region(&src, 1, 1, 0, 0, 2, 2).is_err());
        assert!(matches!(
            dst.merge_region(&src, 0, 0, 0, 0, 2, -2),
            Err(MapError::InvalidArgument(_))
        ));

        assert!(dst.is_empty());
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_entries_are_restartable() {
        let mut grid = SparseGrid::new(4, 4);
        grid.set(0, 1, 'a');
        grid.set(2, 3, 'b');

        let entries = grid.entries();
        let first: Vec<_> = entries.clone().collect();
        let second: Vec<_> = entries.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_translate_entries_with_chained_overlap() {
        let mut grid = SparseGrid::new(4, 1);
        grid.set(0, 0, 'a');
        grid.set(1, 0, 'b');
        let events = observe(&mut grid);

        grid.translate_entries(&[GridCoord::new(0, 0), GridCoord::new(1, 0)], 1, 0)
            .unwrap();

        assert!(!grid.has(0, 0));
        assert_eq!(grid.try_get(1, 0), Some(&'a'));
        assert_eq!(grid.try_get(2, 0), Some(&'b'));

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action(), SparseGridAction::Move);
    }

    #[test]
    fn test_translate_entries_blocked() {
        let mut grid = SparseGrid::new(4, 1);
        grid.set(0, 0, 'a');
        grid.set(1, 0, 'b');
        let before = grid.clone();

        assert_eq!(
            grid.translate_entries(&[GridCoord::new(0, 0)], 1, 0),
            Err(MapError::Blocked(GridCoord::new(1, 0)))
        );
        assert_eq!(
            grid.translate_entries(&[GridCoord::new(0, 0)], -1, 0),
            Err(MapError::Blocked(GridCoord::new(-1, 0)))
        );
        assert_eq!(grid, before);
    }

    #[test]
    fn test_remove_raises_one_removed_event() {
        let mut grid = SparseGrid::new(4, 4);
        grid.set(1, 2, 'a');
        grid.set(3, 0, 'b');
        let events = observe(&mut grid);

        assert!(grid.remove(1, 2));
        assert_eq!(grid.take(3, 0), Some('b'));

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                SparseGridEvent::Removed(vec![GridCoord::new(1, 2)]),
                SparseGridEvent::Removed(vec![GridCoord::new(3, 0)]),
            ]
        );
    }

    #[test]
    fn test_removing_empty_cell_is_silent() {
        let mut grid = SparseGrid::<char>::new(4, 4);
        grid.set(0, 0, 'a');
        let events = observe(&mut grid);

        assert!(!grid.remove(2, 2));
        assert_eq!(grid.take(3, 3), None);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_feature_removal_announces_removed_cell() {
        use crate::{FeatureInstance, MapDocument, Operation};

        let mut doc = MapDocument::new(4, 4);
        let tree = FeatureInstance::new("tree", GridCoord::new(2, 3));
        let id = tree.id;
        Operation::add_feature(tree).execute(&mut doc).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        doc.subscribe_features(move |e| sink.lock().unwrap().push(e.clone()));

        let mut remove = Operation::remove_feature(id);
        remove.execute(&mut doc).unwrap();
        remove.undo(&mut doc).unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                SparseGridEvent::Removed(vec![GridCoord::new(2, 3)]),
                SparseGridEvent::Set(vec![GridCoord::new(2, 3)]),
            ]
        );
    }
}
