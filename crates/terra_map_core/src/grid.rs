//! Dense fixed-size grids and the coordinate types shared with sparse grids

use crate::events::{ListenerId, Listeners};
use crate::{MapError, MapResult, RegionSide};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A signed cell coordinate
///
/// Signed because floating tiles and drag targets may sit partly off the map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// This coordinate shifted by `(dx, dy)`, saturating at the `i32` range
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
        }
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<(i32, i32)> for GridCoord {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle of cells
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl GridRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains(&self, coord: GridCoord) -> bool {
        coord.x >= self.x
            && coord.y >= self.y
            && coord.x < self.x + self.width
            && coord.y < self.y + self.height
    }

    /// The overlapping part of two rectangles, if any
    pub fn intersect(&self, other: &GridRect) -> Option<GridRect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);

        if right <= left || bottom <= top {
            return None;
        }
        Some(GridRect::new(left, top, right - left, bottom - top))
    }
}

/// Change notification raised by a [`DenseGrid`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridEvent {
    /// One cell was written
    CellChanged { x: usize, y: usize },
    /// Every cell in the rectangle may have changed; no per-cell detail
    AreaChanged {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

/// Reject negative dimensions before any bounds arithmetic
pub(crate) fn check_dimensions(width: i32, height: i32) -> MapResult {
    if width < 0 || height < 0 {
        return Err(MapError::InvalidArgument(
            "copy area has negative dimensions".to_string(),
        ));
    }
    Ok(())
}

/// Check that a rectangle fits inside `bound_width` x `bound_height`
pub(crate) fn check_region(
    side: RegionSide,
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    bound_width: usize,
    bound_height: usize,
) -> MapResult {
    let (x, y, width, height) = (x as i64, y as i64, width as i64, height as i64);
    if x < 0 || y < 0 || x + width > bound_width as i64 || y + height > bound_height as i64 {
        return Err(MapError::RegionOutOfBounds { side });
    }
    Ok(())
}

/// Serialized form of a [`DenseGrid`], validated on the way in
#[derive(Deserialize)]
struct GridData<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T> TryFrom<GridData<T>> for DenseGrid<T> {
    type Error = MapError;

    fn try_from(data: GridData<T>) -> Result<Self, Self::Error> {
        DenseGrid::from_cells(data.width, data.height, data.cells)
    }
}

/// A fixed-size W×H grid stored row-major (`index = y * width + x`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "GridData<T>",
    bound(deserialize = "T: Deserialize<'de>")
)]
pub struct DenseGrid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
    #[serde(skip)]
    listeners: Listeners<GridEvent>,
}

impl<T: Clone + Default> DenseGrid<T> {
    /// Create a grid with every cell set to `T::default()`
    pub fn new(width: usize, height: usize) -> Self {
        Self::filled(width, height, T::default())
    }
}

impl<T: Clone> DenseGrid<T> {
    /// Create a grid with every cell set to `value`
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Self {
            width,
            height,
            cells: vec![value; width * height],
            listeners: Listeners::new(),
        }
    }

    /// Set every cell to `value`, raising one area event for the whole grid
    pub fn fill(&mut self, value: T) {
        self.cells.iter_mut().for_each(|cell| *cell = value.clone());
        self.listeners.emit(&GridEvent::AreaChanged {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        });
    }

    /// Copy a `width` x `height` rectangle from `src` into this grid
    ///
    /// Both rectangles are validated before anything is written, so an error
    /// leaves this grid untouched. Raises one area event covering the
    /// written rectangle.
    pub fn copy_region(
        &mut self,
        src: &DenseGrid<T>,
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

        if width == 0 || height == 0 {
            return Ok(());
        }

        let (width, height) = (width as usize, height as usize);
        let (src_x, src_y) = (src_x as usize, src_y as usize);
        let (dst_x, dst_y) = (dst_x as usize, dst_y as usize);
        for row in 0..height {
            let from = (src_y + row) * src.width + src_x;
            let to = (dst_y + row) * self.width + dst_x;
            self.cells[to..to + width].clone_from_slice(&src.cells[from..from + width]);
        }

        self.listeners.emit(&GridEvent::AreaChanged {
            x: dst_x,
            y: dst_y,
            width,
            height,
        });
        Ok(())
    }

    /// Copy the whole of `src` into this grid with its origin at `(x, y)`
    pub fn copy_from(&mut self, src: &DenseGrid<T>, x: i32, y: i32) -> MapResult {
        let (width, height) = (src.width as i32, src.height as i32);
        self.copy_region(src, 0, 0, x, y, width, height)
    }

    /// Extract a rectangle into a new, unobserved grid
    pub fn region(&self, x: i32, y: i32, width: i32, height: i32) -> MapResult<DenseGrid<T>> {
        check_dimensions(width, height)?;
        check_region(
            RegionSide::Source,
            x,
            y,
            width,
            height,
            self.width,
            self.height,
        )?;

        let (x, y, width, height) = (x as usize, y as usize, width as usize, height as usize);
        let mut cells = Vec::with_capacity(width * height);
        for row in y..y + height {
            let start = row * self.width + x;
            cells.extend_from_slice(&self.cells[start..start + width]);
        }
        DenseGrid::from_cells(width, height, cells)
    }
}

impl<T> DenseGrid<T> {
    /// Wrap existing row-major cells; `cells.len()` must equal `width * height`
    pub fn from_cells(width: usize, height: usize, cells: Vec<T>) -> MapResult<Self> {
        if cells.len() != width * height {
            return Err(MapError::InvalidArgument(format!(
                "{} cells do not fill a {}x{} grid",
                cells.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            cells,
            listeners: Listeners::new(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of cells (`width * height`)
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    /// Linear index of `(x, y)`
    pub fn index_of(&self, x: usize, y: usize) -> MapResult<usize> {
        if !self.contains(x, y) {
            return Err(self.out_of_bounds(x, y));
        }
        Ok(y * self.width + x)
    }

    /// Coordinates of a linear index
    pub fn coords_of(&self, index: usize) -> MapResult<(usize, usize)> {
        if index >= self.cells.len() {
            return Err(MapError::OutOfBounds {
                x: index as i64 % self.width.max(1) as i64,
                y: index as i64 / self.width.max(1) as i64,
                width: self.width,
                height: self.height,
            });
        }
        Ok((index % self.width, index / self.width))
    }

    pub fn get(&self, x: usize, y: usize) -> MapResult<&T> {
        let index = self.index_of(x, y)?;
        Ok(&self.cells[index])
    }

    pub fn get_index(&self, index: usize) -> MapResult<&T> {
        let (x, y) = self.coords_of(index)?;
        self.get(x, y)
    }

    /// Write one cell, raising a cell event
    pub fn set(&mut self, x: usize, y: usize, value: T) -> MapResult {
        let index = self.index_of(x, y)?;
        self.cells[index] = value;
        self.listeners.emit(&GridEvent::CellChanged { x, y });
        Ok(())
    }

    pub fn set_index(&mut self, index: usize, value: T) -> MapResult {
        let (x, y) = self.coords_of(index)?;
        self.set(x, y, value)
    }

    /// Row-major view of every cell
    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.cells.iter()
    }

    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&GridEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.listeners.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn out_of_bounds(&self, x: usize, y: usize) -> MapError {
        MapError::OutOfBounds {
            x: x as i64,
            y: y as i64,
            width: self.width,
            height: self.height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn observe(grid: &mut DenseGrid<i32>) -> Arc<Mutex<Vec<GridEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        grid.subscribe(move |e| sink.lock().unwrap().push(*e));
        events
    }

    fn numbered(width: usize, height: usize) -> DenseGrid<i32> {
        let cells = (0..(width * height) as i32).collect();
        DenseGrid::from_cells(width, height, cells).unwrap()
    }

    #[test]
    fn test_fill_then_set_events() {
        let mut grid = DenseGrid::<i32>::new(4, 4);
        let events = observe(&mut grid);

        grid.fill(0);
        grid.set(2, 3, 7).unwrap();

        assert_eq!(*grid.get(2, 3).unwrap(), 7);
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                GridEvent::AreaChanged {
                    x: 0,
                    y: 0,
                    width: 4,
                    height: 4
                },
                GridEvent::CellChanged { x: 2, y: 3 },
            ]
        );
    }

    #[test]
    fn test_set_get_every_cell() {
        let mut grid = DenseGrid::<i32>::new(3, 2);
        for y in 0..2 {
            for x in 0..3 {
                grid.set(x, y, (x * 10 + y) as i32).unwrap();
            }
        }
        for y in 0..2 {
            for x in 0..3 {
                assert_eq!(*grid.get(x, y).unwrap(), (x * 10 + y) as i32);
            }
        }
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mut grid = DenseGrid::<i32>::new(4, 4);
        assert!(matches!(
            grid.get(4, 0),
            Err(MapError::OutOfBounds { x: 4, y: 0, .. })
        ));
        assert!(grid.set(0, 4, 1).is_err());
        assert!(grid.get_index(16).is_err());
    }

    #[test]
    fn test_linear_index_round_trip() {
        let grid = numbered(5, 3);
        assert_eq!(grid.index_of(2, 1).unwrap(), 7);
        assert_eq!(grid.coords_of(7).unwrap(), (2, 1));
        assert_eq!(*grid.get_index(7).unwrap(), 7);
    }

    #[test]
    fn test_from_cells_rejects_wrong_length() {
        assert!(DenseGrid::from_cells(2, 2, vec![1, 2, 3]).is_err());
    }

    #[test]
    fn test_copy_region() {
        let src = numbered(4, 4);
        let mut dst = DenseGrid::<i32>::filled(3, 3, -1);
        let events = observe(&mut dst);

        dst.copy_region(&src, 1, 1, 0, 1, 2, 2).unwrap();

        assert_eq!(dst.cells(), &[-1, -1, -1, 5, 6, -1, 9, 10, -1]);
        assert_eq!(
            *events.lock().unwrap(),
            vec![GridEvent::AreaChanged {
                x: 0,
                y: 1,
                width: 2,
                height: 2
            }]
        );
    }

    #[test]
    fn test_copy_region_is_all_or_nothing() {
        let src = numbered(4, 4);
        let mut dst = DenseGrid::<i32>::filled(3, 3, -1);
        let events = observe(&mut dst);
        let before = dst.clone();

        assert_eq!(
            dst.copy_region(&src, 3, 3, 0, 0, 2, 2),
            Err(MapError::RegionOutOfBounds {
                side: RegionSide::Source
            })
        );
        assert_eq!(
            dst.copy_region(&src, 0, 0, 2, 2, 2, 2),
            Err(MapError::RegionOutOfBounds {
                side: RegionSide::Destination
            })
        );
        assert!(matches!(
            dst.copy_region(&src, 0, 0, 0, 0, -1, 2),
            Err(MapError::InvalidArgument(_))
        ));

        assert_eq!(dst, before);
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_copy_from_whole_grid() {
        let src = DenseGrid::filled(2, 2, 9);
        let mut dst = DenseGrid::<i32>::new(4, 4);
        dst.copy_from(&src, 2, 2).unwrap();
        assert_eq!(*dst.get(3, 3).unwrap(), 9);
        assert_eq!(*dst.get(1, 1).unwrap(), 0);
        assert!(dst.copy_from(&src, 3, 0).is_err());
    }

    #[test]
    fn test_region_extraction() {
        let grid = numbered(4, 4);
        let part = grid.region(1, 2, 3, 2).unwrap();
        assert_eq!(part.width(), 3);
        assert_eq!(part.height(), 2);
        assert_eq!(part.cells(), &[9, 10, 11, 13, 14, 15]);
        assert!(grid.region(2, 2, 3, 1).is_err());
    }

    #[test]
    fn test_rect_intersection() {
        let a = GridRect::new(0, 0, 4, 4);
        let b = GridRect::new(-2, 2, 4, 4);
        assert_eq!(a.intersect(&b), Some(GridRect::new(0, 2, 2, 2)));
        assert_eq!(a.intersect(&GridRect::new(4, 0, 1, 1)), None);
        assert!(a.contains(GridCoord::new(3, 3)));
        assert!(!a.contains(GridCoord::new(4, 3)));
    }

    #[test]
    fn test_serde_validates_cell_count() {
        let grid = numbered(2, 2);
        let json = serde_json::to_string(&grid).unwrap();
        let back: DenseGrid<i32> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grid);

        let broken = r#"{"width":2,"height":2,"cells":[1,2,3]}"#;
        assert!(serde_json::from_str::<DenseGrid<i32>>(broken).is_err());
    }
}
