//! Editor configuration persisted between sessions

mod file;

pub use file::ConfigError;

use serde::{Deserialize, Serialize};
use terra_map_core::DEFAULT_MAX_UNDO;

/// User-tunable editor settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Undo depth; the oldest step is dropped beyond it
    pub max_undo: usize,
    /// Pixels per tile. Pointer deltas are quantized by this for tile drags
    /// and by half of it for feature drags.
    pub tile_size: u32,
    /// Size of a new blank map, in tiles
    pub new_map_width: usize,
    pub new_map_height: usize,
    pub default_sea_level: i32,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_undo: DEFAULT_MAX_UNDO,
            tile_size: 32,
            new_map_width: 64,
            new_map_height: 64,
            default_sea_level: 0,
        }
    }
}

impl EditorConfig {
    /// Pixels per feature-grid cell
    pub fn feature_cell_size(&self) -> i32 {
        (self.tile_size / 2).max(1) as i32
    }

    pub fn tile_pixels(&self) -> i32 {
        self.tile_size.max(1) as i32
    }
}
