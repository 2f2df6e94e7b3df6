//! terra_map_editor - Editing session for terrain maps
//!
//! This crate drives a [`terra_map_core::MapDocument`] through user gestures:
//! - Selection with automatic merge of the live floating tile
//! - Drag and slider coalescing into single undo steps
//! - Drop, paste, cut/copy and delete
//! - Flatten-before-save and unsaved-change checks
//! - Applying background section imports
//!
//! Rendering, dialogs and file formats are supplied by the host through the
//! traits in [`services`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use terra_map_editor::{EditorConfig, MapEditor};
//!
//! let mut editor = MapEditor::new(EditorConfig::load());
//! editor.drag_drop_tile(fragment, 64, 32)?;
//! editor.translate_selection(40, 0)?;
//! editor.flush_translation();
//! editor.undo()?;
//! ```

pub mod config;
pub mod editor;
pub mod error;
pub mod services;

#[cfg(feature = "bevy")]
mod plugin;

pub use terra_map_core;

pub use config::{ConfigError, EditorConfig};
pub use editor::MapEditor;
pub use error::{EditorError, EditorResult};
pub use services::{
    run_import, ClipboardItem, DialogService, DiscardChoice, FeatureCatalog, JobOutcome,
    MapWriter, ProgressReporter, SharedProgress, TerrainSource,
};

#[cfg(feature = "bevy")]
pub use plugin::MapEditorPlugin;
