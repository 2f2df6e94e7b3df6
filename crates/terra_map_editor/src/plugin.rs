//! Bevy integration: exposes the editing session as a resource

use crate::{EditorConfig, MapEditor};
use bevy::prelude::*;

/// Inserts a [`MapEditor`] built from the saved editor config
#[derive(Default)]
pub struct MapEditorPlugin;

impl Plugin for MapEditorPlugin {
    fn build(&self, app: &mut App) {
        let config = EditorConfig::load();
        bevy::log::info!(
            "MapEditorPlugin: new maps are {}x{} tiles",
            config.new_map_width,
            config.new_map_height
        );

        app.insert_resource(MapEditor::new(config));
    }
}
