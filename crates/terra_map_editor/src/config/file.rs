//! Config file save/load operations

use super::EditorConfig;
use directories::ProjectDirs;
use log::{info, warn};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Could not determine config directory")]
    NoConfigDir,
}

impl EditorConfig {
    /// Get the config directory path for the editor
    pub fn config_dir() -> Option<PathBuf> {
        ProjectDirs::from("com", "terra_map", "terra_map_editor")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join(CONFIG_FILE))
    }

    /// Load the config file, returning defaults if it is missing or broken
    pub fn load() -> Self {
        let loaded = Self::config_path()
            .ok_or(ConfigError::NoConfigDir)
            .and_then(|path| Self::load_from(&path));
        match loaded {
            Ok(config) => config,
            Err(e) => {
                warn!("Could not load editor config: {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save to the platform config directory
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        info!("Saved editor config to {:?}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("terra_map_editor-{}", Uuid::new_v4()))
            .join(CONFIG_FILE)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = EditorConfig::load_from(&scratch_path()).unwrap();
        assert_eq!(config, EditorConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = scratch_path();
        let config = EditorConfig {
            max_undo: 5,
            default_sea_level: 12,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        assert_eq!(EditorConfig::load_from(&path).unwrap(), config);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_broken_file_is_a_parse_error() {
        let path = scratch_path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            EditorConfig::load_from(&path),
            Err(ConfigError::Parse(_))
        ));

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }
}
