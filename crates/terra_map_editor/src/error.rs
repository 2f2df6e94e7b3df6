//! Editor-level errors

use crate::config::ConfigError;
use terra_map_core::MapError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Map(#[from] MapError),

    #[error("failed to write map: {0}")]
    Persistence(String),

    #[error("failed to import terrain: {0}")]
    Import(String),

    #[error("no file path to save to")]
    NoPath,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type EditorResult<T = ()> = Result<T, EditorError>;
