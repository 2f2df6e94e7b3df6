//! Placed features (trees, rocks, wreckage...) on the feature grid

use crate::grid::GridCoord;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable identity of a placed feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureId(pub Uuid);

impl FeatureId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FeatureId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A feature placed on the map
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureInstance {
    pub id: FeatureId,
    /// Name of the feature type in the external feature catalog
    pub type_name: String,
    pub location: GridCoord,
}

impl FeatureInstance {
    /// Create a new feature instance with a fresh identity
    pub fn new(type_name: impl Into<String>, location: GridCoord) -> Self {
        Self {
            id: FeatureId::new(),
            type_name: type_name.into(),
            location,
        }
    }

    pub fn with_id(id: FeatureId, type_name: impl Into<String>, location: GridCoord) -> Self {
        Self {
            id,
            type_name: type_name.into(),
            location,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_feature_has_unique_id() {
        let a = FeatureInstance::new("tree", GridCoord::new(1, 2));
        let b = FeatureInstance::new("tree", GridCoord::new(1, 2));
        assert_ne!(a.id, b.id);
        assert_eq!(a.type_name, "tree");
        assert_eq!(a.location, GridCoord::new(1, 2));
    }
}
