//! What the user currently has selected

use crate::FeatureId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Current selection; the groups are mutually exclusive by construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    #[default]
    None,
    /// Index into the document's floating tiles
    Tile(usize),
    /// A non-empty set of feature identities
    Features(BTreeSet<FeatureId>),
    /// Start position slot
    StartPosition(usize),
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        match self {
            Selection::None => true,
            Selection::Features(ids) => ids.is_empty(),
            _ => false,
        }
    }

    pub fn selected_tile(&self) -> Option<usize> {
        match self {
            Selection::Tile(index) => Some(*index),
            _ => None,
        }
    }

    pub fn selected_start_position(&self) -> Option<usize> {
        match self {
            Selection::StartPosition(index) => Some(*index),
            _ => None,
        }
    }

    pub fn selected_features(&self) -> impl Iterator<Item = FeatureId> + '_ {
        let ids = match self {
            Selection::Features(ids) => Some(ids),
            _ => None,
        };
        ids.into_iter().flatten().copied()
    }

    pub fn contains_feature(&self, id: FeatureId) -> bool {
        matches!(self, Selection::Features(ids) if ids.contains(&id))
    }

    /// This selection with `id` added to the feature group
    ///
    /// A tile or start position selection is dropped in favour of the feature.
    pub fn with_feature(&self, id: FeatureId) -> Selection {
        let mut ids = match self {
            Selection::Features(ids) => ids.clone(),
            _ => BTreeSet::new(),
        };
        ids.insert(id);
        Selection::Features(ids)
    }
}
