//! Insertion points.

use serde::{Deserialize, Serialize};

use crate::ids::BlockId;

/// An insertion point in the root list or inside a parent's children.
///
/// `index` is the block's final index in the destination list once the
/// move has been applied, so moving a block to its current position is a
/// no-op.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub index: usize,
    #[serde(default, rename = "parentId", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<BlockId>,
}

impl Position {
    /// A position in the root list.
    pub fn root(index: usize) -> Self {
        Self {
            index,
            parent_id: None,
        }
    }

    /// A position inside `parent`'s children.
    pub fn inside(parent: impl Into<BlockId>, index: usize) -> Self {
        Self {
            index,
            parent_id: Some(parent.into()),
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.parent_id {
            Some(parent) => write!(f, "{parent}[{}]", self.index),
            None => write!(f, "root[{}]", self.index),
        }
    }
}
