//! Error types for tree operations.

use thiserror::Error;

use crate::BlockId;

/// Errors that can occur while building or mutating a tree.
///
/// All of these are raised before the tree is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Block not found in the tree.
    #[error("block not found: {0}")]
    UnknownBlock(BlockId),

    /// A block id already exists elsewhere in the tree.
    #[error("block already exists: {0}")]
    DuplicateId(BlockId),

    /// The operation would make a block its own ancestor.
    #[error("moving {id} under {parent} would create a cycle")]
    Cycle { id: BlockId, parent: BlockId },

    /// Insertion index past the end of the destination list.
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Parent/children adjacency disagrees with itself.
    #[error("inconsistent tree: {0}")]
    Inconsistent(String),
}
