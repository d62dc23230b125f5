//! Command precondition failures.

use thiserror::Error;

use crate::{BlockId, TreeError};

/// Why a command was not applied.
///
/// These are expected during interactive editing (a block deleted while a
/// drag was in flight, a shortcut aimed at a block that forbids it), so they
/// surface as values and `Error` events rather than panics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Structural precondition (unknown id, cycle, duplicate id, bad index).
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// The block's registry capability forbids the operation.
    #[error("{capability} not permitted for block {id} ({kind})")]
    CapabilityDenied {
        id: BlockId,
        kind: String,
        capability: &'static str,
    },

    /// The destination parent's type does not accept children.
    #[error("block {parent} ({kind}) does not accept children")]
    NestingForbidden { parent: BlockId, kind: String },

    /// A type marked single-instance already has a block in the tree.
    #[error("only one {kind} block is allowed")]
    SingleInstance { kind: String },
}

impl CommandError {
    pub(crate) fn unknown(id: &BlockId) -> Self {
        CommandError::Tree(TreeError::UnknownBlock(id.clone()))
    }
}
