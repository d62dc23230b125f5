//! Arena node.

use crate::{Align, Attributes, Block, BlockId, Status};

/// One block in the arena.
///
/// Content fields are public. Adjacency (`parent`, `children`) is owned by
/// [`Tree`](crate::Tree) and only readable from outside, so the arena
/// cannot be made inconsistent by editing a node in place.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub id: BlockId,
    /// Registry type name.
    pub kind: String,
    pub attributes: Attributes,
    pub status: Status,
    pub align: Align,
    pub group: Option<String>,
    pub anchor: Option<String>,
    pub(crate) parent: Option<BlockId>,
    pub(crate) children: Vec<BlockId>,
}

impl Node {
    /// Build a detached node from a block record's own fields.
    pub(crate) fn from_block(block: &Block, parent: Option<BlockId>) -> Self {
        Self {
            id: block.id.clone(),
            kind: block.kind.clone(),
            attributes: block.attributes.clone(),
            status: block.status,
            align: block.align,
            group: block.group.clone(),
            anchor: block.anchor.clone(),
            parent,
            children: block.children.iter().map(|c| c.id.clone()).collect(),
        }
    }

    /// Parent id (None for root blocks).
    pub fn parent(&self) -> Option<&BlockId> {
        self.parent.as_ref()
    }

    /// Ordered child ids.
    pub fn children(&self) -> &[BlockId] {
        &self.children
    }

    /// Check if this is a root block.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// This node's own fields as a childless block record.
    pub fn to_block(&self) -> Block {
        Block {
            id: self.id.clone(),
            kind: self.kind.clone(),
            attributes: self.attributes.clone(),
            status: self.status,
            align: self.align,
            group: self.group.clone(),
            anchor: self.anchor.clone(),
            children: Vec::new(),
            seed_fragment: None,
        }
    }
}
