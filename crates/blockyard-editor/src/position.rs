//! Drop placement for drag and drop.
//!
//! Pure: given the dragged block, what it is hovering and the tree, decide
//! where it would land. `None` means "no valid placement", which the drag
//! controller treats as "do nothing".

use serde::{Deserialize, Serialize};

use crate::{BlockId, Position, Tree};

/// What the pointer is over.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropTarget {
    /// Another block.
    Block { id: BlockId },
    /// The empty drop zone rendered inside a nesting block.
    EmptyZone { parent: BlockId },
}

impl DropTarget {
    pub fn block(id: impl Into<BlockId>) -> Self {
        DropTarget::Block { id: id.into() }
    }

    pub fn empty_zone(parent: impl Into<BlockId>) -> Self {
        DropTarget::EmptyZone {
            parent: parent.into(),
        }
    }
}

/// Compute where `active` lands when dropped on `target`.
///
/// The active block takes the target's slot: the target's index in the
/// target's own list, under the target's parent (or the root). An empty zone
/// places it first inside the zone's parent. Self-drops, drops that would
/// make a block its own ancestor, and ids that vanished mid-drag all yield
/// `None`.
pub fn resolve_position(active: &BlockId, target: &DropTarget, tree: &Tree) -> Option<Position> {
    if !tree.contains(active) {
        tracing::trace!(%active, "dragged block no longer exists");
        return None;
    }

    let (parent, index) = match target {
        DropTarget::EmptyZone { parent } => {
            if !tree.contains(parent) {
                return None;
            }
            (Some(parent), 0)
        }
        DropTarget::Block { id } => {
            if id == active {
                return None;
            }
            let index = tree.index_of(id)?;
            (tree.parent(id), index)
        }
    };

    match parent {
        None => Some(Position::root(index)),
        Some(parent) => {
            if parent == active || tree.is_ancestor(active, parent) {
                return None;
            }
            Some(Position::inside(parent.clone(), index))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Block;

    fn tree() -> Tree {
        // a, b, c, s[x, y, inner[z]]
        Tree::from_blocks(&[
            Block::new("a", "text"),
            Block::new("b", "section"),
            Block::new("c", "text"),
            Block::new("s", "section").with_children(vec![
                Block::new("x", "text"),
                Block::new("y", "text"),
                Block::new("inner", "columns").with_children(vec![Block::new("z", "text")]),
            ]),
        ])
        .unwrap()
    }

    fn id(s: &str) -> BlockId {
        BlockId::new(s)
    }

    #[test]
    fn test_root_to_root() {
        let t = tree();
        assert_eq!(
            resolve_position(&id("a"), &DropTarget::block("b"), &t),
            Some(Position::root(1))
        );
        assert_eq!(
            resolve_position(&id("c"), &DropTarget::block("a"), &t),
            Some(Position::root(0))
        );
    }

    #[test]
    fn test_empty_zone() {
        let t = tree();
        assert_eq!(
            resolve_position(&id("a"), &DropTarget::empty_zone("b"), &t),
            Some(Position::inside("b", 0))
        );
        assert_eq!(
            resolve_position(&id("a"), &DropTarget::empty_zone("gone"), &t),
            None
        );
    }

    #[test]
    fn test_self_drop() {
        let t = tree();
        assert_eq!(resolve_position(&id("a"), &DropTarget::block("a"), &t), None);
    }

    #[test]
    fn test_leave_nested_parent_for_root() {
        let t = tree();
        assert_eq!(
            resolve_position(&id("y"), &DropTarget::block("c"), &t),
            Some(Position::root(2))
        );
    }

    #[test]
    fn test_enter_nested_parent() {
        let t = tree();
        assert_eq!(
            resolve_position(&id("a"), &DropTarget::block("y"), &t),
            Some(Position::inside("s", 1))
        );
        assert_eq!(
            resolve_position(&id("a"), &DropTarget::block("z"), &t),
            Some(Position::inside("inner", 0))
        );
        assert_eq!(resolve_position(&id("a"), &DropTarget::block("ghost"), &t), None);
    }

    #[test]
    fn test_cycles_rejected() {
        let t = tree();
        // s over its own grandchild.
        assert_eq!(resolve_position(&id("s"), &DropTarget::block("z"), &t), None);
        // s into its own descendant's zone.
        assert_eq!(resolve_position(&id("s"), &DropTarget::empty_zone("inner"), &t), None);
        assert_eq!(resolve_position(&id("s"), &DropTarget::empty_zone("s"), &t), None);
        // Siblings under the same parent are fine.
        assert_eq!(
            resolve_position(&id("inner"), &DropTarget::block("x"), &t),
            Some(Position::inside("s", 0))
        );
    }

    #[test]
    fn test_stale_active() {
        let t = tree();
        assert_eq!(resolve_position(&id("deleted"), &DropTarget::block("a"), &t), None);
    }

    #[test]
    fn test_drop_target_wire_format() {
        let target: DropTarget =
            serde_json::from_str(r#"{"kind": "empty_zone", "parent": "s"}"#).unwrap();
        assert_eq!(target, DropTarget::empty_zone("s"));
    }
}
