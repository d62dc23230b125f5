//! The arena itself.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::{Block, BlockId, MAX_DEPTH, Node, Position, Result, TreeError};

/// Ordered forest of blocks stored as a flat arena.
///
/// Cheap to clone (nodes are shared behind `Arc`); see the crate docs for
/// the copy-on-write contract.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tree {
    /// Nodes indexed by id.
    nodes: HashMap<BlockId, Arc<Node>>,
    /// Top-level ids in document order.
    roots: Vec<BlockId>,
}

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from nested block records.
    ///
    /// Fails on the first duplicate id. Seed fragments are not part of the
    /// tree and are ignored here.
    pub fn from_blocks(blocks: &[Block]) -> Result<Self> {
        let mut seen = HashSet::new();
        for block in blocks {
            validate_subtree(block, &mut seen, 0)?;
        }

        let mut tree = Self::new();
        for block in blocks {
            tree.adopt(block, None);
            tree.roots.push(block.id.clone());
        }
        Ok(tree)
    }

    /// Insert `block` and its descendants without touching any sibling list.
    /// Callers have validated ids already.
    fn adopt(&mut self, block: &Block, parent: Option<&BlockId>) {
        self.nodes.insert(
            block.id.clone(),
            Arc::new(Node::from_block(block, parent.cloned())),
        );
        for child in &block.children {
            self.adopt(child, Some(&block.id));
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of blocks in the tree.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no blocks.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Check if a block exists.
    pub fn contains(&self, id: &BlockId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Get a node by id.
    pub fn get(&self, id: &BlockId) -> Option<&Node> {
        self.nodes.get(id).map(|n| n.as_ref())
    }

    /// Top-level ids in order.
    pub fn roots(&self) -> &[BlockId] {
        &self.roots
    }

    /// The ordered list a parent owns (`None` = root list).
    ///
    /// Returns `None` when `parent` names a block that doesn't exist.
    pub fn siblings(&self, parent: Option<&BlockId>) -> Option<&[BlockId]> {
        match parent {
            None => Some(&self.roots),
            Some(pid) => self.get(pid).map(|n| n.children()),
        }
    }

    /// Parent of a block (None for roots and unknown ids).
    pub fn parent(&self, id: &BlockId) -> Option<&BlockId> {
        self.get(id).and_then(|n| n.parent())
    }

    /// Index of a block within its own sibling list.
    pub fn index_of(&self, id: &BlockId) -> Option<usize> {
        let node = self.get(id)?;
        self.siblings(node.parent())?
            .iter()
            .position(|sibling| sibling == id)
    }

    /// Current position of a block.
    pub fn position_of(&self, id: &BlockId) -> Option<Position> {
        let index = self.index_of(id)?;
        Some(Position {
            index,
            parent_id: self.parent(id).cloned(),
        })
    }

    /// Ancestors of a block, immediate parent first.
    ///
    /// Circuit-breaks at `MAX_DEPTH`.
    pub fn ancestors(&self, id: &BlockId) -> Vec<BlockId> {
        let mut ancestors = Vec::new();
        let mut current = self.parent(id);

        while let Some(pid) = current {
            if ancestors.len() >= MAX_DEPTH {
                tracing::warn!("ancestors() hit MAX_DEPTH ({MAX_DEPTH}), truncating");
                break;
            }
            ancestors.push(pid.clone());
            current = self.parent(pid);
        }

        ancestors
    }

    /// Depth of a block (0 for roots).
    pub fn depth(&self, id: &BlockId) -> usize {
        self.ancestors(id).len()
    }

    /// Check whether `ancestor` is a strict ancestor of `id`.
    pub fn is_ancestor(&self, ancestor: &BlockId, id: &BlockId) -> bool {
        self.ancestors(id).iter().any(|a| a == ancestor)
    }

    /// Check whether `id` is `root` or lies anywhere beneath it.
    ///
    /// Walks the whole parent chain, bounded only by the tree size.
    fn within(&self, id: &BlockId, root: &BlockId) -> bool {
        let mut current = Some(id);
        for _ in 0..=self.nodes.len() {
            match current {
                Some(next) if next == root => return true,
                Some(next) => current = self.parent(next),
                None => return false,
            }
        }
        false
    }

    /// Levels below a block (0 for a leaf or an unknown id).
    pub fn height(&self, id: &BlockId) -> usize {
        let Some(node) = self.get(id) else {
            return 0;
        };
        let mut tallest = 0;
        let mut stack: Vec<(&BlockId, usize)> = node.children().iter().map(|c| (c, 1)).collect();
        while let Some((next, level)) = stack.pop() {
            tallest = tallest.max(level);
            if let Some(child) = self.get(next) {
                stack.extend(child.children().iter().map(|c| (c, level + 1)));
            }
        }
        tallest
    }

    /// All descendants of a block in depth-first pre-order (excluding itself).
    pub fn descendants(&self, id: &BlockId) -> Vec<BlockId> {
        let mut result = Vec::new();
        let Some(node) = self.get(id) else {
            return result;
        };
        let mut stack: Vec<&BlockId> = node.children().iter().rev().collect();

        while let Some(next) = stack.pop() {
            result.push(next.clone());
            if let Some(child) = self.get(next) {
                stack.extend(child.children().iter().rev());
            }
        }

        result
    }

    /// Every id in depth-first pre-order, i.e. the order blocks appear on
    /// the page.
    pub fn document_order(&self) -> Vec<BlockId> {
        let mut result = Vec::with_capacity(self.len());
        let mut stack: Vec<&BlockId> = self.roots.iter().rev().collect();

        while let Some(next) = stack.pop() {
            result.push(next.clone());
            if let Some(node) = self.get(next) {
                stack.extend(node.children().iter().rev());
            }
        }

        result
    }

    /// Nested record of one block and everything under it.
    pub fn subtree(&self, id: &BlockId) -> Option<Block> {
        let node = self.get(id)?;
        let mut block = node.to_block();
        block.children = node
            .children()
            .iter()
            .filter_map(|child| self.subtree(child))
            .collect();
        Some(block)
    }

    /// The whole tree as nested records.
    pub fn to_blocks(&self) -> Vec<Block> {
        self.roots.iter().filter_map(|id| self.subtree(id)).collect()
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Mutable access to a node's content fields.
    ///
    /// Copies the node if it is shared with another snapshot.
    pub fn node_mut(&mut self, id: &BlockId) -> Option<&mut Node> {
        self.nodes.get_mut(id).map(Arc::make_mut)
    }

    fn siblings_mut(&mut self, parent: Option<&BlockId>) -> Option<&mut Vec<BlockId>> {
        match parent {
            None => Some(&mut self.roots),
            Some(pid) => self
                .nodes
                .get_mut(pid)
                .map(|n| &mut Arc::make_mut(n).children),
        }
    }

    /// Insert a block (with its descendants) at a position.
    pub fn insert_subtree(&mut self, block: &Block, at: &Position) -> Result<()> {
        let len = self
            .siblings(at.parent_id.as_ref())
            .ok_or_else(|| unknown(at.parent_id.as_ref()))?
            .len();
        if at.index > len {
            return Err(TreeError::IndexOutOfBounds {
                index: at.index,
                len,
            });
        }

        let base_depth = at
            .parent_id
            .as_ref()
            .map(|p| self.depth(p) + 1)
            .unwrap_or(0);
        let mut seen = HashSet::new();
        validate_subtree(block, &mut seen, base_depth)?;
        if let Some(taken) = seen.iter().find(|id| self.contains(id)) {
            return Err(TreeError::DuplicateId((*taken).clone()));
        }

        self.adopt(block, at.parent_id.as_ref());
        if let Some(list) = self.siblings_mut(at.parent_id.as_ref()) {
            list.insert(at.index, block.id.clone());
        }
        Ok(())
    }

    /// Detach a block and all its descendants, returning them as a record.
    pub fn remove_subtree(&mut self, id: &BlockId) -> Result<Block> {
        let detached = self
            .subtree(id)
            .ok_or_else(|| TreeError::UnknownBlock(id.clone()))?;
        let parent = self.parent(id).cloned();
        let doomed = self.descendants(id);

        if let Some(list) = self.siblings_mut(parent.as_ref()) {
            list.retain(|sibling| sibling != id);
        }
        self.nodes.remove(id);
        for descendant in doomed {
            self.nodes.remove(&descendant);
        }
        Ok(detached)
    }

    /// Move a block to `to`, where `to.index` is its final index in the
    /// destination list.
    ///
    /// Returns `Ok(false)` when the block is already there.
    pub fn move_to(&mut self, id: &BlockId, to: &Position) -> Result<bool> {
        let from = self
            .position_of(id)
            .ok_or_else(|| TreeError::UnknownBlock(id.clone()))?;

        if let Some(pid) = &to.parent_id {
            if !self.contains(pid) {
                return Err(TreeError::UnknownBlock(pid.clone()));
            }
            if self.within(pid, id) {
                return Err(TreeError::Cycle {
                    id: id.clone(),
                    parent: pid.clone(),
                });
            }
        }

        let new_depth = to.parent_id.as_ref().map_or(0, |p| self.depth(p) + 1);
        if new_depth + self.height(id) > MAX_DEPTH {
            return Err(TreeError::Inconsistent(format!(
                "nesting deeper than {MAX_DEPTH} moving {id}"
            )));
        }

        let same_list = from.parent_id == to.parent_id;
        let dest_len = self
            .siblings(to.parent_id.as_ref())
            .map(|list| list.len())
            .unwrap_or(0)
            - usize::from(same_list);
        if to.index > dest_len {
            return Err(TreeError::IndexOutOfBounds {
                index: to.index,
                len: dest_len,
            });
        }
        if same_list && from.index == to.index {
            return Ok(false);
        }

        if let Some(list) = self.siblings_mut(from.parent_id.as_ref()) {
            list.remove(from.index);
        }
        if let Some(list) = self.siblings_mut(to.parent_id.as_ref()) {
            list.insert(to.index, id.clone());
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = to.parent_id.clone();
        }
        Ok(true)
    }

    /// Full structural check: every node reachable exactly once from the
    /// roots, adjacency consistent, no cycles.
    pub fn check_invariants(&self) -> Result<()> {
        let mut visited: HashSet<&BlockId> = HashSet::new();
        let mut stack: Vec<(&BlockId, Option<&BlockId>, usize)> =
            self.roots.iter().map(|id| (id, None, 0)).collect();

        while let Some((id, expected_parent, depth)) = stack.pop() {
            if depth > MAX_DEPTH {
                return Err(TreeError::Inconsistent(format!(
                    "nesting deeper than {MAX_DEPTH} at {id}"
                )));
            }
            if !visited.insert(id) {
                return Err(TreeError::DuplicateId(id.clone()));
            }
            let node = self
                .get(id)
                .ok_or_else(|| TreeError::Inconsistent(format!("dangling reference to {id}")))?;
            if node.parent() != expected_parent {
                return Err(TreeError::Inconsistent(format!(
                    "{id} lists parent {:?} but is held by {:?}",
                    node.parent(),
                    expected_parent
                )));
            }
            for child in node.children() {
                stack.push((child, Some(id), depth + 1));
            }
        }

        if visited.len() != self.nodes.len() {
            return Err(TreeError::Inconsistent(format!(
                "{} blocks unreachable from the root list",
                self.nodes.len() - visited.len()
            )));
        }
        Ok(())
    }
}

fn unknown(parent: Option<&BlockId>) -> TreeError {
    TreeError::UnknownBlock(parent.cloned().unwrap_or_else(|| BlockId::new("")))
}

/// Collect ids of a nested record, rejecting duplicates and runaway depth.
fn validate_subtree<'a>(
    block: &'a Block,
    seen: &mut HashSet<&'a BlockId>,
    depth: usize,
) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(TreeError::Inconsistent(format!(
            "nesting deeper than {MAX_DEPTH} at {}",
            block.id
        )));
    }
    if !seen.insert(&block.id) {
        return Err(TreeError::DuplicateId(block.id.clone()));
    }
    for child in &block.children {
        validate_subtree(child, seen, depth + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> BlockId {
        BlockId::new(s)
    }

    fn sample() -> Tree {
        Tree::from_blocks(&[
            Block::new("a", "text"),
            Block::new("s", "section").with_children(vec![
                Block::new("s1", "text"),
                Block::new("s2", "columns").with_children(vec![Block::new("c1", "text")]),
            ]),
            Block::new("b", "text"),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_blocks_round_trips() {
        let blocks = vec![
            Block::new("a", "text").with_attr("body", "hi"),
            Block::new("s", "section").with_children(vec![Block::new("s1", "text")]),
        ];
        let tree = Tree::from_blocks(&blocks).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.to_blocks(), blocks);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_from_blocks_rejects_duplicate_ids_anywhere() {
        let err = Tree::from_blocks(&[
            Block::new("a", "text"),
            Block::new("s", "section").with_children(vec![Block::new("a", "text")]),
        ])
        .unwrap_err();
        assert_eq!(err, TreeError::DuplicateId(id("a")));
    }

    #[test]
    fn test_queries() {
        let tree = sample();
        assert_eq!(tree.roots(), &[id("a"), id("s"), id("b")]);
        assert_eq!(tree.index_of(&id("b")), Some(2));
        assert_eq!(tree.index_of(&id("s2")), Some(1));
        assert_eq!(tree.parent(&id("c1")), Some(&id("s2")));
        assert_eq!(tree.ancestors(&id("c1")), vec![id("s2"), id("s")]);
        assert_eq!(tree.depth(&id("c1")), 2);
        assert!(tree.is_ancestor(&id("s"), &id("c1")));
        assert!(!tree.is_ancestor(&id("c1"), &id("s")));
        assert_eq!(tree.descendants(&id("s")), vec![id("s1"), id("s2"), id("c1")]);
        assert_eq!(
            tree.document_order(),
            vec![id("a"), id("s"), id("s1"), id("s2"), id("c1"), id("b")]
        );
        assert_eq!(tree.position_of(&id("s1")), Some(Position::inside("s", 0)));
        assert_eq!(tree.siblings(Some(&id("missing"))), None);
    }

    #[test]
    fn test_insert_subtree_checks_before_mutating() {
        let mut tree = sample();
        let before = tree.clone();

        let dup = Block::new("new", "section").with_children(vec![Block::new("c1", "text")]);
        assert_eq!(
            tree.insert_subtree(&dup, &Position::root(0)),
            Err(TreeError::DuplicateId(id("c1")))
        );
        assert_eq!(
            tree.insert_subtree(&Block::new("x", "text"), &Position::root(9)),
            Err(TreeError::IndexOutOfBounds { index: 9, len: 3 })
        );
        assert_eq!(tree, before);

        tree.insert_subtree(&Block::new("x", "text"), &Position::inside("s", 1))
            .unwrap();
        assert_eq!(tree.get(&id("s")).unwrap().children(), &[id("s1"), id("x"), id("s2")]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_remove_subtree_drops_descendants() {
        let mut tree = sample();
        let removed = tree.remove_subtree(&id("s")).unwrap();
        assert_eq!(removed.subtree_len(), 4);
        assert_eq!(tree.len(), 2);
        assert!(!tree.contains(&id("c1")));
        assert_eq!(tree.roots(), &[id("a"), id("b")]);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_move_within_list_uses_final_index() {
        let mut tree = sample();
        assert!(tree.move_to(&id("a"), &Position::root(1)).unwrap());
        assert_eq!(tree.roots(), &[id("s"), id("a"), id("b")]);
        assert!(tree.move_to(&id("a"), &Position::root(2)).unwrap());
        assert_eq!(tree.roots(), &[id("s"), id("b"), id("a")]);
        assert_eq!(
            tree.move_to(&id("a"), &Position::root(3)),
            Err(TreeError::IndexOutOfBounds { index: 3, len: 2 })
        );
    }

    #[test]
    fn test_move_to_current_position_is_noop() {
        let mut tree = sample();
        let before = tree.clone();
        assert!(!tree.move_to(&id("s1"), &Position::inside("s", 0)).unwrap());
        assert_eq!(tree, before);
    }

    #[test]
    fn test_move_across_parents() {
        let mut tree = sample();
        assert!(tree.move_to(&id("c1"), &Position::root(0)).unwrap());
        assert_eq!(tree.parent(&id("c1")), None);
        assert!(tree.get(&id("s2")).unwrap().children().is_empty());
        assert!(tree.move_to(&id("a"), &Position::inside("s2", 0)).unwrap());
        assert_eq!(tree.parent(&id("a")), Some(&id("s2")));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_move_into_own_subtree_is_a_cycle() {
        let mut tree = sample();
        let before = tree.clone();
        assert_eq!(
            tree.move_to(&id("s"), &Position::inside("c1", 0)),
            Err(TreeError::Cycle {
                id: id("s"),
                parent: id("c1")
            })
        );
        assert!(matches!(
            tree.move_to(&id("s"), &Position::inside("s", 0)),
            Err(TreeError::Cycle { .. })
        ));
        assert_eq!(tree, before);
    }

    fn chain(prefix: &str, len: usize) -> Block {
        let mut block = Block::new(format!("{prefix}{}", len - 1), "columns");
        for i in (0..len - 1).rev() {
            block = Block::new(format!("{prefix}{i}"), "columns").with_children(vec![block]);
        }
        block
    }

    #[test]
    fn test_move_rejects_nesting_past_max_depth() {
        let mut tree = Tree::from_blocks(&[chain("a", 300), chain("b", 300)]).unwrap();
        let before = tree.clone();
        assert_eq!(tree.height(&id("b0")), 299);

        assert!(matches!(
            tree.move_to(&id("b0"), &Position::inside("a299", 0)),
            Err(TreeError::Inconsistent(_))
        ));
        assert_eq!(tree, before);

        // A shorter tail still fits.
        assert!(tree.move_to(&id("b100"), &Position::inside("a299", 0)).unwrap());
        tree.check_invariants().unwrap();
    }

    #[test]
    fn test_cycle_check_walks_full_chain() {
        let mut tree = Tree::from_blocks(&[chain("c", MAX_DEPTH + 1)]).unwrap();
        let before = tree.clone();
        let last = id(&format!("c{MAX_DEPTH}"));
        assert_eq!(tree.depth(&last), MAX_DEPTH);

        assert_eq!(
            tree.move_to(&id("c0"), &Position::inside(last.as_str(), 0)),
            Err(TreeError::Cycle {
                id: id("c0"),
                parent: last.clone()
            })
        );
        assert_eq!(tree, before);
    }

    #[test]
    fn test_clone_is_copy_on_write() {
        let original = sample();
        let mut working = original.clone();
        working.node_mut(&id("a")).unwrap().kind = "markdown".into();
        working.move_to(&id("b"), &Position::root(0)).unwrap();

        assert_eq!(original.get(&id("a")).unwrap().kind, "text");
        assert_eq!(original.roots(), &[id("a"), id("s"), id("b")]);
        // Untouched nodes stay shared between snapshots.
        assert!(Arc::ptr_eq(
            original.nodes.get(&id("c1")).unwrap(),
            working.nodes.get(&id("c1")).unwrap()
        ));
    }
}
