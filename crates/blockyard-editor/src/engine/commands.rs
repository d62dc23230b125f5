//! Mutation commands.
//!
//! Each command validates against the working copy before touching it, so
//! a rejected command leaves nothing half-applied even inside the draft.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{Draft, Engine, Outcome, Seed, merge_patch, patch_changes};
use crate::render::Signature;
use crate::{Align, Attributes, Block, BlockId, CommandError, Node, Position, Tree, TreeError};

/// A serializable engine command.
///
/// Wire form is internally tagged: `{"op": "move_up", "id": "b2"}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Insert blocks after `after` in the same list; `None` appends to the root.
    InsertAfter {
        #[serde(default)]
        after: Option<BlockId>,
        blocks: Vec<Block>,
    },
    Remove {
        ids: Vec<BlockId>,
    },
    Duplicate {
        id: BlockId,
    },
    /// Merge attributes; a null value removes the key.
    SetAttributes {
        id: BlockId,
        patch: Attributes,
    },
    SetAlign {
        id: BlockId,
        align: Align,
    },
    ToggleStatus {
        id: BlockId,
    },
    MoveUp {
        id: BlockId,
    },
    MoveDown {
        id: BlockId,
    },
    MoveToPosition {
        id: BlockId,
        position: Position,
    },
    /// Replace the whole tree.
    SetUnits {
        units: Vec<Block>,
    },
    /// Reinstall a previously captured snapshot.
    #[serde(skip)]
    Restore {
        snapshot: Arc<Tree>,
    },
    Select {
        id: BlockId,
    },
    ToggleSelect {
        id: BlockId,
    },
    ClearSelection,
    SelectNext,
    SelectPrevious,
}

impl Command {
    /// Name carried by this command's events.
    pub fn name(&self) -> &'static str {
        match self {
            Command::InsertAfter { .. } => "insert_after",
            Command::Remove { .. } => "remove",
            Command::Duplicate { .. } => "duplicate",
            Command::SetAttributes { .. } => "set_attributes",
            Command::SetAlign { .. } => "set_align",
            Command::ToggleStatus { .. } => "toggle_status",
            Command::MoveUp { .. } => "move_up",
            Command::MoveDown { .. } => "move_down",
            Command::MoveToPosition { .. } => "move_to_position",
            Command::SetUnits { .. } => "set_units",
            Command::Restore { .. } => "restore",
            Command::Select { .. } => "select",
            Command::ToggleSelect { .. } => "toggle_select",
            Command::ClearSelection => "clear_selection",
            Command::SelectNext => "select_next",
            Command::SelectPrevious => "select_previous",
        }
    }
}

impl Engine {
    /// Apply a command value.
    pub fn dispatch(&mut self, command: Command) -> Outcome {
        match command {
            Command::InsertAfter { after, blocks } => self.insert_after(after.as_ref(), blocks),
            Command::Remove { ids } => self.remove(&ids),
            Command::Duplicate { id } => self.duplicate(&id),
            Command::SetAttributes { id, patch } => self.set_attributes(&id, patch),
            Command::SetAlign { id, align } => self.set_align(&id, align),
            Command::ToggleStatus { id } => self.toggle_status(&id),
            Command::MoveUp { id } => self.move_up(&id),
            Command::MoveDown { id } => self.move_down(&id),
            Command::MoveToPosition { id, position } => self.move_to_position(&id, position),
            Command::SetUnits { units } => self.set_units(units),
            Command::Restore { snapshot } => self.restore(snapshot),
            Command::Select { id } => self.select(&id),
            Command::ToggleSelect { id } => self.toggle_select(&id),
            Command::ClearSelection => self.clear_selection(),
            Command::SelectNext => self.select_next(),
            Command::SelectPrevious => self.select_previous(),
        }
    }

    // =========================================================================
    // Structure
    // =========================================================================

    /// Insert `blocks` (with their children) right after `after`, in its
    /// sibling list. Blocks with an empty id get a fresh one.
    pub fn insert_after(&mut self, after: Option<&BlockId>, mut blocks: Vec<Block>) -> Outcome {
        for block in &mut blocks {
            assign_missing_ids(block);
        }
        let mut seeds = Vec::new();
        for block in &mut blocks {
            take_seeds(block, &mut seeds);
        }

        let outcome = self.transact("insert_after", |engine, draft| {
            let at = match after {
                Some(id) => {
                    let pos = draft
                        .tree
                        .position_of(id)
                        .ok_or_else(|| CommandError::unknown(id))?;
                    Position {
                        index: pos.index + 1,
                        parent_id: pos.parent_id,
                    }
                }
                None => Position::root(draft.tree.roots().len()),
            };
            if let Some(parent) = &at.parent_id {
                engine.check_nesting(&draft.tree, parent)?;
            }

            for (offset, block) in blocks.iter().enumerate() {
                engine.check_insertable(&draft.tree, block)?;
                let position = Position {
                    index: at.index + offset,
                    parent_id: at.parent_id.clone(),
                };
                draft.tree.insert_subtree(block, &position)?;
            }
            Ok(!blocks.is_empty())
        });

        if outcome.is_applied() {
            self.seeds.extend(seeds);
        }
        outcome
    }

    /// Remove blocks and all their descendants.
    ///
    /// Unknown ids are skipped; the command is rejected only when none of
    /// the ids exist.
    pub fn remove(&mut self, ids: &[BlockId]) -> Outcome {
        self.transact("remove", |_, draft| {
            let Some(first) = ids.first() else {
                return Ok(false);
            };
            if ids.iter().all(|id| !draft.tree.contains(id)) {
                return Err(CommandError::unknown(first));
            }

            let mut removed = 0usize;
            for id in ids {
                // Already gone with an ancestor removed earlier in the batch.
                if !draft.tree.contains(id) {
                    continue;
                }
                let block = draft.tree.remove_subtree(id)?;
                removed += block.subtree_len();
            }
            tracing::debug!(removed, "removed blocks");
            Ok(true)
        })
    }

    /// Copy a block (fresh ids throughout, anchors cleared) right after it.
    pub fn duplicate(&mut self, id: &BlockId) -> Outcome {
        self.transact("duplicate", |engine, draft| {
            let node = draft.tree.get(id).ok_or_else(|| CommandError::unknown(id))?;
            engine.check_duplicable(node, &draft.tree)?;

            let mut copy = draft
                .tree
                .subtree(id)
                .ok_or_else(|| CommandError::unknown(id))?;
            reassign_ids(&mut copy);

            let pos = draft
                .tree
                .position_of(id)
                .ok_or_else(|| CommandError::unknown(id))?;
            let at = Position {
                index: pos.index + 1,
                parent_id: pos.parent_id,
            };
            draft.tree.insert_subtree(&copy, &at)?;
            Ok(true)
        })
    }

    /// Merge an attribute patch. Unchanged if every value already matches.
    pub fn set_attributes(&mut self, id: &BlockId, patch: Attributes) -> Outcome {
        self.transact("set_attributes", |_, draft| {
            let node = draft.tree.get(id).ok_or_else(|| CommandError::unknown(id))?;
            if !patch_changes(&node.attributes, &patch) {
                return Ok(false);
            }
            if let Some(node) = draft.tree.node_mut(id) {
                merge_patch(&mut node.attributes, patch);
            }
            Ok(true)
        })
    }

    /// Realign a block. `Align::None` is always accepted; anything else must
    /// be among the type's options for the engine's layout version.
    pub fn set_align(&mut self, id: &BlockId, align: Align) -> Outcome {
        self.transact("set_align", |engine, draft| {
            let node = draft.tree.get(id).ok_or_else(|| CommandError::unknown(id))?;
            if node.align == align {
                return Ok(false);
            }
            if align != Align::None && !engine.align_options_for(&node.kind).contains(&align) {
                return Err(CommandError::CapabilityDenied {
                    id: id.clone(),
                    kind: node.kind.clone(),
                    capability: "align",
                });
            }
            if let Some(node) = draft.tree.node_mut(id) {
                node.align = align;
            }
            Ok(true)
        })
    }

    /// Flip a block between open and close.
    pub fn toggle_status(&mut self, id: &BlockId) -> Outcome {
        self.transact("toggle_status", |_, draft| {
            let node = draft
                .tree
                .node_mut(id)
                .ok_or_else(|| CommandError::unknown(id))?;
            node.status = node.status.toggled();
            Ok(true)
        })
    }

    /// Swap a block with its previous sibling. Unchanged when already first.
    pub fn move_up(&mut self, id: &BlockId) -> Outcome {
        self.transact("move_up", |_, draft| {
            let pos = draft
                .tree
                .position_of(id)
                .ok_or_else(|| CommandError::unknown(id))?;
            if pos.index == 0 {
                return Ok(false);
            }
            let to = Position {
                index: pos.index - 1,
                parent_id: pos.parent_id,
            };
            Ok(draft.tree.move_to(id, &to)?)
        })
    }

    /// Swap a block with its next sibling. Unchanged when already last.
    pub fn move_down(&mut self, id: &BlockId) -> Outcome {
        self.transact("move_down", |_, draft| {
            let pos = draft
                .tree
                .position_of(id)
                .ok_or_else(|| CommandError::unknown(id))?;
            let len = draft
                .tree
                .siblings(pos.parent_id.as_ref())
                .map_or(0, <[BlockId]>::len);
            if pos.index + 1 >= len {
                return Ok(false);
            }
            let to = Position {
                index: pos.index + 1,
                parent_id: pos.parent_id,
            };
            Ok(draft.tree.move_to(id, &to)?)
        })
    }

    /// Move a block to `position` (final index in the destination list).
    ///
    /// Changing parent requires the block's `move_hierarchy` capability and
    /// a destination parent whose type accepts children.
    pub fn move_to_position(&mut self, id: &BlockId, position: Position) -> Outcome {
        self.transact("move_to_position", |engine, draft| {
            let node = draft.tree.get(id).ok_or_else(|| CommandError::unknown(id))?;
            if node.parent() != position.parent_id.as_ref() {
                if !engine.capabilities_allow_move(node) {
                    return Err(CommandError::CapabilityDenied {
                        id: id.clone(),
                        kind: node.kind.clone(),
                        capability: "move_hierarchy",
                    });
                }
                if let Some(parent) = &position.parent_id {
                    engine.check_nesting(&draft.tree, parent)?;
                }
            }
            Ok(draft.tree.move_to(id, &position)?)
        })
    }

    /// Replace the tree with `units`. Selection keeps only surviving ids.
    pub fn set_units(&mut self, units: Vec<Block>) -> Outcome {
        let mut seeds = Vec::new();
        let mut units = units;
        for block in &mut units {
            take_seeds(block, &mut seeds);
        }

        let outcome = self.transact("set_units", |_, draft| {
            let tree = Tree::from_blocks(&units)?;
            if tree == draft.tree {
                return Ok(false);
            }
            draft.tree = tree;
            Ok(true)
        });
        if outcome.is_applied() {
            self.seeds.extend(seeds);
        }
        outcome
    }

    /// Reinstall a captured snapshot.
    pub fn restore(&mut self, snapshot: Arc<Tree>) -> Outcome {
        self.transact("restore", |_, draft| {
            if *snapshot == draft.tree {
                return Ok(false);
            }
            draft.tree = Tree::clone(&snapshot);
            Ok(true)
        })
    }

    // =========================================================================
    // Selection
    // =========================================================================

    /// Make `id` the only selected block.
    pub fn select(&mut self, id: &BlockId) -> Outcome {
        self.transact("select", |_, draft| {
            if !draft.tree.contains(id) {
                return Err(CommandError::unknown(id));
            }
            if draft.selection.len() == 1 && draft.selection.contains(id) {
                return Ok(false);
            }
            draft.selection.clear();
            draft.selection.insert(id.clone());
            Ok(true)
        })
    }

    /// Add `id` to the selection, or remove it if already selected.
    pub fn toggle_select(&mut self, id: &BlockId) -> Outcome {
        self.transact("toggle_select", |_, draft| {
            if !draft.tree.contains(id) {
                return Err(CommandError::unknown(id));
            }
            if !draft.selection.shift_remove(id) {
                draft.selection.insert(id.clone());
            }
            Ok(true)
        })
    }

    pub fn clear_selection(&mut self) -> Outcome {
        self.transact("clear_selection", |_, draft| {
            if draft.selection.is_empty() {
                return Ok(false);
            }
            draft.selection.clear();
            Ok(true)
        })
    }

    /// Select the block after the most recently selected one, in document
    /// order. With nothing selected, selects the first block.
    pub fn select_next(&mut self) -> Outcome {
        self.transact("select_next", |_, draft| Ok(step_selection(draft, 1)))
    }

    /// Select the block before the most recently selected one.
    pub fn select_previous(&mut self) -> Outcome {
        self.transact("select_previous", |_, draft| Ok(step_selection(draft, -1)))
    }

    // =========================================================================
    // Precondition helpers
    // =========================================================================

    /// Destination parent must exist and accept children.
    fn check_nesting(&self, tree: &Tree, parent: &BlockId) -> Result<(), CommandError> {
        let node = tree.get(parent).ok_or_else(|| CommandError::unknown(parent))?;
        if !self.registry.is_nested(&node.kind) {
            return Err(CommandError::NestingForbidden {
                parent: parent.clone(),
                kind: node.kind.clone(),
            });
        }
        Ok(())
    }

    /// An incoming subtree must respect single-instance types and only
    /// carry children under nesting types.
    fn check_insertable(&self, tree: &Tree, block: &Block) -> Result<(), CommandError> {
        let mut result = Ok(());
        let mut incoming: Vec<&str> = Vec::new();
        block.walk(&mut |b| {
            if result.is_err() {
                return;
            }
            if !b.children.is_empty() && !self.registry.is_nested(&b.kind) {
                result = Err(CommandError::NestingForbidden {
                    parent: b.id.clone(),
                    kind: b.kind.clone(),
                });
                return;
            }
            if !self.registry.allows_multiple(&b.kind)
                && (incoming.contains(&b.kind.as_str()) || count_kind(tree, &b.kind) > 0)
            {
                result = Err(CommandError::SingleInstance {
                    kind: b.kind.clone(),
                });
                return;
            }
            incoming.push(&b.kind);
        });
        result
    }

    /// Duplicate capability for a node and everything under it.
    pub(crate) fn check_duplicable(&self, node: &Node, tree: &Tree) -> Result<(), CommandError> {
        if let Some(descriptor) = self.registry.lookup(&node.kind)
            && !descriptor.capabilities.allows_duplicate(node, self)
        {
            return Err(CommandError::CapabilityDenied {
                id: node.id.clone(),
                kind: node.kind.clone(),
                capability: "duplicate",
            });
        }
        for id in std::iter::once(&node.id).chain(tree.descendants(&node.id).iter()) {
            if let Some(n) = tree.get(id)
                && !self.registry.allows_multiple(&n.kind)
            {
                return Err(CommandError::SingleInstance {
                    kind: n.kind.clone(),
                });
            }
        }
        Ok(())
    }

    fn capabilities_allow_move(&self, node: &Node) -> bool {
        self.registry
            .lookup(&node.kind)
            .is_none_or(|d| d.capabilities.allows_move_hierarchy(node, self))
    }

    pub(crate) fn align_options_for(&self, kind: &str) -> Vec<Align> {
        self.registry
            .lookup(kind)
            .map(|d| d.capabilities.align_options(self.align_version))
            .unwrap_or_default()
    }
}

fn count_kind(tree: &Tree, kind: &str) -> usize {
    tree.document_order()
        .iter()
        .filter(|id| tree.get(id).is_some_and(|n| n.kind == kind))
        .count()
}

fn assign_missing_ids(block: &mut Block) {
    if block.id.is_empty() {
        block.id = BlockId::generate();
    }
    for child in &mut block.children {
        assign_missing_ids(child);
    }
}

fn reassign_ids(block: &mut Block) {
    block.id = BlockId::generate();
    block.anchor = None;
    block.seed_fragment = None;
    for child in &mut block.children {
        reassign_ids(child);
    }
}

fn take_seeds(block: &mut Block, out: &mut Vec<(BlockId, Seed)>) {
    if let Some(seed) = block.seed_fragment.take() {
        let signature = Signature::of(&block.kind, &block.id, &block.attributes);
        out.push((block.id.clone(), (signature, seed)));
    }
    for child in &mut block.children {
        take_seeds(child, out);
    }
}

fn step_selection(draft: &mut Draft, step: isize) -> bool {
    let order = draft.tree.document_order();
    if order.is_empty() {
        return false;
    }
    let next = match draft.selection.last() {
        None if step > 0 => Some(0),
        None => Some(order.len() - 1),
        Some(current) => order
            .iter()
            .position(|id| id == current)
            .and_then(|i| i.checked_add_signed(step))
            .filter(|&i| i < order.len()),
    };
    let Some(next) = next else {
        return false;
    };
    let id = order[next].clone();
    if draft.selection.len() == 1 && draft.selection.contains(&id) {
        return false;
    }
    draft.selection.clear();
    draft.selection.insert(id);
    true
}

impl From<TreeError> for Outcome {
    fn from(error: TreeError) -> Self {
        Outcome::Rejected(error.into())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::registry::BlockRegistry;
    use crate::{EngineEvent, Status, Topic};

    fn engine(blocks: Vec<Block>) -> Engine {
        Engine::hydrate(Arc::new(BlockRegistry::builtin()), &blocks).unwrap()
    }

    fn abc() -> Engine {
        engine(vec![
            Block::new("a", "text"),
            Block::new("b", "text"),
            Block::new("c", "text"),
        ])
    }

    fn root_ids(engine: &Engine) -> Vec<&str> {
        engine.units().roots().iter().map(BlockId::as_str).collect()
    }

    fn id(s: &str) -> BlockId {
        BlockId::new(s)
    }

    #[test]
    fn test_insert_after_and_append() {
        let mut e = abc();
        assert!(e.insert_after(Some(&id("a")), vec![Block::new("x", "text")]).is_applied());
        assert_eq!(root_ids(&e), vec!["a", "x", "b", "c"]);

        assert!(e.insert_after(None, vec![Block::new("", "markdown")]).is_applied());
        assert_eq!(e.units().len(), 5);
        let last = e.units().roots().last().unwrap();
        assert!(!last.is_empty());
        assert_eq!(e.units().get(last).unwrap().kind, "markdown");
    }

    #[test]
    fn test_insert_respects_single_instance_and_nesting() {
        let mut e = engine(vec![Block::new("m", "module"), Block::new("t", "text")]);
        let outcome = e.insert_after(Some(&id("t")), vec![Block::new("m2", "module")]);
        assert_eq!(
            outcome,
            Outcome::Rejected(CommandError::SingleInstance {
                kind: "module".into()
            })
        );

        let outcome = e.insert_after(
            None,
            vec![Block::new("t2", "text").with_children(vec![Block::new("t3", "text")])],
        );
        assert!(matches!(
            outcome,
            Outcome::Rejected(CommandError::NestingForbidden { .. })
        ));
        assert_eq!(e.units().len(), 2);
    }

    #[test]
    fn test_insert_duplicate_id_rejected() {
        let mut e = abc();
        let outcome = e.insert_after(None, vec![Block::new("b", "text")]);
        assert_eq!(outcome, Outcome::from(TreeError::DuplicateId(id("b"))));
        assert_eq!(root_ids(&e), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_takes_descendants_and_prunes_selection() {
        let mut e = engine(vec![
            Block::new("s", "section").with_children(vec![Block::new("t", "text")]),
            Block::new("u", "text"),
        ]);
        e.select(&id("t"));
        assert!(e.remove(&[id("s"), id("t"), id("ghost")]).is_applied());
        assert_eq!(root_ids(&e), vec!["u"]);
        assert!(e.selection().is_empty());

        assert!(e.remove(&[id("ghost")]).is_rejected());
        assert_eq!(e.remove(&[]), Outcome::Unchanged);
    }

    #[test]
    fn test_duplicate_fresh_ids_and_cleared_anchor() {
        let mut original = Block::new("s", "section").with_children(vec![Block::new("t", "text")]);
        original.anchor = Some("intro".into());
        let mut e = engine(vec![original, Block::new("z", "text")]);

        assert!(e.duplicate(&id("s")).is_applied());
        let roots = e.units().roots().to_vec();
        assert_eq!(roots.len(), 3);
        assert_eq!(roots[0].as_str(), "s");
        assert_eq!(roots[2].as_str(), "z");

        let copy = e.units().get(&roots[1]).unwrap();
        assert_ne!(copy.id, id("s"));
        assert_eq!(copy.kind, "section");
        assert_eq!(copy.anchor, None);
        assert_eq!(copy.children().len(), 1);
        assert_ne!(copy.children()[0], id("t"));
        assert!(e.units().check_invariants().is_ok());
    }

    #[test]
    fn test_duplicate_single_instance_denied() {
        let mut e = engine(vec![Block::new("m", "module")]);
        assert!(e.duplicate(&id("m")).is_rejected());
        assert_eq!(e.units().len(), 1);
    }

    #[test]
    fn test_set_attributes_merge_and_remove() {
        let mut e = engine(vec![Block::new("a", "text").with_attr("title", "hi").with_attr("x", 1)]);

        let mut patch = Attributes::new();
        patch.insert("title".into(), "hi".into());
        assert_eq!(e.set_attributes(&id("a"), patch.clone()), Outcome::Unchanged);

        patch.insert("x".into(), serde_json::Value::Null);
        patch.insert("body".into(), "text".into());
        assert!(e.set_attributes(&id("a"), patch).is_applied());

        let attrs = &e.units().get(&id("a")).unwrap().attributes;
        assert_eq!(attrs.get("body"), Some(&serde_json::json!("text")));
        assert!(!attrs.contains_key("x"));
    }

    #[test]
    fn test_set_align_checks_options() {
        let mut e = engine(vec![Block::new("m", "media"), Block::new("t", "text")]);
        assert!(e.set_align(&id("m"), Align::Wide).is_applied());
        assert!(e.set_align(&id("m"), Align::Left).is_rejected());
        assert!(e.set_align(&id("t"), Align::Full).is_rejected());
        assert_eq!(e.set_align(&id("t"), Align::None), Outcome::Unchanged);
    }

    #[test]
    fn test_toggle_status() {
        let mut e = abc();
        assert!(e.toggle_status(&id("b")).is_applied());
        assert_eq!(e.units().get(&id("b")).unwrap().status, Status::Close);
        assert!(e.toggle_status(&id("b")).is_applied());
        assert_eq!(e.units().get(&id("b")).unwrap().status, Status::Open);
    }

    #[test]
    fn test_move_up_down_boundaries() {
        let mut e = abc();
        assert_eq!(e.move_up(&id("a")), Outcome::Unchanged);
        assert_eq!(e.move_down(&id("c")), Outcome::Unchanged);
        assert!(e.move_down(&id("a")).is_applied());
        assert_eq!(root_ids(&e), vec!["b", "a", "c"]);
        assert!(e.move_up(&id("c")).is_applied());
        assert_eq!(root_ids(&e), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_move_to_current_position_emits_nothing() {
        let mut e = abc();
        let fired = Rc::new(RefCell::new(0));
        let f = fired.clone();
        e.subscribe(Topic::Transaction, move |_| *f.borrow_mut() += 1);

        assert_eq!(e.move_to_position(&id("b"), Position::root(1)), Outcome::Unchanged);
        assert_eq!(*fired.borrow(), 0);

        assert!(e.move_to_position(&id("a"), Position::root(2)).is_applied());
        assert_eq!(root_ids(&e), vec!["b", "c", "a"]);
        assert_eq!(*fired.borrow(), 1);
    }

    #[test]
    fn test_move_into_non_nesting_parent_rejected() {
        let mut e = abc();
        let outcome = e.move_to_position(&id("a"), Position::inside("b", 0));
        assert!(matches!(
            outcome,
            Outcome::Rejected(CommandError::NestingForbidden { .. })
        ));
    }

    #[test]
    fn test_move_hierarchy_capability() {
        let mut e = engine(vec![
            Block::new("outer", "section").with_children(vec![Block::new("inner", "section")]),
            Block::new("cols", "columns"),
        ]);
        // Nested sections may not change parent.
        let outcome = e.move_to_position(&id("inner"), Position::root(0));
        assert!(matches!(
            outcome,
            Outcome::Rejected(CommandError::CapabilityDenied {
                capability: "move_hierarchy",
                ..
            })
        ));
        // Top-level sections may.
        assert!(e.move_to_position(&id("outer"), Position::inside("cols", 0)).is_applied());
    }

    #[test]
    fn test_move_cycle_rejected() {
        let mut e = engine(vec![
            Block::new("c1", "columns").with_children(vec![Block::new("c2", "columns")]),
        ]);
        let outcome = e.move_to_position(&id("c1"), Position::inside("c2", 0));
        assert!(matches!(
            outcome,
            Outcome::Rejected(CommandError::Tree(TreeError::Cycle { .. }))
        ));
        assert!(e.units().check_invariants().is_ok());
    }

    #[test]
    fn test_move_past_max_depth_rejected() {
        fn chain(prefix: &str, len: usize) -> Block {
            let mut block = Block::new(format!("{prefix}{}", len - 1), "columns");
            for i in (0..len - 1).rev() {
                block = Block::new(format!("{prefix}{i}"), "columns").with_children(vec![block]);
            }
            block
        }
        let mut e = engine(vec![chain("a", 300), chain("b", 300)]);
        let before = e.snapshot();

        let outcome = e.move_to_position(&id("b0"), Position::inside("a299", 0));
        assert!(matches!(
            outcome,
            Outcome::Rejected(CommandError::Tree(TreeError::Inconsistent(_)))
        ));
        assert_eq!(*e.snapshot(), *before);

        let outcome = e.move_to_position(&id("a0"), Position::inside("b299", 0));
        assert!(outcome.is_rejected());
        assert!(e.units().check_invariants().is_ok());
        assert_eq!(e.units().roots().len(), 2);
    }

    #[test]
    fn test_set_units_round_trip() {
        let mut e = abc();
        let units = vec![
            Block::new("x", "columns").with_children(vec![Block::new("y", "text")]),
            Block::new("z", "map"),
        ];
        assert!(e.set_units(units.clone()).is_applied());
        assert_eq!(e.units().to_blocks(), units);
        assert_eq!(e.set_units(units), Outcome::Unchanged);
    }

    #[test]
    fn test_restore_snapshot() {
        let mut e = abc();
        let snapshot = e.snapshot();
        e.remove(&[id("a"), id("b")]);
        assert!(e.restore(snapshot.clone()).is_applied());
        assert_eq!(*e.snapshot(), *snapshot);
    }

    #[test]
    fn test_selection_commands() {
        let mut e = abc();
        assert!(e.select_next().is_applied());
        assert_eq!(e.selection().iter().collect::<Vec<_>>(), vec![&id("a")]);
        assert!(e.select_next().is_applied());
        assert!(e.select_next().is_applied());
        assert_eq!(e.select_next(), Outcome::Unchanged);
        assert!(e.is_selected(&id("c")));

        assert!(e.select_previous().is_applied());
        assert!(e.is_selected(&id("b")));
        assert_eq!(e.select(&id("b")), Outcome::Unchanged);

        assert!(e.toggle_select(&id("a")).is_applied());
        assert_eq!(e.selection().len(), 2);
        assert!(e.toggle_select(&id("b")).is_applied());
        assert_eq!(e.selection().iter().collect::<Vec<_>>(), vec![&id("a")]);

        assert!(e.clear_selection().is_applied());
        assert_eq!(e.clear_selection(), Outcome::Unchanged);
        assert!(e.select(&id("ghost")).is_rejected());
    }

    #[test]
    fn test_rejection_emits_error_event() {
        let mut e = abc();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        e.subscribe(Topic::Error, move |event| {
            if let EngineEvent::Error { command, .. } = event {
                sink.borrow_mut().push(*command);
            }
        });
        assert!(e.duplicate(&id("ghost")).is_rejected());
        assert_eq!(*errors.borrow(), vec!["duplicate"]);
    }

    #[test]
    fn test_command_wire_format() {
        let json = r#"[
            {"op": "move_up", "id": "b"},
            {"op": "insert_after", "after": "a", "blocks": [{"id": "n", "type": "text"}]},
            {"op": "select_next"}
        ]"#;
        let commands: Vec<Command> = serde_json::from_str(json).unwrap();
        assert_eq!(commands[0], Command::MoveUp { id: id("b") });
        assert_eq!(commands[2].name(), "select_next");

        let mut e = abc();
        let outcomes: Vec<_> = commands.into_iter().map(|c| e.dispatch(c)).collect();
        assert!(outcomes.iter().all(Outcome::is_applied));
        assert_eq!(root_ids(&e), vec!["b", "a", "n", "c"]);
    }
}
