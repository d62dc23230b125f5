//! Read-only queries over the current state.

use std::sync::Arc;

use indexmap::IndexSet;

use super::{EditorState, Engine};
use crate::registry::DragHandle;
use crate::{Align, Attributes, BlockId, CommandError, Node, Tree};

/// What the admin surface should show for a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderedBlock {
    /// Output of the type's presenter.
    Presented(String),
    /// Unknown type or no presenter registered; shown as an inert box.
    Placeholder { kind: String },
}

impl Engine {
    /// The installed state.
    pub fn state(&self) -> &EditorState {
        &self.state
    }

    /// The current tree.
    pub fn units(&self) -> &Tree {
        &self.state.units
    }

    /// A shared handle to the current tree that later commands cannot alter.
    pub fn snapshot(&self) -> Arc<Tree> {
        Arc::clone(&self.state.units)
    }

    pub fn selection(&self) -> &IndexSet<BlockId> {
        &self.state.selection
    }

    /// Number of transactions installed so far.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn align_version(&self) -> u32 {
        self.align_version
    }

    pub fn find_by_id(&self, id: &BlockId) -> Option<&Node> {
        self.state.units.get(id)
    }

    pub fn find_parent(&self, id: &BlockId) -> Option<&Node> {
        self.state
            .units
            .parent(id)
            .and_then(|parent| self.state.units.get(parent))
    }

    /// Index within the block's own sibling list.
    pub fn index_of(&self, id: &BlockId) -> Option<usize> {
        self.state.units.index_of(id)
    }

    pub fn is_first(&self, id: &BlockId) -> bool {
        self.index_of(id) == Some(0)
    }

    pub fn is_last(&self, id: &BlockId) -> bool {
        let units = &self.state.units;
        match (units.index_of(id), units.siblings(units.parent(id))) {
            (Some(index), Some(list)) => index + 1 == list.len(),
            _ => false,
        }
    }

    pub fn is_selected(&self, id: &BlockId) -> bool {
        self.state.selection.contains(id)
    }

    /// Child ids of `id`, or the root list for `None`.
    pub fn children(&self, id: Option<&BlockId>) -> &[BlockId] {
        self.state.units.siblings(id).unwrap_or(&[])
    }

    pub fn depth(&self, id: &BlockId) -> usize {
        self.state.units.depth(id)
    }

    pub fn document_order(&self) -> Vec<BlockId> {
        self.state.units.document_order()
    }

    /// Whether `duplicate(id)` would be accepted right now.
    pub fn can_duplicate(&self, id: &BlockId) -> bool {
        self.state
            .units
            .get(id)
            .is_some_and(|node| self.check_duplicable(node, &self.state.units).is_ok())
    }

    /// Alignments offered for a block at the engine's layout version.
    pub fn get_align_options(&self, id: &BlockId) -> Vec<Align> {
        self.state
            .units
            .get(id)
            .map(|node| self.align_options_for(&node.kind))
            .unwrap_or_default()
    }

    /// The editing fragment currently on the surface for a block.
    pub fn rendered_fragment(&self, id: &BlockId) -> Option<String> {
        self.surface.as_ref().and_then(|surface| surface.fragment(id))
    }

    /// Run the block type's presenter. `None` for a missing block.
    pub fn render_block(&self, id: &BlockId) -> Option<RenderedBlock> {
        let node = self.state.units.get(id)?;
        let presenter = self
            .registry
            .lookup(&node.kind)
            .and_then(|d| d.presenter.clone());

        Some(match presenter {
            Some(presenter) => {
                let drag = DragHandle {
                    id: id.clone(),
                    position: self.state.units.position_of(id)?,
                };
                RenderedBlock::Presented(presenter.render(self, node, &drag))
            }
            None => RenderedBlock::Placeholder {
                kind: node.kind.clone(),
            },
        })
    }

    /// Run the type's configuration panel and collect the attribute updates
    /// it reports into one patch, ready for `set_attributes`.
    pub fn configure(&self, id: &BlockId) -> Result<Attributes, CommandError> {
        let node = self
            .state
            .units
            .get(id)
            .ok_or_else(|| CommandError::unknown(id))?;
        let mut patch = Attributes::new();
        if let Some(presenter) = self.registry.lookup(&node.kind).and_then(|d| d.presenter.as_ref()) {
            presenter.config(node, &mut |update| patch.extend(update));
        }
        Ok(patch)
    }
}
