//! The editor engine: tree + selection state, commands, selectors, events.
//!
//! State is a pair of an immutable tree snapshot (`Arc<Tree>`) and the
//! selection set. Commands never mutate the installed snapshot; they run
//! against a copy-on-write clone and install it as a new `Arc`. Anyone
//! still holding the previous snapshot (a drag session, an event
//! subscriber) keeps seeing exactly what they saw.

mod commands;
mod selectors;

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::events::{EngineEvent, EventBus, SubscriptionToken, Topic, Writeback};
use crate::registry::BlockRegistry;
use crate::render::Signature;
use crate::{Block, BlockId, CommandError, Tree, TreeError};

pub use commands::Command;
pub use selectors::RenderedBlock;

/// Read-only access to the editing surface the host has rendered.
///
/// Some capability predicates need to look at what is currently on screen
/// (a field present only in the rendered fragment). The render bridge
/// installs an implementation; without one, every lookup is `None`.
pub trait SurfaceInspector {
    /// The fragment currently attached for a block.
    fn fragment(&self, id: &BlockId) -> Option<String>;
}

/// Everything a transaction replaces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EditorState {
    /// Current tree snapshot.
    pub units: Arc<Tree>,
    /// Selected ids, in the order they were selected.
    pub selection: IndexSet<BlockId>,
}

/// Result of a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A new state was installed and `Transaction` emitted.
    Applied,
    /// The command would not change anything; no event.
    Unchanged,
    /// Precondition failed; state untouched, `Error` emitted.
    Rejected(CommandError),
}

impl Outcome {
    /// Check if a new state was installed.
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }

    /// Check if the command was rejected.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Outcome::Rejected(_))
    }
}

/// A hydration fragment and the signature of the attributes it was
/// rendered from.
pub(crate) type Seed = (Signature, String);

/// Working copies a command builds its result into.
pub(crate) struct Draft {
    pub tree: Tree,
    pub selection: IndexSet<BlockId>,
}

/// Owns the block tree and selection; runs the transaction protocol.
pub struct Engine {
    registry: Arc<BlockRegistry>,
    state: EditorState,
    bus: EventBus<EngineEvent>,
    /// One-shot hydration fragments, consumed at first mount.
    seeds: HashMap<BlockId, Seed>,
    surface: Option<Rc<dyn SurfaceInspector>>,
    align_version: u32,
    seq: u64,
}

impl Engine {
    /// Create an engine with an empty tree.
    pub fn new(registry: Arc<BlockRegistry>) -> Self {
        Self {
            registry,
            state: EditorState::default(),
            bus: EventBus::new(),
            seeds: HashMap::new(),
            surface: None,
            align_version: 1,
            seq: 0,
        }
    }

    /// Create an engine from a hydration seed.
    ///
    /// Seed fragments are lifted out of the records and held until the
    /// render bridge mounts each block. Unknown types and nesting that the
    /// registry would not allow are kept as-is (logged) so no content is
    /// lost on load; commands enforce capabilities from here on.
    pub fn hydrate(registry: Arc<BlockRegistry>, blocks: &[Block]) -> Result<Self, TreeError> {
        let tree = Tree::from_blocks(blocks)?;

        let mut seeds = HashMap::new();
        for root in blocks {
            root.walk(&mut |block| {
                if let Some(seed) = &block.seed_fragment {
                    let signature = Signature::of(&block.kind, &block.id, &block.attributes);
                    seeds.insert(block.id.clone(), (signature, seed.clone()));
                }
                if !registry.contains(&block.kind) {
                    tracing::warn!(id = %block.id, kind = %block.kind, "unknown block type, rendering placeholder");
                } else if !block.children.is_empty() && !registry.is_nested(&block.kind) {
                    tracing::warn!(id = %block.id, kind = %block.kind, "children under non-nesting type");
                }
            });
        }

        tracing::info!(blocks = tree.len(), seeds = seeds.len(), "hydrated block tree");

        let mut engine = Self::new(registry);
        engine.state.units = Arc::new(tree);
        engine.seeds = seeds;
        Ok(engine)
    }

    /// Set the layout version passed to `align` capabilities.
    pub fn with_align_version(mut self, version: u32) -> Self {
        self.align_version = version;
        self
    }

    /// The registry this engine consults.
    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Install the surface inspector used by capability predicates.
    pub fn set_surface(&mut self, surface: Rc<dyn SurfaceInspector>) {
        self.surface = Some(surface);
    }

    pub fn clear_surface(&mut self) {
        self.surface = None;
    }

    /// Remove and return a block's hydration fragment.
    ///
    /// The fragment is discarded, and `None` returned, once the block's
    /// attributes no longer match the ones it was rendered from.
    pub fn take_seed(&mut self, id: &BlockId) -> Option<String> {
        let (signature, fragment) = self.seeds.remove(id)?;
        let current = self.state.units.get(id).map(Signature::for_node);
        if current.as_ref() != Some(&signature) {
            tracing::debug!(%id, "discarding stale seed fragment");
            return None;
        }
        Some(fragment)
    }

    /// Check if a block still has an unconsumed hydration fragment.
    pub fn has_seed(&self, id: &BlockId) -> bool {
        self.seeds.contains_key(id)
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Register a handler; see [`EventBus::subscribe`].
    pub fn subscribe<F>(&mut self, topic: Topic, handler: F) -> SubscriptionToken
    where
        F: Fn(&EngineEvent) + 'static,
    {
        self.bus.subscribe(topic, handler)
    }

    /// Remove a handler.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        self.bus.unsubscribe(token)
    }

    /// Announce that a block's editing fragment has been attached.
    pub fn notify_fragment_attached(&self, id: &BlockId, signature: &Signature) {
        self.bus.emit(&EngineEvent::FragmentAttached {
            id: id.clone(),
            signature: signature.clone(),
        });
    }

    // =========================================================================
    // Transaction protocol
    // =========================================================================

    /// Run one command through the transaction protocol.
    ///
    /// `build` receives the engine (for registry and capability lookups)
    /// and a draft holding copies of the current tree and selection, with
    /// flushed surface values already merged. It returns whether it changed
    /// anything. On error the draft is discarded.
    pub(crate) fn transact<F>(&mut self, command: &'static str, build: F) -> Outcome
    where
        F: FnOnce(&Self, &mut Draft) -> Result<bool, CommandError>,
    {
        // 1. Let surfaces flush values they hold outside the tree.
        let writeback = Writeback::default();
        self.bus.emit(&EngineEvent::BeforeTransaction {
            command,
            writeback: writeback.clone(),
        });

        // 2. Copy-on-write clone; the installed snapshot is never touched.
        let mut draft = Draft {
            tree: Tree::clone(&self.state.units),
            selection: self.state.selection.clone(),
        };
        let flushed = apply_writeback(&mut draft.tree, writeback.take());
        let checkpoint = flushed.then(|| draft.tree.clone());

        let changed = match build(self, &mut draft) {
            Ok(changed) => changed,
            Err(error) => {
                tracing::debug!(command, %error, "command rejected");
                self.bus.emit(&EngineEvent::Error {
                    command,
                    error: error.clone(),
                });
                // Flushed values must not be lost with the rejected command.
                if let Some(tree) = checkpoint {
                    let selection = self.state.selection.clone();
                    self.install("writeback", tree, selection);
                }
                return Outcome::Rejected(error);
            }
        };

        if !changed && !flushed {
            tracing::trace!(command, "command left state unchanged");
            return Outcome::Unchanged;
        }

        // 3 + 4. Install and announce.
        let Draft { tree, mut selection } = draft;
        selection.retain(|id| tree.contains(id));
        self.install(if changed { command } else { "writeback" }, tree, selection);
        if changed {
            Outcome::Applied
        } else {
            Outcome::Unchanged
        }
    }

    fn install(&mut self, command: &'static str, tree: Tree, selection: IndexSet<BlockId>) {
        debug_assert!(tree.check_invariants().is_ok(), "transaction broke tree invariants");
        self.seq += 1;
        self.seeds.retain(|id, _| tree.contains(id));
        self.state = EditorState {
            units: Arc::new(tree),
            selection,
        };
        tracing::debug!(command, seq = self.seq, blocks = self.state.units.len(), "transaction");
        self.bus.emit(&EngineEvent::Transaction {
            command,
            seq: self.seq,
            state: self.state.clone(),
        });
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("blocks", &self.state.units.len())
            .field("selection", &self.state.selection)
            .field("seeds", &self.seeds.len())
            .field("seq", &self.seq)
            .finish()
    }
}

/// Merge flushed surface values into the draft. Null removes a key.
/// Returns whether any attribute actually changed.
fn apply_writeback(tree: &mut Tree, writes: Vec<(BlockId, crate::Attributes)>) -> bool {
    let mut changed = false;
    for (id, attributes) in writes {
        let Some(current) = tree.get(&id) else {
            tracing::debug!(%id, "dropping writeback for removed block");
            continue;
        };
        if !patch_changes(&current.attributes, &attributes) {
            continue;
        }
        if let Some(node) = tree.node_mut(&id) {
            merge_patch(&mut node.attributes, attributes);
            changed = true;
        }
    }
    changed
}

/// Check whether applying `patch` would alter `current`.
pub(crate) fn patch_changes(current: &crate::Attributes, patch: &crate::Attributes) -> bool {
    patch.iter().any(|(key, value)| {
        if value.is_null() {
            current.contains_key(key)
        } else {
            current.get(key) != Some(value)
        }
    })
}

/// Apply a patch: null removes the key, anything else overwrites.
pub(crate) fn merge_patch(target: &mut crate::Attributes, patch: crate::Attributes) {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}
