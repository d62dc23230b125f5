//! Render cache bridge.
//!
//! Each block's editing surface is a fragment produced by an external
//! renderer from the block's type and attributes. The bridge:
//!
//! - mounts blocks, attaching a fragment from the hydration seed, the cache,
//!   or (via [`RenderBridge::refresh`]) the [`FragmentSource`],
//! - caches fragments by [`Signature`], so identical inputs are fetched once,
//! - holds field values the user edited inside a fragment and pushes them
//!   into the tree on every `BeforeTransaction`,
//! - tracks per-block [`FragmentState`], keeping the last good fragment when
//!   a fetch fails.
//!
//! A fetch failure affects one block only. Engine state is never touched by
//! the fetch path.

mod cache;
pub mod fields;
mod source;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

pub use cache::{CacheStats, FragmentCache, Signature};
pub use source::{FetchError, FragmentSource, HttpFragmentSource, RenderRequest};

use crate::events::{EngineEvent, SubscriptionToken, Topic};
use crate::{Attributes, BlockId, Engine, SurfaceInspector};

/// Per-block fragment status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FragmentState {
    /// Mounted, waiting for a fetch.
    Pending,
    Ready {
        signature: Signature,
        fragment: String,
    },
    /// The last fetch failed. `last_good` stays on screen.
    Failed {
        signature: Signature,
        error: FetchError,
        last_good: Option<String>,
    },
}

impl FragmentState {
    pub fn is_ready(&self) -> bool {
        matches!(self, FragmentState::Ready { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FragmentState::Failed { .. })
    }
}

/// How a mount was satisfied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mount {
    /// The hydration fragment was consumed.
    Seeded(Signature),
    Cached(Signature),
    /// Nothing to attach yet; call [`RenderBridge::refresh`].
    NeedsFetch,
}

/// State shared with the engine: what is on screen and what the user typed.
#[derive(Debug, Default)]
struct SurfaceStore {
    attached: HashMap<BlockId, String>,
    edits: HashMap<BlockId, Attributes>,
}

struct SurfaceView(Rc<RefCell<SurfaceStore>>);

impl SurfaceInspector for SurfaceView {
    fn fragment(&self, id: &BlockId) -> Option<String> {
        self.0.borrow().attached.get(id).cloned()
    }
}

/// Fetches, caches and attaches editing fragments for one engine.
pub struct RenderBridge {
    source: Arc<dyn FragmentSource>,
    cache: FragmentCache,
    states: HashMap<BlockId, FragmentState>,
    mounted: HashSet<BlockId>,
    surface: Rc<RefCell<SurfaceStore>>,
    subscription: Option<SubscriptionToken>,
}

impl RenderBridge {
    pub fn new(source: Arc<dyn FragmentSource>) -> Self {
        Self {
            source,
            cache: FragmentCache::new(),
            states: HashMap::new(),
            mounted: HashSet::new(),
            surface: Rc::new(RefCell::new(SurfaceStore::default())),
            subscription: None,
        }
    }

    /// Hook into an engine: flush edits on `BeforeTransaction` and expose
    /// attached fragments to capability predicates.
    pub fn attach(&mut self, engine: &mut Engine) {
        self.detach(engine);

        let surface = Rc::clone(&self.surface);
        let token = engine.subscribe(Topic::BeforeTransaction, move |event| {
            if let EngineEvent::BeforeTransaction { writeback, .. } = event {
                let mut store = surface.borrow_mut();
                for (id, attributes) in store.edits.drain() {
                    writeback.push(id, attributes);
                }
            }
        });
        self.subscription = Some(token);
        engine.set_surface(Rc::new(SurfaceView(Rc::clone(&self.surface))));
    }

    pub fn detach(&mut self, engine: &mut Engine) {
        if let Some(token) = self.subscription.take() {
            engine.unsubscribe(token);
            engine.clear_surface();
        }
    }

    // =========================================================================
    // Surface edits
    // =========================================================================

    /// Record a form field the user changed, by qualified name
    /// (`"{id}[{key}]"`). Returns false for a name that is not qualified.
    ///
    /// The text is read back with the JSON type the attribute currently has
    /// in `engine`, so an untouched numeric field flushes as the same number.
    pub fn record_field(&mut self, engine: &Engine, name: &str, value: impl Into<String>) -> bool {
        let Some((id, key)) = fields::parse_qualified(name) else {
            tracing::debug!(name, "ignoring unqualified field");
            return false;
        };
        let current = engine.find_by_id(&id).and_then(|node| node.attributes.get(key));
        let value = fields::typed_value(value.into(), current);
        self.record_edit(id, key, value);
        true
    }

    /// Record a typed attribute edit held by the surface.
    pub fn record_edit(&mut self, id: BlockId, key: impl Into<String>, value: serde_json::Value) {
        self.surface
            .borrow_mut()
            .edits
            .entry(id)
            .or_default()
            .insert(key.into(), value);
    }

    /// Blocks with edits not yet flushed into the tree.
    pub fn pending_edits(&self) -> usize {
        self.surface.borrow().edits.len()
    }

    // =========================================================================
    // Mounting
    // =========================================================================

    /// Mount a block. `None` if the block does not exist.
    ///
    /// A hydration fragment is consumed here and stored in the cache under
    /// the block's signature, so mounting the same block again is a cache
    /// hit rather than a second initialization.
    pub fn mount(&mut self, engine: &mut Engine, id: &BlockId) -> Option<Mount> {
        let signature = Signature::for_node(engine.find_by_id(id)?);
        self.mounted.insert(id.clone());

        if let Some(seed) = engine.take_seed(id) {
            if !self.cache.contains(&signature) {
                self.cache.insert(signature.clone(), seed.clone());
            }
            tracing::debug!(%id, signature = signature.short(), "attached seed fragment");
            self.attach_fragment(engine, id, signature.clone(), seed);
            return Some(Mount::Seeded(signature));
        }

        if let Some(fragment) = self.cache.get(&signature).map(str::to_owned) {
            self.attach_fragment(engine, id, signature.clone(), fragment);
            return Some(Mount::Cached(signature));
        }

        self.states.entry(id.clone()).or_insert(FragmentState::Pending);
        Some(Mount::NeedsFetch)
    }

    /// Forget a block's surface. Cached fragments stay.
    pub fn unmount(&mut self, id: &BlockId) {
        self.mounted.remove(id);
        self.states.remove(id);
        self.surface.borrow_mut().attached.remove(id);
    }

    pub fn is_mounted(&self, id: &BlockId) -> bool {
        self.mounted.contains(id)
    }

    // =========================================================================
    // Fetching
    // =========================================================================

    /// Make sure the block's fragment matches its current attributes,
    /// fetching on a cache miss.
    ///
    /// `Ok(None)` if the block no longer exists. On failure the block moves
    /// to [`FragmentState::Failed`] and the error is returned.
    pub async fn refresh(
        &mut self,
        engine: &Engine,
        id: &BlockId,
    ) -> Result<Option<Signature>, FetchError> {
        let Some(node) = engine.find_by_id(id) else {
            return Ok(None);
        };
        let signature = Signature::for_node(node);
        let request = RenderRequest::for_node(node);

        if let Some(fragment) = self.cache.get(&signature).map(str::to_owned) {
            self.attach_fragment(engine, id, signature.clone(), fragment);
            return Ok(Some(signature));
        }

        self.cache.count_request();
        tracing::debug!(%id, kind = %request.kind, signature = signature.short(), "fetching fragment");

        match self.source.fetch(&request).await {
            Ok(fragment) => {
                self.cache.insert(signature.clone(), fragment.clone());
                self.attach_fragment(engine, id, signature.clone(), fragment);
                Ok(Some(signature))
            }
            Err(error) => {
                tracing::warn!(%id, %error, "fragment fetch failed");
                let last_good = match self.states.get(id) {
                    Some(FragmentState::Ready { fragment, .. }) => Some(fragment.clone()),
                    Some(FragmentState::Failed { last_good, .. }) => last_good.clone(),
                    _ => None,
                };
                self.states.insert(
                    id.clone(),
                    FragmentState::Failed {
                        signature,
                        error: error.clone(),
                        last_good,
                    },
                );
                Err(error)
            }
        }
    }

    /// Refresh a block only if its last fetch failed.
    pub async fn retry(
        &mut self,
        engine: &Engine,
        id: &BlockId,
    ) -> Result<Option<Signature>, FetchError> {
        if !self.states.get(id).is_some_and(FragmentState::is_failed) {
            return Ok(None);
        }
        self.refresh(engine, id).await
    }

    /// Mounted blocks whose fragment does not match their current
    /// attributes, in document order.
    pub fn stale_blocks(&self, engine: &Engine) -> Vec<BlockId> {
        engine
            .document_order()
            .into_iter()
            .filter(|id| self.mounted.contains(id))
            .filter(|id| {
                let Some(node) = engine.find_by_id(id) else {
                    return false;
                };
                let current = Signature::for_node(node);
                match self.states.get(id) {
                    Some(FragmentState::Ready { signature, .. })
                    | Some(FragmentState::Failed { signature, .. }) => *signature != current,
                    Some(FragmentState::Pending) | None => true,
                }
            })
            .collect()
    }

    /// Refresh every stale block, one at a time.
    pub async fn refresh_stale(
        &mut self,
        engine: &Engine,
    ) -> Vec<(BlockId, Result<Option<Signature>, FetchError>)> {
        let mut results = Vec::new();
        for id in self.stale_blocks(engine) {
            let result = self.refresh(engine, &id).await;
            results.push((id, result));
        }
        results
    }

    /// Unmount blocks that left the tree and drop cache entries no current
    /// block can use. Returns the number of cache entries dropped.
    pub fn prune(&mut self, engine: &Engine) -> usize {
        let gone: Vec<BlockId> = self
            .mounted
            .iter()
            .filter(|id| engine.find_by_id(id).is_none())
            .cloned()
            .collect();
        for id in &gone {
            self.unmount(id);
        }

        let live: HashSet<Signature> = engine
            .document_order()
            .iter()
            .filter_map(|id| engine.find_by_id(id))
            .map(Signature::for_node)
            .collect();
        let dropped = self.cache.retain(&live);
        tracing::debug!(unmounted = gone.len(), dropped, "pruned render cache");
        dropped
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self, id: &BlockId) -> Option<&FragmentState> {
        self.states.get(id)
    }

    /// Fragment on screen for a block (the last good one if failed).
    pub fn fragment(&self, id: &BlockId) -> Option<&str> {
        match self.states.get(id)? {
            FragmentState::Ready { fragment, .. } => Some(fragment),
            FragmentState::Failed { last_good, .. } => last_good.as_deref(),
            FragmentState::Pending => None,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache(&self) -> &FragmentCache {
        &self.cache
    }

    fn attach_fragment(&mut self, engine: &Engine, id: &BlockId, signature: Signature, fragment: String) {
        self.surface
            .borrow_mut()
            .attached
            .insert(id.clone(), fragment.clone());
        self.states.insert(
            id.clone(),
            FragmentState::Ready {
                signature: signature.clone(),
                fragment,
            },
        );
        engine.notify_fragment_attached(id, &signature);
    }
}

impl std::fmt::Debug for RenderBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderBridge")
            .field("cache", &self.cache)
            .field("mounted", &self.mounted.len())
            .field("attached", &self.subscription.is_some())
            .finish()
    }
}
