//! Block type registry.
//!
//! Maps a block type name to its capability descriptor. Built once by the
//! host and shared into the [`Engine`] as `Arc<BlockRegistry>`. There is no
//! ambient global table.
//!
//! Unknown types are not an error anywhere: the engine treats them as
//! non-renderable placeholders with no capabilities.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::Engine;
use crate::{Align, Attributes, BlockId, Node, Position};

/// Capability predicate evaluated against a block and the engine state.
pub type BlockPredicate = Arc<dyn Fn(&Node, &Engine) -> bool + Send + Sync>;

/// Alignment options for a given layout version.
pub type AlignOptions = Arc<dyn Fn(u32) -> Vec<Align> + Send + Sync>;

// ============================================================================
// Capabilities
// ============================================================================

/// What a block type may do.
///
/// Omitted predicates allow the operation.
#[derive(Clone)]
pub struct Capabilities {
    /// More than one block of this type may exist in a tree.
    pub multiple: bool,
    /// Blocks of this type accept children.
    pub nested: bool,
    pub duplicate: Option<BlockPredicate>,
    /// May the block move to a different parent.
    pub move_hierarchy: Option<BlockPredicate>,
    pub align: Option<AlignOptions>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            multiple: true,
            nested: false,
            duplicate: None,
            move_hierarchy: None,
            align: None,
        }
    }
}

impl Capabilities {
    /// At most one block of this type per tree.
    pub fn single(mut self) -> Self {
        self.multiple = false;
        self
    }

    /// Allow children.
    pub fn nested(mut self) -> Self {
        self.nested = true;
        self
    }

    pub fn duplicate_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Node, &Engine) -> bool + Send + Sync + 'static,
    {
        self.duplicate = Some(Arc::new(predicate));
        self
    }

    pub fn move_hierarchy_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Node, &Engine) -> bool + Send + Sync + 'static,
    {
        self.move_hierarchy = Some(Arc::new(predicate));
        self
    }

    pub fn align_with<F>(mut self, options: F) -> Self
    where
        F: Fn(u32) -> Vec<Align> + Send + Sync + 'static,
    {
        self.align = Some(Arc::new(options));
        self
    }

    /// Evaluate the duplicate predicate (allowed when absent).
    pub fn allows_duplicate(&self, node: &Node, engine: &Engine) -> bool {
        self.duplicate.as_ref().is_none_or(|p| p(node, engine))
    }

    /// Evaluate the move-hierarchy predicate (allowed when absent).
    pub fn allows_move_hierarchy(&self, node: &Node, engine: &Engine) -> bool {
        self.move_hierarchy.as_ref().is_none_or(|p| p(node, engine))
    }

    /// Alignment options for a layout version (none when absent).
    pub fn align_options(&self, version: u32) -> Vec<Align> {
        self.align.as_ref().map(|f| f(version)).unwrap_or_default()
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("multiple", &self.multiple)
            .field("nested", &self.nested)
            .field("duplicate", &self.duplicate.is_some())
            .field("move_hierarchy", &self.move_hierarchy.is_some())
            .field("align", &self.align.is_some())
            .finish()
    }
}

// ============================================================================
// Presenter contract
// ============================================================================

/// Props handed to a presenter so it can wire up its drag handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DragHandle {
    pub id: BlockId,
    pub position: Position,
}

/// Per-type presentation, implemented by surrounding feature code.
///
/// The engine only invokes these; what they draw is not its concern.
pub trait BlockPresenter: Send + Sync {
    /// Produce the block's admin view.
    fn render(&self, engine: &Engine, node: &Node, drag: &DragHandle) -> String;

    /// Run the block's configuration panel, reporting attribute changes.
    fn config(&self, node: &Node, update: &mut dyn FnMut(Attributes)) {
        let _ = (node, update);
    }
}

// ============================================================================
// Descriptor + registry
// ============================================================================

/// Everything the engine knows about a block type.
#[derive(Clone)]
pub struct BlockDescriptor {
    /// Type name (unique key).
    pub kind: String,
    pub capabilities: Capabilities,
    pub presenter: Option<Arc<dyn BlockPresenter>>,
}

impl BlockDescriptor {
    /// A descriptor with default capabilities and no presenter.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            capabilities: Capabilities::default(),
            presenter: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_presenter(mut self, presenter: Arc<dyn BlockPresenter>) -> Self {
        self.presenter = Some(presenter);
        self
    }
}

impl std::fmt::Debug for BlockDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockDescriptor")
            .field("kind", &self.kind)
            .field("capabilities", &self.capabilities)
            .field("presenter", &self.presenter.is_some())
            .finish()
    }
}

/// Lookup table of block types.
#[derive(Clone, Debug, Default)]
pub struct BlockRegistry {
    descriptors: HashMap<String, BlockDescriptor>,
}

impl BlockRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, replacing (and returning) any previous descriptor.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        mut descriptor: BlockDescriptor,
    ) -> Option<BlockDescriptor> {
        let kind = kind.into();
        descriptor.kind = kind.clone();
        self.descriptors.insert(kind, descriptor)
    }

    /// Get a type's descriptor.
    pub fn lookup(&self, kind: &str) -> Option<&BlockDescriptor> {
        self.descriptors.get(kind)
    }

    /// Check if a type is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.descriptors.contains_key(kind)
    }

    /// Registered type names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Whether a type accepts children. Unknown types do not.
    pub fn is_nested(&self, kind: &str) -> bool {
        self.lookup(kind).is_some_and(|d| d.capabilities.nested)
    }

    /// Whether a type may appear more than once. Unknown types may.
    pub fn allows_multiple(&self, kind: &str) -> bool {
        self.lookup(kind).is_none_or(|d| d.capabilities.multiple)
    }

    /// The CMS's stock block types.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        let plain = |_: u32| vec![Align::None];
        let media = |version: u32| {
            if version >= 2 {
                vec![
                    Align::None,
                    Align::Left,
                    Align::Center,
                    Align::Right,
                    Align::Wide,
                    Align::Full,
                ]
            } else {
                vec![Align::None, Align::Wide, Align::Full]
            }
        };

        for kind in ["text", "richtext", "markdown"] {
            registry.register(
                kind,
                BlockDescriptor::new(kind).with_capabilities(Capabilities::default().align_with(plain)),
            );
        }

        // An upload in flight lives only in the editing surface; copying the
        // block would copy a half-written file reference.
        registry.register(
            "media",
            BlockDescriptor::new("media").with_capabilities(
                Capabilities::default()
                    .align_with(media)
                    .duplicate_if(|node, engine| {
                        engine
                            .rendered_fragment(&node.id)
                            .is_none_or(|f| !f.contains("data-uploading"))
                    }),
            ),
        );
        registry.register(
            "map",
            BlockDescriptor::new("map").with_capabilities(
                Capabilities::default().align_with(|_| vec![Align::None, Align::Wide, Align::Full]),
            ),
        );
        registry.register(
            "module",
            BlockDescriptor::new("module").with_capabilities(Capabilities::default().single()),
        );
        registry.register(
            "columns",
            BlockDescriptor::new("columns").with_capabilities(
                Capabilities::default()
                    .nested()
                    .align_with(|_| vec![Align::None, Align::Wide, Align::Full]),
            ),
        );
        registry.register(
            "section",
            BlockDescriptor::new("section").with_capabilities(
                Capabilities::default()
                    .nested()
                    .move_hierarchy_if(|node, _| node.is_root()),
            ),
        );

        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = BlockRegistry::new();
        assert!(registry.lookup("text").is_none());

        let prev = registry.register("text", BlockDescriptor::new("ignored"));
        assert!(prev.is_none());
        assert_eq!(registry.lookup("text").unwrap().kind, "text");

        let prev = registry.register(
            "text",
            BlockDescriptor::new("text").with_capabilities(Capabilities::default().nested()),
        );
        assert!(prev.is_some());
        assert!(registry.is_nested("text"));
    }

    #[test]
    fn test_unknown_types_have_no_capabilities() {
        let registry = BlockRegistry::builtin();
        assert!(!registry.is_nested("gallery"));
        assert!(registry.allows_multiple("gallery"));
        assert!(registry.lookup("gallery").is_none());
    }

    #[test]
    fn test_builtin_capabilities() {
        let registry = BlockRegistry::builtin();
        assert_eq!(
            registry.kinds(),
            vec!["columns", "map", "markdown", "media", "module", "richtext", "section", "text"]
        );
        assert!(!registry.allows_multiple("module"));
        assert!(registry.is_nested("columns"));
        assert!(registry.is_nested("section"));
        assert!(!registry.is_nested("text"));

        let media = &registry.lookup("media").unwrap().capabilities;
        assert_eq!(media.align_options(1), vec![Align::None, Align::Wide, Align::Full]);
        assert_eq!(media.align_options(2).len(), 6);
        assert!(registry.lookup("module").unwrap().capabilities.align_options(2).is_empty());
    }
}
