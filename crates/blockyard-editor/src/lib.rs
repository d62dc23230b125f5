//! Block-tree editing engine for Blockyard.
//!
//! The admin surface composes a document as an ordered, nestable sequence
//! of typed blocks. This crate owns everything between a user gesture and
//! the resulting tree snapshot:
//!
//! - [`BlockRegistry`]: type name → capability descriptor
//! - [`Engine`]: tree + selection, commands, selectors, transaction protocol
//! - [`EventBus`]: typed, synchronous, registration-ordered pub/sub
//! - [`resolve_position`] / [`DragController`]: drag placement with a
//!   deferred [`CommandQueue`]
//! - [`RenderBridge`]: cached editing fragments from an external renderer,
//!   with attribute writeback before every transaction
//! - [`ShortcutController`]: keyboard chords → batched commands over the
//!   selection
//!
//! # Transaction protocol
//!
//! Every command, in order:
//!
//! 1. emits `BeforeTransaction` so editing surfaces can push unflushed
//!    field values into the tree,
//! 2. builds the new tree on a copy-on-write clone of the current snapshot,
//! 3. installs the new state,
//! 4. emits `Transaction` with it.
//!
//! Commands never fail across the public boundary: a precondition failure
//! is an [`Outcome::Rejected`] value, also reported on the `Error` topic.
//! Only the render bridge's fetch path returns `Err`.

pub mod config;
pub mod drag;
pub mod engine;
mod error;
pub mod events;
pub mod form;
pub mod position;
pub mod registry;
pub mod render;
pub mod shortcuts;

pub use config::{ConfigError, EditorConfig};
pub use drag::{CommandQueue, DragController};
pub use engine::{Command, EditorState, Engine, Outcome, RenderedBlock, SurfaceInspector};
pub use error::CommandError;
pub use events::{EngineEvent, EventBus, HasTopic, SubscriptionToken, Topic, Writeback};
pub use form::{FormField, form_fields};
pub use position::{DropTarget, resolve_position};
pub use registry::{BlockDescriptor, BlockPresenter, BlockRegistry, Capabilities, DragHandle};
pub use render::{
    CacheStats, FetchError, FragmentCache, FragmentSource, FragmentState, HttpFragmentSource,
    Mount, RenderBridge, RenderRequest, Signature,
};
pub use shortcuts::{Action, BatchReport, KeyChord, Modifiers, ShortcutController};

pub use blockyard_tree::{Node, Tree, TreeError};
pub use blockyard_types::{Align, Attributes, Block, BlockId, Position, Status};
