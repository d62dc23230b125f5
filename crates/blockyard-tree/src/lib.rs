//! Flat-arena block tree for Blockyard.
//!
//! The document is a forest of blocks. Instead of a nested structure that
//! has to be deep-copied on every edit, blocks live in an arena keyed by
//! `BlockId`, each node carrying its parent and ordered child ids. This makes
//! id lookups, uniqueness checks, and ancestor walks cheap.
//!
//! # Snapshots
//!
//! Nodes are stored behind `Arc`. Cloning a [`Tree`] clones the arena's
//! `Arc`s, not the nodes; mutating a clone goes through `Arc::make_mut`, so
//! only the touched nodes are copied and the original tree is never
//! observed to change. The editor installs each transaction's result as a
//! fresh `Arc<Tree>` and hands old snapshots out freely (e.g. to a drag
//! session that may need to restore them).
//!
//! # Invariants
//!
//! - Ids are unique across the whole tree (enforced by the arena key).
//! - No block is its own ancestor (checked before any move is applied).
//! - `parent`/`children` adjacency is mutually consistent.
//!
//! Every mutating method validates first and mutates second, so a rejected
//! operation leaves the tree exactly as it was.

mod error;
mod node;
mod tree;

pub use error::TreeError;
pub use node::Node;
pub use tree::Tree;

pub use blockyard_types::{Align, Attributes, Block, BlockId, Position, Status};

/// Maximum expected nesting depth. Traversal code uses this as a circuit breaker.
///
/// Real documents nest a handful of levels (section -> columns -> text).
/// Exceeding this likely indicates corruption.
pub const MAX_DEPTH: usize = 512;

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;
