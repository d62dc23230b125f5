//! Block identifiers.
//!
//! Ids arriving from hydration are opaque strings chosen by the backend and
//! are kept verbatim. Ids minted locally (insert, duplicate) are UUIDv7 in
//! simple hex form, so they sort by creation time and never collide with
//! each other. Uniqueness against hydrated ids is enforced by the tree, not
//! here.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A block identifier, unique across an entire tree.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh time-ordered id (UUIDv7, simple hex).
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().as_simple().to_string())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is the empty string (hydration records may omit ids).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// First 8 characters, for display only.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::generate()
    }
}

impl From<&str> for BlockId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BlockId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for BlockId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}
