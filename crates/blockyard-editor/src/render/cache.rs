//! Signature-keyed fragment cache.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Attributes, BlockId, Node};

/// Content address of a block's render input: BLAKE3 over type, id and
/// attributes, hex-encoded.
///
/// Attributes are a sorted map, so equal inputs always hash equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn of(kind: &str, id: &BlockId, attributes: &Attributes) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(kind.as_bytes());
        hasher.update(b"\0");
        hasher.update(id.as_str().as_bytes());
        for (key, value) in attributes {
            hasher.update(b"\0");
            hasher.update(key.as_bytes());
            hasher.update(b"\0");
            hasher.update(value.to_string().as_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn for_node(node: &Node) -> Self {
        Self::of(&node.kind, &node.id, &node.attributes)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex chars, for logs.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lookup counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Fetches actually issued to the fragment source.
    pub requests: u64,
}

/// Fragments by signature. Entries live until pruned or the cache drops.
#[derive(Debug, Default)]
pub struct FragmentCache {
    entries: HashMap<Signature, String>,
    stats: CacheStats,
}

impl FragmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a fragment, counting the hit or miss.
    pub fn get(&mut self, signature: &Signature) -> Option<&str> {
        match self.entries.get(signature) {
            Some(fragment) => {
                self.stats.hits += 1;
                Some(fragment.as_str())
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub fn contains(&self, signature: &Signature) -> bool {
        self.entries.contains_key(signature)
    }

    pub fn insert(&mut self, signature: Signature, fragment: String) {
        self.entries.insert(signature, fragment);
    }

    pub(crate) fn count_request(&mut self) {
        self.stats.requests += 1;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Drop every entry whose signature is not in `keep`. Returns how many
    /// were dropped.
    pub fn retain(&mut self, keep: &HashSet<Signature>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|signature, _| keep.contains(signature));
        before - self.entries.len()
    }
}
