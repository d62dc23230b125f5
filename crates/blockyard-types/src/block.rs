//! The nested block record and its companion enums.
//!
//! `Block` is the interchange form of a document: hydration seeds arrive as
//! a nested array of these, `setUnits` accepts them, and the persisted form
//! fields are derived from them. Inside the editor the tree lives in a flat
//! arena (see `blockyard-tree`); `Block` is only the boundary shape.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::BlockId;

/// Open attribute map. Ordered so that serialization is canonical.
pub type Attributes = BTreeMap<String, serde_json::Value>;

/// Open / close state of a block (collapsed in the admin surface).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Status {
    /// Expanded.
    #[default]
    #[strum(serialize = "open", serialize = "opened", serialize = "1")]
    Open,
    /// Collapsed.
    #[strum(serialize = "close", serialize = "closed", serialize = "0")]
    Close,
}

impl Status {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::Close => "close",
        }
    }

    /// The other state.
    pub fn toggled(self) -> Self {
        match self {
            Status::Open => Status::Close,
            Status::Close => Status::Open,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Layout alignment of a block within the page grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Align {
    /// Default flow, no explicit alignment.
    #[default]
    #[strum(serialize = "none", serialize = "")]
    None,
    Left,
    Center,
    Right,
    /// Wider than the content column.
    Wide,
    /// Edge to edge.
    Full,
}

impl Align {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Align::None => "none",
            Align::Left => "left",
            Align::Center => "center",
            Align::Right => "right",
            Align::Wide => "wide",
            Align::Full => "full",
        }
    }
}

impl std::fmt::Display for Align {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed, addressable node of content with optional children.
///
/// ## Field groups
///
/// - **Identity**: id, kind (`type` on the wire)
/// - **Content**: attributes
/// - **Layout**: status, align, group, anchor
/// - **Structure**: children
/// - **Hydration**: seed_fragment (one-shot pre-rendered editing surface)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Tree-wide unique id. Missing ids in a seed get a fresh one.
    #[serde(default)]
    pub id: BlockId,
    /// Registry type name (`text`, `media`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Open attribute map.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: Attributes,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub align: Align,
    /// Visibility / grouping tag assigned by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// In-page anchor name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Block>,
    /// Pre-rendered editing fragment, consumed once at first mount.
    #[serde(
        default,
        rename = "seedFragment",
        skip_serializing_if = "Option::is_none"
    )]
    pub seed_fragment: Option<String>,
}

impl Block {
    /// Create a childless block with default layout.
    pub fn new(id: impl Into<BlockId>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            attributes: Attributes::new(),
            status: Status::Open,
            align: Align::None,
            group: None,
            anchor: None,
            children: Vec::new(),
            seed_fragment: None,
        }
    }

    /// Set one attribute (builder style).
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Replace the children (builder style).
    pub fn with_children(mut self, children: Vec<Block>) -> Self {
        self.children = children;
        self
    }

    /// Attach a hydration seed fragment (builder style).
    pub fn with_seed(mut self, fragment: impl Into<String>) -> Self {
        self.seed_fragment = Some(fragment.into());
        self
    }

    /// Number of blocks in this subtree, including self.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Block::subtree_len).sum::<usize>()
    }

    /// Visit this block and all descendants in depth-first pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Block)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_toggle() {
        assert_eq!(Status::from_str("OPEN"), Some(Status::Open));
        assert_eq!(Status::from_str("closed"), Some(Status::Close));
        assert_eq!(Status::from_str("bogus"), None);
        assert_eq!(Status::Open.toggled(), Status::Close);
        assert_eq!(Status::Close.toggled().toggled(), Status::Close);
    }

    #[test]
    fn test_align_parse() {
        assert_eq!(Align::from_str("wide"), Some(Align::Wide));
        assert_eq!(Align::from_str(""), Some(Align::None));
        assert_eq!(Align::Full.to_string(), "full");
    }

    #[test]
    fn test_block_wire_format() {
        let json = r#"{
            "id": "b1",
            "type": "text",
            "attributes": {"body": "hello"},
            "status": "close",
            "children": [{"id": "b2", "type": "media"}],
            "seedFragment": "<div></div>"
        }"#;
        let block: Block = serde_json::from_str(json).unwrap();
        assert_eq!(block.id.as_str(), "b1");
        assert_eq!(block.kind, "text");
        assert_eq!(block.status, Status::Close);
        assert_eq!(block.align, Align::None);
        assert_eq!(block.children.len(), 1);
        assert_eq!(block.seed_fragment.as_deref(), Some("<div></div>"));
        assert_eq!(block.subtree_len(), 2);

        let out = serde_json::to_value(&block).unwrap();
        assert_eq!(out["type"], "text");
        assert_eq!(out["seedFragment"], "<div></div>");
        assert!(out["children"][0].get("attributes").is_none());
    }

    #[test]
    fn test_missing_id_gets_generated() {
        let block: Block = serde_json::from_str(r#"{"type": "text"}"#).unwrap();
        assert!(!block.id.is_empty());
    }

    #[test]
    fn test_walk_is_preorder() {
        let tree = Block::new("a", "section").with_children(vec![
            Block::new("b", "text").with_children(vec![Block::new("c", "text")]),
            Block::new("d", "text"),
        ]);
        let mut seen = Vec::new();
        tree.walk(&mut |b| seen.push(b.id.as_str().to_string()));
        assert_eq!(seen, vec!["a", "b", "c", "d"]);
    }
}
