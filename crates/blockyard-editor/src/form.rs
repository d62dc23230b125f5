//! Hidden form fields persisted with the page.
//!
//! The backend reads the tree back as parallel repeated fields, one entry
//! per block in document order. Attributes are not part of this set; they
//! travel in the blocks' own namespaced fields.

use serde::Serialize;

use crate::Tree;

pub const BLOCK_ID: &str = "block_id[]";
pub const BLOCK_TYPE: &str = "block_type[]";
pub const BLOCK_PARENT: &str = "block_parent[]";
pub const BLOCK_ALIGN: &str = "block_align[]";
pub const BLOCK_GROUP: &str = "block_group[]";
pub const BLOCK_STATUS: &str = "block_status[]";
pub const BLOCK_ANCHOR: &str = "block_anchor[]";

/// One `name=value` pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FormField {
    pub name: &'static str,
    pub value: String,
}

impl FormField {
    fn new(name: &'static str, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// Every block's fields, block by block in document order. Root blocks
/// have an empty parent; missing group and anchor are empty too.
pub fn form_fields(tree: &Tree) -> Vec<FormField> {
    let order = tree.document_order();
    let mut fields = Vec::with_capacity(order.len() * 7);
    for id in &order {
        let Some(node) = tree.get(id) else {
            continue;
        };
        fields.extend([
            FormField::new(BLOCK_ID, node.id.as_str()),
            FormField::new(BLOCK_TYPE, node.kind.as_str()),
            FormField::new(
                BLOCK_PARENT,
                node.parent().map(|p| p.as_str()).unwrap_or_default(),
            ),
            FormField::new(BLOCK_ALIGN, node.align.as_str()),
            FormField::new(BLOCK_GROUP, node.group.as_deref().unwrap_or_default()),
            FormField::new(BLOCK_STATUS, node.status.as_str()),
            FormField::new(BLOCK_ANCHOR, node.anchor.as_deref().unwrap_or_default()),
        ]);
    }
    fields
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{Align, Block, Status};

    #[test]
    fn test_fields_in_document_order() {
        let mut media = Block::new("m", "media");
        media.align = Align::Wide;
        media.status = Status::Close;
        media.anchor = Some("hero".into());
        let tree = Tree::from_blocks(&[
            Block::new("s", "section").with_children(vec![media]),
            Block::new("t", "text"),
        ])
        .unwrap();

        let fields = form_fields(&tree);
        assert_eq!(fields.len(), 21);

        let ids: Vec<&str> = fields
            .iter()
            .filter(|f| f.name == BLOCK_ID)
            .map(|f| f.value.as_str())
            .collect();
        assert_eq!(ids, vec!["s", "m", "t"]);

        let media_fields: Vec<(&str, &str)> = fields[7..14]
            .iter()
            .map(|f| (f.name, f.value.as_str()))
            .collect();
        assert_eq!(
            media_fields,
            vec![
                (BLOCK_ID, "m"),
                (BLOCK_TYPE, "media"),
                (BLOCK_PARENT, "s"),
                (BLOCK_ALIGN, "wide"),
                (BLOCK_GROUP, ""),
                (BLOCK_STATUS, "close"),
                (BLOCK_ANCHOR, "hero"),
            ]
        );
    }

    #[test]
    fn test_empty_tree() {
        assert!(form_fields(&Tree::new()).is_empty());
    }
}
