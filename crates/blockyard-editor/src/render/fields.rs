//! Form field namespacing.
//!
//! The external renderer sees attribute keys qualified by block id,
//! `"{id}[{key}]"`, so several blocks' fields can share one surface without
//! colliding. Extraction strips the qualifier again.

use serde_json::Value;

use crate::BlockId;

/// `"{id}[{key}]"`.
pub fn qualify(id: &BlockId, key: &str) -> String {
    format!("{id}[{key}]")
}

/// Split a qualified name back into block id and key.
pub fn parse_qualified(name: &str) -> Option<(BlockId, &str)> {
    let (id, rest) = name.split_once('[')?;
    let key = rest.strip_suffix(']')?;
    if id.is_empty() || key.is_empty() {
        return None;
    }
    Some((BlockId::new(id), key))
}

/// Read a submitted field back as an attribute value.
///
/// Form fields are text. When the attribute already holds a number, bool,
/// array or object, the text is parsed as JSON and kept only if it has that
/// same type; otherwise it stays a string.
pub fn typed_value(raw: String, current: Option<&Value>) -> Value {
    match current {
        None | Some(Value::Null) | Some(Value::String(_)) => Value::String(raw),
        Some(current) => match serde_json::from_str::<Value>(&raw) {
            Ok(parsed) if std::mem::discriminant(&parsed) == std::mem::discriminant(current) => {
                parsed
            }
            _ => Value::String(raw),
        },
    }
}

/// Text form of an attribute value: strings bare, null empty, anything
/// else as JSON.
pub fn field_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
