use crate::model::MenuItem;
use serde_json::Value as JsonValue;

pub fn menu_key(mi: &MenuItem) -> String {
    format!("menu:{}", mi.id)
}

pub fn child_key(parent_key: &str, v: &JsonValue, idx: usize) -> String {
    if let Some(id) = value_id(v) {
        format!("{parent_key}/{id}")
    } else {
        format!("{parent_key}/#{idx}")
    }
}

/// Backend ids come back as strings or numbers; normalize for keying and for
/// `${MEMBER}` substitution in detail commands.
pub fn value_id(v: &JsonValue) -> Option<String> {
    match v.get("id") {
        Some(JsonValue::String(s)) => Some(s.clone()),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}
