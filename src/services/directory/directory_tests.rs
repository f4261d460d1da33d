use super::*;
use serde_json::json;

#[test]
fn normalize_handles_the_double_envelope() {
    let v = json!({"data": {"data": [{"id": 1, "name": "Kigali City"}]}});
    let items = normalize_list_response(&v);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Kigali City");
}

#[test]
fn normalize_handles_the_single_envelope() {
    let v = json!({"data": [{"id": 1, "name": "Kigali City"}, {"id": 2, "name": "Southern"}]});
    assert_eq!(normalize_list_response(&v).len(), 2);
}

#[test]
fn normalize_handles_a_bare_array() {
    let v = json!([{"id": 1, "name": "Kigali City"}]);
    assert_eq!(normalize_list_response(&v).len(), 1);
}

#[test]
fn normalize_scans_ambiguous_objects_for_the_first_array() {
    let v = json!({"ok": true, "provinces": [{"id": 1, "name": "Kigali City"}]});
    assert_eq!(normalize_list_response(&v).len(), 1);
    // One object level deeper as well.
    let nested = json!({"ok": true, "data": {"items": [{"id": 3, "name": "Huye"}]}});
    let items = normalize_list_response(&nested);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Huye");
}

#[test]
fn normalize_returns_empty_for_scalars() {
    assert!(normalize_list_response(&json!("nope")).is_empty());
    assert!(normalize_list_response(&json!({"ok": true})).is_empty());
}

#[test]
fn numeric_keys_are_normalized_to_strings() {
    let v = json!({"data": [{"id": 10, "name": "Gasabo"}, {"id": 11, "name": "Nyarugenge"}]});
    let opts = parse_option_items(&v, None);
    assert_eq!(opts[0].key, "10");
    assert_eq!(opts[0].label, "Gasabo");
    assert_eq!(opts[1].key, "11");
}

#[test]
fn display_name_and_title_are_accepted_labels() {
    let v = json!([
        {"key": "a", "displayName": "Alpha"},
        {"value": "b", "title": "Bravo"},
        {"id": "c"}
    ]);
    let opts = parse_option_items(&v, None);
    assert_eq!(opts[0].label, "Alpha");
    assert_eq!(opts[1].label, "Bravo");
    // Label falls back to the key when nothing else is present.
    assert_eq!(opts[2].label, "c");
}

#[test]
fn plain_string_items_are_their_own_key_and_label() {
    let v = json!({"data": ["PENDING", "APPROVED"]});
    let opts = parse_option_items(&v, None);
    assert_eq!(opts[0], crate::graph::store::OptionItem::new("PENDING", "PENDING"));
}

#[test]
fn explicit_unwrap_path_takes_precedence() {
    let v = json!({
        "data": [{"id": "wrong", "name": "Wrong"}],
        "extra": {"districts": [{"id": "10", "name": "Gasabo"}]}
    });
    let opts = parse_option_items(&v, Some("extra.districts"));
    assert_eq!(opts.len(), 1);
    assert_eq!(opts[0].key, "10");
}

#[test]
fn items_without_a_key_are_skipped() {
    let v = json!({"data": [{"name": "no key here"}, 42, {"id": "1", "name": "ok"}]});
    let opts = parse_option_items(&v, None);
    assert_eq!(opts.len(), 1);
    assert_eq!(opts[0].key, "1");
}

#[test]
fn error_display_is_user_presentable() {
    let e = DirectoryError::Server {
        status: Some(503),
        message: "directory unavailable".into(),
    };
    assert_eq!(e.to_string(), "server error (503): directory unavailable");
    assert_eq!(DirectoryError::Auth.to_string(), "authentication required");
    assert_eq!(
        DirectoryError::UnknownDocumentType("X9".into()).to_string(),
        "unknown document type: X9"
    );
}

#[test]
fn get_by_path_traverses_nested_objects() {
    let v = json!({"data": {"pagination": {"page": 2}}});
    assert_eq!(
        get_by_path(&v, "data.pagination.page").unwrap().as_i64(),
        Some(2)
    );
    assert!(get_by_path(&v, "data.missing").is_none());
}
