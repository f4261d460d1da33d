use crate::nav::keys::{child_key, menu_key};
use crate::ui::{is_header, AppState, FlatNode};

/// Flatten the top-level menu plus expanded roster children into the linear
/// list the left pane renders and navigates.
pub fn flatten_nodes(state: &AppState) -> Vec<FlatNode> {
    fn append_children(out: &mut Vec<FlatNode>, state: &AppState, parent_key: &str, depth: usize) {
        if let Some(children) = state.children.get(parent_key) {
            for (ci, val) in children.iter().enumerate() {
                let key = child_key(parent_key, val, ci);
                out.push(FlatNode::Child {
                    key: key.clone(),
                    depth,
                    val: val.clone(),
                });
                if state.expanded.contains(&key) {
                    append_children(out, state, &key, depth + 1);
                }
            }
        }
    }

    let mut out = Vec::new();
    for (i, mi) in state.config.menu.iter().enumerate() {
        if is_header(mi) {
            out.push(FlatNode::Header { idx: i, depth: 0 });
            continue;
        }
        out.push(FlatNode::Menu { idx: i, depth: 0 });
        let key = menu_key(mi);
        if state.expanded.contains(&key) {
            append_children(&mut out, state, &key, 1);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AppConfig, MenuItem};
    use serde_json::json;

    fn make_state() -> AppState {
        let mut state = AppState::default();
        let mi_header = MenuItem {
            id: "hdr".into(),
            title: "Company".into(),
            widget: Some("header".into()),
            ..Default::default()
        };
        let mi_members = MenuItem {
            id: "members".into(),
            title: "Members".into(),
            widget: Some("lazy_items".into()),
            command: Some("${GATEWAY_BIN} company members".into()),
            initial_text: Some("Enter to load".into()),
            ..Default::default()
        };
        state.config = AppConfig {
            header: Some("Test".into()),
            menu: vec![mi_header, mi_members.clone()],
            ..Default::default()
        };

        // Simulate a loaded roster with one member whose applications are
        // themselves expanded.
        let key = menu_key(&mi_members);
        state.expanded.insert(key.clone());
        state.children.insert(
            key.clone(),
            vec![json!({"id": "m-1", "name": "Umutoni A.", "status": "PENDING"})],
        );
        let child_k = child_key(&key, &state.children.get(&key).unwrap()[0], 0);
        state.expanded.insert(child_k.clone());
        state.children.insert(
            child_k,
            vec![json!({"id": "app-9", "title": "Application 2024"})],
        );
        state
    }

    #[test]
    fn flattens_headers_members_and_their_applications() {
        let state = make_state();
        let nodes = flatten_nodes(&state);
        assert!(nodes.len() >= 4);
        assert!(matches!(nodes[0], FlatNode::Header { .. }));
        assert!(matches!(nodes[1], FlatNode::Menu { .. }));
        assert!(matches!(nodes[2], FlatNode::Child { .. }));
        assert!(matches!(nodes[3], FlatNode::Child { .. }));
    }
}
