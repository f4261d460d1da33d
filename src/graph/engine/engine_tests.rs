use super::*;
use std::cell::RefCell;
use std::rc::Rc;

fn address_engine() -> SelectionEngine {
    let mut eng = SelectionEngine::new();
    eng.add_slot("province", None);
    eng.add_slot("district", Some("province"));
    eng.add_slot("sector", Some("district"));
    eng.add_slot("cell", Some("sector"));
    eng.add_slot("village", Some("cell"));
    eng
}

fn opts(pairs: &[(&str, &str)]) -> Vec<OptionItem> {
    pairs
        .iter()
        .map(|(k, l)| OptionItem::new(*k, *l))
        .collect()
}

#[test]
fn selecting_province_requests_district_options() {
    let mut eng = address_engine();
    let fetches = eng.select("province", Some("1"));
    assert_eq!(fetches.len(), 1);
    assert_eq!(fetches[0].slot, "district");
    assert_eq!(fetches[0].parent_key.as_deref(), Some("1"));
    assert_eq!(eng.slot("district").status, SlotStatus::Loading);

    eng.apply_options(
        "district",
        fetches[0].token,
        Ok(opts(&[("10", "Gasabo"), ("11", "Nyarugenge")])),
    );
    let district = eng.slot("district");
    assert_eq!(district.status, SlotStatus::Loaded);
    assert_eq!(district.options.len(), 2);
    assert!(district.selected.is_none());
}

#[test]
fn reselecting_province_resets_the_whole_chain_before_the_new_fetch_lands() {
    let mut eng = address_engine();
    let f = eng.select("province", Some("1"));
    eng.apply_options("district", f[0].token, Ok(opts(&[("10", "Gasabo")])));
    let f = eng.select("district", Some("10"));
    eng.apply_options("sector", f[0].token, Ok(opts(&[("100", "Remera")])));
    eng.select("sector", Some("100"));

    // Switch provinces: everything below must be reset synchronously, while
    // the district fetch for the new province is still in flight.
    let f2 = eng.select("province", Some("2"));
    for name in ["district", "sector", "cell", "village"] {
        let slot = eng.slot(name);
        assert!(slot.selected.is_none(), "{name} kept a stale selection");
        if name == "district" {
            assert_eq!(slot.status, SlotStatus::Loading);
        } else {
            assert_eq!(slot.status, SlotStatus::Idle);
        }
        assert!(slot.options.is_empty(), "{name} kept stale options");
    }
    eng.apply_options("district", f2[0].token, Ok(opts(&[("20", "Huye")])));
    assert_eq!(eng.slot("district").options.len(), 1);
}

#[test]
fn stale_response_is_never_applied() {
    let mut eng = address_engine();
    let first = eng.select("province", Some("1"));
    let second = {
        // Fast re-selection: the first district fetch is still in flight.
        let fetches = eng.select("province", Some("2"));
        fetches[0].clone()
    };
    let events: Rc<RefCell<Vec<EngineEvent>>> = Rc::default();
    let sink = events.clone();
    eng.subscribe(move |ev| sink.borrow_mut().push(ev.clone()));

    // The slow first response arrives after the second one.
    eng.apply_options("district", second.token, Ok(opts(&[("20", "Huye")])));
    eng.apply_options("district", first[0].token, Ok(opts(&[("10", "Gasabo")])));

    let district = eng.slot("district");
    assert_eq!(district.options, opts(&[("20", "Huye")]));
    assert!(events.borrow().iter().any(|ev| matches!(
        ev,
        EngineEvent::StaleResponseDiscarded { name, .. } if name == "district"
    )));
}

#[test]
fn reselecting_the_same_key_is_a_no_op() {
    let mut eng = address_engine();
    let f = eng.select("province", Some("1"));
    eng.apply_options("district", f[0].token, Ok(opts(&[("10", "Gasabo")])));
    eng.select("district", Some("10"));

    let fetches = eng.select("province", Some("1"));
    assert!(fetches.is_empty());
    // Children survive untouched.
    assert_eq!(eng.slot("district").selected.as_deref(), Some("10"));
    assert_eq!(eng.slot("district").options.len(), 1);
}

#[test]
fn clearing_a_selection_invalidates_without_fetching() {
    let mut eng = address_engine();
    let f = eng.select("province", Some("1"));
    eng.apply_options("district", f[0].token, Ok(opts(&[("10", "Gasabo")])));
    eng.select("district", Some("10"));

    let fetches = eng.select("province", None);
    assert!(fetches.is_empty());
    assert!(eng.slot("province").selected.is_none());
    for name in ["district", "sector", "cell", "village"] {
        assert_eq!(eng.slot(name).status, SlotStatus::Idle);
        assert!(eng.slot(name).options.is_empty());
    }
}

#[test]
fn auth_failure_is_session_level_not_slot_level() {
    let mut eng = address_engine();
    let events: Rc<RefCell<Vec<EngineEvent>>> = Rc::default();
    let sink = events.clone();
    eng.subscribe(move |ev| sink.borrow_mut().push(ev.clone()));

    let fetches = eng.select("province", Some("1"));
    eng.apply_options(
        "district",
        fetches[0].token,
        Err(crate::services::directory::DirectoryError::Auth),
    );
    assert_eq!(eng.slot("district").status, SlotStatus::Idle);
    assert!(eng.slot("district").error.is_none());
    assert!(events
        .borrow()
        .contains(&EngineEvent::ReauthenticationRequired));
}

#[test]
fn server_failure_stays_inline_and_local() {
    let mut eng = address_engine();
    let f = eng.select("province", Some("1"));
    eng.apply_options(
        "district",
        f[0].token,
        Err(crate::services::directory::DirectoryError::Server {
            status: Some(500),
            message: "directory unavailable".into(),
        }),
    );
    let district = eng.slot("district");
    assert_eq!(district.status, SlotStatus::Failed);
    assert!(district.error.as_deref().unwrap().contains("directory"));
    // Ancestor untouched, descendants still invalidated.
    assert_eq!(eng.slot("province").selected.as_deref(), Some("1"));
    assert_eq!(eng.slot("sector").status, SlotStatus::Idle);
}

#[test]
fn reload_uses_the_parent_selection_and_none_for_roots() {
    let mut eng = address_engine();
    let root = eng.reload("province").expect("root always loadable");
    assert_eq!(root.parent_key, None);
    eng.apply_options("province", root.token, Ok(opts(&[("1", "Kigali City")])));

    // No district reload until a province is picked.
    assert!(eng.reload("district").is_none());
    eng.select("province", Some("1"));
    let again = eng.reload("district").expect("parent selected");
    assert_eq!(again.parent_key.as_deref(), Some("1"));
}

#[test]
fn activating_a_panel_deactivates_and_gates_the_previous_one() {
    let mut eng = SelectionEngine::new();
    eng.add_panel("under_review");
    eng.add_panel("my_documents");
    eng.add_panel("verified_documents");

    let first = eng.activate_panel("under_review", "tin-100");
    let second = eng.activate_panel("my_documents", "tin-100");
    assert!(!eng.panel("under_review").active);
    assert!(eng.panel("my_documents").active);

    // The late response for the deactivated panel must change nothing.
    eng.apply_panel(
        "under_review",
        first.token,
        Ok(serde_json::json!({"status": "PENDING"})),
    );
    assert!(!eng.panel("under_review").active);
    assert!(eng.panel("under_review").content.is_none());
    assert_eq!(eng.panel("under_review").status, SlotStatus::Idle);

    eng.apply_panel(
        "my_documents",
        second.token,
        Ok(serde_json::json!({"documents": []})),
    );
    assert_eq!(eng.panel("my_documents").status, SlotStatus::Loaded);
    assert!(eng.panel("my_documents").content.is_some());
}

#[test]
fn panel_auth_failure_requires_reauthentication() {
    let mut eng = SelectionEngine::new();
    eng.add_panel("under_review");
    let events: Rc<RefCell<Vec<EngineEvent>>> = Rc::default();
    let sink = events.clone();
    eng.subscribe(move |ev| sink.borrow_mut().push(ev.clone()));

    let fetch = eng.activate_panel("under_review", "tin-100");
    eng.apply_panel(
        "under_review",
        fetch.token,
        Err(crate::services::directory::DirectoryError::Auth),
    );
    assert_eq!(eng.panel("under_review").status, SlotStatus::Idle);
    assert!(events
        .borrow()
        .contains(&EngineEvent::ReauthenticationRequired));
}

#[test]
fn unsubscribed_listeners_stop_receiving() {
    let mut eng = address_engine();
    let events: Rc<RefCell<Vec<EngineEvent>>> = Rc::default();
    let sink = events.clone();
    let id = eng.subscribe(move |ev| sink.borrow_mut().push(ev.clone()));
    eng.select("province", Some("1"));
    let seen = events.borrow().len();
    assert!(seen > 0);
    assert!(eng.unsubscribe(id));
    eng.select("province", Some("2"));
    assert_eq!(events.borrow().len(), seen);
}
