use super::*;
use crate::graph::store::SlotStatus;
use crate::model::{FieldSpec, PanelSpec, SlotSpec};
use crate::ui::AppState;
use serde_json::json;

fn slot(name: &str, parent: Option<&str>) -> SlotSpec {
    SlotSpec {
        name: name.into(),
        title: name.into(),
        command: format!("${{GATEWAY_BIN}} locations {name} --parent ${{PARENT}}"),
        unwrap: None,
        parent: parent.map(str::to_string),
    }
}

fn register_item() -> MenuItem {
    MenuItem {
        id: "register".into(),
        title: "New Application".into(),
        widget: Some("register".into()),
        slots: vec![
            slot("province", None),
            slot("district", Some("province")),
            slot("sector", Some("district")),
            slot("cell", Some("sector")),
            slot("village", Some("cell")),
        ],
        fields: vec![FieldSpec {
            name: "full_name".into(),
            label: "Full name".into(),
            required: true,
            ..Default::default()
        }],
        submit_command: Some("${GATEWAY_BIN} applications submit".into()),
        ..Default::default()
    }
}

fn dashboard_item() -> MenuItem {
    MenuItem {
        id: "dashboard".into(),
        title: "My Application".into(),
        widget: Some("dashboard".into()),
        panels: vec![
            PanelSpec {
                name: "under_review".into(),
                title: "Under Review".into(),
                command: "${GATEWAY_BIN} applications status --tin ${CONTEXT}".into(),
            },
            PanelSpec {
                name: "my_documents".into(),
                title: "My Documents".into(),
                command: "${GATEWAY_BIN} documents list --tin ${CONTEXT}".into(),
            },
        ],
        ..Default::default()
    }
}

fn register_state() -> AppState {
    let mut st = AppState::default();
    let effs = update(&mut st, AppMsg::EnterMenu(register_item()));
    // Entering the screen immediately loads the root slot
    assert!(matches!(
        effs.as_slice(),
        [Effect::FetchSlotOptions { slot, parent_key: None, .. }] if slot == "province"
    ));
    st
}

fn opts(pairs: &[(&str, &str)]) -> Vec<crate::graph::store::OptionItem> {
    pairs
        .iter()
        .map(|(k, l)| crate::graph::store::OptionItem::new(*k, *l))
        .collect()
}

#[test]
fn picking_a_province_requests_district_options_with_the_parent_key() {
    let mut st = register_state();
    let token = st.engine.slot("province").current_token();
    let _ = update(
        &mut st,
        AppMsg::LoadedSlotOptions {
            slot: "province".into(),
            token,
            outcome: Ok(opts(&[("1", "Kigali City")])),
        },
    );
    let effs = update(
        &mut st,
        AppMsg::SlotPicked {
            slot: "province".into(),
            key: Some("1".into()),
        },
    );
    match effs.as_slice() {
        [Effect::FetchSlotOptions {
            slot,
            source,
            parent_key,
            ..
        }] => {
            assert_eq!(slot, "district");
            assert_eq!(parent_key.as_deref(), Some("1"));
            assert!(source.command.contains("districts"));
        }
        _ => panic!("expected one district fetch"),
    }
    assert_eq!(st.engine.slot("district").status, SlotStatus::Loading);
}

#[test]
fn reselecting_a_province_resets_the_chain_before_any_response() {
    let mut st = register_state();
    let t = st.engine.slot("province").current_token();
    let _ = update(
        &mut st,
        AppMsg::LoadedSlotOptions {
            slot: "province".into(),
            token: t,
            outcome: Ok(opts(&[("1", "Kigali City"), ("2", "Southern")])),
        },
    );
    let effs = update(
        &mut st,
        AppMsg::SlotPicked {
            slot: "province".into(),
            key: Some("1".into()),
        },
    );
    let district_token = match effs.as_slice() {
        [Effect::FetchSlotOptions { token, .. }] => *token,
        _ => panic!("expected district fetch"),
    };
    let _ = update(
        &mut st,
        AppMsg::LoadedSlotOptions {
            slot: "district".into(),
            token: district_token,
            outcome: Ok(opts(&[("10", "Gasabo")])),
        },
    );
    let _ = update(
        &mut st,
        AppMsg::SlotPicked {
            slot: "district".into(),
            key: Some("10".into()),
        },
    );

    // Switch provinces while the old district response is conceptually still
    // out there: every deeper slot resets synchronously.
    let _ = update(
        &mut st,
        AppMsg::SlotPicked {
            slot: "province".into(),
            key: Some("2".into()),
        },
    );
    for name in ["sector", "cell", "village"] {
        assert_eq!(st.engine.slot(name).status, SlotStatus::Idle);
        assert!(st.engine.slot(name).options.is_empty());
        assert!(st.engine.slot(name).selected.is_none());
    }
    // The stale district response is dropped at the gate.
    let _ = update(
        &mut st,
        AppMsg::LoadedSlotOptions {
            slot: "district".into(),
            token: district_token,
            outcome: Ok(opts(&[("99", "stale")])),
        },
    );
    assert!(st.engine.slot("district").options.is_empty());
    assert!(st
        .debug_log
        .iter()
        .any(|l| l.contains("stale response discarded")));
}

#[test]
fn auth_failure_on_a_slot_forces_reauthentication() {
    let mut st = register_state();
    let token = st.engine.slot("province").current_token();
    let effs = update(
        &mut st,
        AppMsg::LoadedSlotOptions {
            slot: "province".into(),
            token,
            outcome: Err(DirectoryError::Auth),
        },
    );
    assert!(matches!(effs.as_slice(), [Effect::ForceReauth]));
    assert_eq!(st.engine.slot("province").status, SlotStatus::Idle);
}

#[test]
fn server_failure_stays_on_the_slot() {
    let mut st = register_state();
    let token = st.engine.slot("province").current_token();
    let effs = update(
        &mut st,
        AppMsg::LoadedSlotOptions {
            slot: "province".into(),
            token,
            outcome: Err(DirectoryError::Server {
                status: Some(500),
                message: "directory unavailable".into(),
            }),
        },
    );
    assert!(effs.is_empty());
    assert_eq!(st.engine.slot("province").status, SlotStatus::Failed);
}

#[test]
fn entering_the_dashboard_activates_the_first_panel() {
    let mut st = AppState::default();
    st.session.tin = Some("102345678".into());
    let effs = update(&mut st, AppMsg::EnterMenu(dashboard_item()));
    match effs.as_slice() {
        [Effect::FetchPanelContent {
            panel, context_key, ..
        }] => {
            assert_eq!(panel, "under_review");
            assert_eq!(context_key, "102345678");
        }
        _ => panic!("expected a panel fetch"),
    }
    assert!(st.engine.panel("under_review").active);
}

#[test]
fn switching_panels_discards_the_late_response_of_the_first() {
    let mut st = AppState::default();
    let _ = update(&mut st, AppMsg::EnterMenu(dashboard_item()));
    let first_token = st.engine.panel("under_review").current_token();
    let effs = update(
        &mut st,
        AppMsg::PanelActivated {
            panel: "my_documents".into(),
        },
    );
    assert!(matches!(effs.as_slice(), [Effect::FetchPanelContent { .. }]));
    assert!(!st.engine.panel("under_review").active);

    let _ = update(
        &mut st,
        AppMsg::LoadedPanelContent {
            panel: "under_review".into(),
            token: first_token,
            outcome: Ok(json!({"status": "PENDING"})),
        },
    );
    assert!(!st.engine.panel("under_review").active);
    assert!(st.engine.panel("under_review").content.is_none());
    let second_token = st.engine.panel("my_documents").current_token();
    let _ = update(
        &mut st,
        AppMsg::LoadedPanelContent {
            panel: "my_documents".into(),
            token: second_token,
            outcome: Ok(json!({"documents": [{"document_type": "DEGREE"}]})),
        },
    );
    assert_eq!(
        st.engine.panel("my_documents").status,
        SlotStatus::Loaded
    );
}

#[test]
fn submit_requires_a_complete_address_chain() {
    let mut st = register_state();
    if let Some(reg) = &mut st.register {
        reg.form.form.fields[0].value =
            crate::widgets::form::FieldValue::Text("Umutoni Aline".into());
    }
    let effs = update(&mut st, AppMsg::SubmitRequested);
    assert!(effs.is_empty());
    let msg = st
        .register
        .as_ref()
        .and_then(|r| r.form.form.message.clone())
        .unwrap();
    assert!(msg.contains("Complete the address"));

    // Fill the whole chain, then submission goes out with address flags.
    for name in ["province", "district", "sector", "cell", "village"] {
        st.engine.select(name, Some("1"));
    }
    let effs = update(&mut st, AppMsg::SubmitRequested);
    match effs.as_slice() {
        [Effect::SubmitForm { cmdline }] => {
            assert!(cmdline.contains("--full-name"));
            assert!(cmdline.contains("--village 1"));
        }
        _ => panic!("expected a submit effect"),
    }
}

#[test]
fn submit_validation_failure_stays_local() {
    let mut st = register_state();
    let effs = update(&mut st, AppMsg::SubmitRequested);
    assert!(effs.is_empty());
    let reg = st.register.as_ref().unwrap();
    assert_eq!(reg.form.form.fields[0].error.as_deref(), Some("required"));
}

#[test]
fn rejected_submit_envelope_maps_field_errors() {
    let mut st = register_state();
    let effs = update(
        &mut st,
        AppMsg::LoadedSubmit {
            outcome: Ok(json!({
                "ok": false,
                "type": "error",
                "data": {"details": {"errors": [
                    {"loc": ["payload", "full_name"], "msg": "Too short"}
                ]}}
            })),
        },
    );
    assert!(effs.is_empty());
    let reg = st.register.as_ref().unwrap();
    assert_eq!(reg.form.form.fields[0].error.as_deref(), Some("Too short"));
}

#[test]
fn roster_loads_expand_and_fill_children() {
    let mut st = AppState::default();
    let members = MenuItem {
        id: "members".into(),
        title: "Members".into(),
        widget: Some("lazy_items".into()),
        command: Some("${GATEWAY_BIN} company members".into()),
        ..Default::default()
    };
    st.config.menu = vec![members.clone()];
    let effs = update(&mut st, AppMsg::EnterMenu(members));
    let key = match effs.as_slice() {
        [Effect::LoadRoster { key, .. }] => key.clone(),
        _ => panic!("expected a roster load"),
    };
    assert!(st.loading.contains(&key));
    let _ = update(
        &mut st,
        AppMsg::LoadedRoster {
            key: key.clone(),
            outcome: Ok(vec![json!({"id": "m-1", "name": "Umutoni A."})]),
        },
    );
    assert!(!st.loading.contains(&key));
    assert_eq!(st.children.get(&key).unwrap().len(), 1);
}

#[test]
fn member_detail_uses_the_configured_command_template() {
    let mut st = AppState::default();
    st.config.menu = vec![MenuItem {
        id: "members".into(),
        title: "Members".into(),
        widget: Some("lazy_items".into()),
        command: Some("${GATEWAY_BIN} company members".into()),
        detail_command: Some("${GATEWAY_BIN} applications show --member ${MEMBER}".into()),
        ..Default::default()
    }];
    let effs = update(
        &mut st,
        AppMsg::EnterChild {
            key: "menu:members/m-1".into(),
            val: json!({"id": "m-1", "name": "Umutoni A."}),
        },
    );
    match effs.as_slice() {
        [Effect::LoadDetail { cmdline, .. }] => {
            assert!(cmdline.ends_with("--member m-1"));
        }
        _ => panic!("expected a detail load"),
    }
}

#[test]
fn responses_for_a_departed_view_are_dropped() {
    let mut st = register_state();
    let province_token = st.engine.slot("province").current_token();
    // Navigate away: the dashboard rebuilds the engine around panels.
    let _ = update(&mut st, AppMsg::EnterMenu(dashboard_item()));
    let effs = update(
        &mut st,
        AppMsg::LoadedSlotOptions {
            slot: "province".into(),
            token: province_token,
            outcome: Ok(opts(&[("1", "Kigali City")])),
        },
    );
    assert!(effs.is_empty());
    assert!(st
        .debug_log
        .iter()
        .any(|l| l.contains("departed slot province")));
}

#[test]
fn roster_auth_failure_forces_reauthentication() {
    let mut st = AppState::default();
    let effs = update(
        &mut st,
        AppMsg::LoadedRoster {
            key: "menu:members".into(),
            outcome: Err(DirectoryError::Auth),
        },
    );
    assert!(matches!(effs.as_slice(), [Effect::ForceReauth]));
}
