use crate::graph::engine::{EngineEvent, FetchOptions, SelectionEngine};
use crate::graph::store::OptionItem;
use crate::model::MenuItem;
use crate::nav::keys::{menu_key, value_id};
use crate::services::directory::{DirectoryError, OptionSource};
use crate::ui::{AppState, DashboardViewState, RegisterState, View};
use serde_json::Value as JsonValue;

pub enum AppMsg {
    EnterMenu(MenuItem),
    RefreshMenu(MenuItem),
    EnterChild {
        key: String,
        val: JsonValue,
    },
    SlotPicked {
        slot: String,
        key: Option<String>,
    },
    SlotReload {
        slot: String,
    },
    PanelActivated {
        panel: String,
    },
    SubmitRequested,
    LoadedSlotOptions {
        slot: String,
        token: u64,
        outcome: Result<Vec<OptionItem>, DirectoryError>,
    },
    LoadedPanelContent {
        panel: String,
        token: u64,
        outcome: Result<JsonValue, DirectoryError>,
    },
    LoadedRoster {
        key: String,
        outcome: Result<Vec<JsonValue>, DirectoryError>,
    },
    LoadedDetail {
        key: String,
        outcome: Result<JsonValue, DirectoryError>,
    },
    LoadedSubmit {
        outcome: Result<JsonValue, DirectoryError>,
    },
}

#[allow(clippy::large_enum_variant)]
pub enum Effect {
    FetchSlotOptions {
        slot: String,
        source: OptionSource,
        parent_key: Option<String>,
        token: u64,
    },
    FetchPanelContent {
        panel: String,
        command: String,
        context_key: String,
        token: u64,
    },
    LoadRoster {
        cmdline: String,
        unwrap: Option<String>,
        key: String,
    },
    LoadDetail {
        cmdline: String,
        key: String,
    },
    SubmitForm {
        cmdline: String,
    },
    ForceReauth,
    ShowToast {
        text: String,
        level: crate::ui::ToastLevel,
        seconds: u64,
    },
}

/// Map the engine's fetch requests onto effects, resolving each slot's
/// command template from the register screen's chain config.
fn slot_fetch_effects(state: &mut AppState, fetches: Vec<FetchOptions>) -> Vec<Effect> {
    let mut effects = Vec::new();
    for fetch in fetches {
        let source = state
            .register
            .as_ref()
            .and_then(|reg| reg.slot_spec(&fetch.slot))
            .map(|spec| OptionSource {
                command: spec.command.clone(),
                unwrap: spec.unwrap.clone(),
            });
        match source {
            Some(source) => effects.push(Effect::FetchSlotOptions {
                slot: fetch.slot,
                source,
                parent_key: fetch.parent_key,
                token: fetch.token,
            }),
            None => state.dbg(format!("no source configured for slot {}", fetch.slot)),
        }
    }
    effects
}

/// Engine events left behind by the last engine call: reauthentication
/// escalates to an effect, stale discards go to the debug log.
fn drain_engine_events(state: &mut AppState) -> Vec<Effect> {
    let events: Vec<EngineEvent> = state.engine_events.borrow_mut().drain(..).collect();
    let mut effects = Vec::new();
    for ev in events {
        match ev {
            EngineEvent::ReauthenticationRequired => effects.push(Effect::ForceReauth),
            EngineEvent::StaleResponseDiscarded { name, token } => {
                state.dbg(format!("stale response discarded: {name} (token {token})"));
            }
            EngineEvent::SlotChanged { .. } | EngineEvent::PanelChanged { .. } => {}
        }
    }
    effects
}

fn enter_register(state: &mut AppState, mi: MenuItem) -> Vec<Effect> {
    let mut engine = SelectionEngine::new();
    for s in &mi.slots {
        engine.add_slot(&s.name, s.parent.as_deref());
    }
    state.attach_engine(engine);
    let root = mi.slots.first().map(|s| s.name.clone());
    state.register = Some(RegisterState::new(mi));
    state.dashboard = None;
    state.view = View::Register;
    state.panel_focus = crate::ui::PanelPane::A;
    let mut effects = Vec::new();
    if let Some(root) = root {
        if let Some(fetch) = state.engine.reload(&root) {
            effects.extend(slot_fetch_effects(state, vec![fetch]));
        }
    }
    effects.extend(drain_engine_events(state));
    effects
}

fn enter_dashboard(state: &mut AppState, mi: MenuItem) -> Vec<Effect> {
    let mut engine = SelectionEngine::new();
    for p in &mi.panels {
        engine.add_panel(&p.name);
    }
    state.attach_engine(engine);
    let first = mi.panels.first().map(|p| p.name.clone());
    state.dashboard = Some(DashboardViewState::new(mi));
    state.register = None;
    state.view = View::Dashboard;
    match first {
        Some(first) => activate_panel(state, &first),
        None => Vec::new(),
    }
}

fn activate_panel(state: &mut AppState, panel: &str) -> Vec<Effect> {
    let Some(command) = state
        .dashboard
        .as_ref()
        .and_then(|d| d.panel_spec(panel))
        .map(|spec| spec.command.clone())
    else {
        state.dbg(format!("no command configured for panel {panel}"));
        return Vec::new();
    };
    let context_key = state.session.context_key();
    let fetch = state.engine.activate_panel(panel, &context_key);
    let mut effects = vec![Effect::FetchPanelContent {
        panel: fetch.panel,
        command,
        context_key: fetch.context_key,
        token: fetch.token,
    }];
    effects.extend(drain_engine_events(state));
    effects
}

/// Submission needs both halves of the register screen: the validated form
/// fields plus a complete address chain from the engine.
fn submit_registration(state: &mut AppState) -> Vec<Effect> {
    let Some(reg) = &mut state.register else {
        return Vec::new();
    };
    if !crate::widgets::form::validate_form(&mut reg.form.form) {
        return Vec::new();
    }
    let mut missing: Vec<&str> = Vec::new();
    for name in state.engine.slot_names() {
        if state.engine.slot(name).selected.is_none() {
            missing.push(name);
        }
    }
    if !missing.is_empty() {
        reg.form.form.message = Some(format!("Complete the address: {}", missing.join(", ")));
        return Vec::new();
    }
    let Some(mut cmdline) = crate::widgets::form::build_cmdline(&reg.form.form) else {
        return Vec::new();
    };
    for name in state.engine.slot_names() {
        if let Some(key) = &state.engine.slot(name).selected {
            cmdline.push_str(&format!(" --{name} {key}"));
        }
    }
    vec![Effect::SubmitForm { cmdline }]
}

pub fn update(state: &mut AppState, msg: AppMsg) -> Vec<Effect> {
    use AppMsg::*;
    let mut effects: Vec<Effect> = Vec::new();
    match msg {
        EnterMenu(mi) => match mi.widget.as_deref() {
            Some("register") => return enter_register(state, mi),
            Some("dashboard") => return enter_dashboard(state, mi),
            Some("lazy_items") | Some("autoload_items") => {
                let key = menu_key(&mi);
                if state.expanded.contains(&key) {
                    state.expanded.remove(&key);
                } else {
                    state.expanded.insert(key.clone());
                    if !state.children.contains_key(&key) && !state.loading.contains(&key) {
                        if let Some(cmdline) = mi.command.clone() {
                            state.loading.insert(key.clone());
                            effects.push(Effect::LoadRoster {
                                cmdline,
                                unwrap: mi.unwrap.clone(),
                                key,
                            });
                        }
                    }
                }
            }
            _ => {
                // Static inline children: seed and toggle
                let has_static = mi.children.as_ref().map(|v| !v.is_empty()).unwrap_or(false);
                if has_static {
                    let key = menu_key(&mi);
                    if !state.children.contains_key(&key) {
                        state
                            .children
                            .insert(key.clone(), mi.children.clone().unwrap_or_default());
                    }
                    if state.expanded.contains(&key) {
                        state.expanded.remove(&key);
                    } else {
                        state.expanded.insert(key);
                    }
                }
            }
        },
        RefreshMenu(mi) => {
            let key = menu_key(&mi);
            if let Some(cmdline) = mi.command.clone() {
                if !state.loading.contains(&key) {
                    state.loading.insert(key.clone());
                    state.expanded.insert(key.clone());
                    effects.push(Effect::LoadRoster {
                        cmdline,
                        unwrap: mi.unwrap.clone(),
                        key,
                    });
                }
            }
        }
        EnterChild { key, val } => {
            if crate::ui::is_lazy_value(&val) {
                if state.expanded.contains(&key) {
                    state.expanded.remove(&key);
                } else {
                    state.expanded.insert(key.clone());
                    if !state.children.contains_key(&key) && !state.loading.contains(&key) {
                        if let Some(cmdline) =
                            val.get("command").and_then(|s| s.as_str()).map(String::from)
                        {
                            state.loading.insert(key.clone());
                            effects.push(Effect::LoadRoster {
                                cmdline,
                                unwrap: val
                                    .get("unwrap")
                                    .and_then(|s| s.as_str())
                                    .map(String::from),
                                key,
                            });
                        }
                    }
                }
            } else {
                // A plain roster record: fetch its application detail when
                // the owning menu entry knows how, otherwise show the record.
                let menu_id = key
                    .strip_prefix("menu:")
                    .and_then(|rest| rest.split('/').next())
                    .unwrap_or("");
                let detail_cmd = state
                    .config
                    .menu
                    .iter()
                    .find(|m| m.id == menu_id)
                    .and_then(|m| m.detail_command.clone());
                match (detail_cmd, value_id(&val)) {
                    (Some(tpl), Some(id)) => {
                        state.loading.insert(key.clone());
                        effects.push(Effect::LoadDetail {
                            cmdline: tpl.replace("${MEMBER}", &id),
                            key,
                        });
                    }
                    _ => {
                        state.open_detail(crate::ui::title_from_value(&val), val);
                    }
                }
            }
        }
        SlotPicked { slot, key } => {
            let fetches = state.engine.select(&slot, key.as_deref());
            effects.extend(slot_fetch_effects(state, fetches));
            effects.extend(drain_engine_events(state));
        }
        SlotReload { slot } => {
            if let Some(fetch) = state.engine.reload(&slot) {
                effects.extend(slot_fetch_effects(state, vec![fetch]));
            }
            effects.extend(drain_engine_events(state));
        }
        PanelActivated { panel } => return activate_panel(state, &panel),
        SubmitRequested => return submit_registration(state),
        LoadedSlotOptions {
            slot,
            token,
            outcome,
        } => {
            // A response for a view that was left behind: its slots are gone
            // with the view's engine.
            if !state.engine.has_slot(&slot) {
                state.dbg(format!("dropping response for departed slot {slot}"));
                return effects;
            }
            state.engine.apply_options(&slot, token, outcome);
            effects.extend(drain_engine_events(state));
        }
        LoadedPanelContent {
            panel,
            token,
            outcome,
        } => {
            if !state.engine.has_panel(&panel) {
                state.dbg(format!("dropping response for departed panel {panel}"));
                return effects;
            }
            state.engine.apply_panel(&panel, token, outcome);
            effects.extend(drain_engine_events(state));
        }
        LoadedRoster { key, outcome } => {
            state.loading.remove(&key);
            match outcome {
                Ok(items) => {
                    state.children.insert(key, items);
                }
                Err(DirectoryError::Auth) => effects.push(Effect::ForceReauth),
                Err(e) => {
                    state.dbg(format!("roster load failed: {key}: {e}"));
                    effects.push(Effect::ShowToast {
                        text: e.to_string(),
                        level: crate::ui::ToastLevel::Error,
                        seconds: 5,
                    });
                }
            }
        }
        LoadedDetail { key, outcome } => {
            state.loading.remove(&key);
            match outcome {
                Ok(v) => state.open_detail("Application", v),
                Err(DirectoryError::Auth) => effects.push(Effect::ForceReauth),
                Err(e) => effects.push(Effect::ShowToast {
                    text: e.to_string(),
                    level: crate::ui::ToastLevel::Error,
                    seconds: 5,
                }),
            }
        }
        LoadedSubmit { outcome } => {
            state.submitting = false;
            state.status_text = None;
            if let Some(reg) = &mut state.register {
                reg.form.form.disabled = false;
            }
            match outcome {
                Ok(envelope) => {
                    let ok = envelope.get("ok").and_then(|b| b.as_bool()).unwrap_or(true);
                    if ok {
                        if let Some(reg) = &mut state.register {
                            reg.form.form.message = Some("Application submitted".into());
                        }
                        effects.push(Effect::ShowToast {
                            text: "Application submitted".into(),
                            level: crate::ui::ToastLevel::Success,
                            seconds: 5,
                        });
                    } else {
                        let applied = state
                            .register
                            .as_mut()
                            .map(|reg| reg.form.apply_submit_errors(&envelope))
                            .unwrap_or(0);
                        if applied == 0 {
                            let msg = envelope
                                .get("data")
                                .and_then(|d| d.get("message"))
                                .and_then(|s| s.as_str())
                                .unwrap_or("submission rejected")
                                .to_string();
                            effects.push(Effect::ShowToast {
                                text: msg,
                                level: crate::ui::ToastLevel::Error,
                                seconds: 5,
                            });
                        }
                    }
                }
                Err(DirectoryError::Auth) => effects.push(Effect::ForceReauth),
                Err(e) => effects.push(Effect::ShowToast {
                    text: e.to_string(),
                    level: crate::ui::ToastLevel::Error,
                    seconds: 5,
                }),
            }
        }
    }
    effects
}

#[cfg(test)]
mod tests;
