use crate::app::{update, AppMsg, Effect};
use crate::graph::engine::{EngineEvent, SelectionEngine};
use crate::model::{AppConfig, MenuItem, SlotSpec};
use crate::nav::flatten::flatten_nodes;
use crate::services::directory::{DirectoryClient, DirectoryError, GatewayDirectoryClient};
use crate::services::loader;
use crate::services::session::SessionContext;
use crate::theme::Theme;
use crate::widgets::cascade::{self, CascadeState};
use crate::widgets::dashboard::{self, DashboardState};
use crate::widgets::detail::DetailViewerWidget;
use crate::widgets::form::form_from_spec;
use crate::widgets::form_widget::FormWidget;
use crate::widgets::menu::draw_menu;
use crate::widgets::Widget;
use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::*;
use ratatui::widgets::*;
use serde_json::Value as JsonValue;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum View {
    #[default]
    Menu,
    Register,
    Dashboard,
    Detail,
    SessionExpired,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PanelPane {
    #[default]
    A,
    B,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum PanelRatio {
    Half,       // 50/50
    OneToTwo,   // ~33/67
    TwoToOne,   // ~67/33
    OneToThree, // 25/75
    ThreeToOne, // 75/25
}

pub(crate) fn parse_panel_ratio(s: Option<&str>) -> PanelRatio {
    match s.unwrap_or("1:2") {
        "1:1" => PanelRatio::Half,
        "2:1" => PanelRatio::TwoToOne,
        "1:3" => PanelRatio::OneToThree,
        "3:1" => PanelRatio::ThreeToOne,
        _ => PanelRatio::OneToTwo,
    }
}

fn ratio_constraints(r: PanelRatio) -> [Constraint; 2] {
    match r {
        PanelRatio::Half => [Constraint::Percentage(50), Constraint::Percentage(50)],
        PanelRatio::OneToTwo => [Constraint::Percentage(33), Constraint::Percentage(67)],
        PanelRatio::TwoToOne => [Constraint::Percentage(67), Constraint::Percentage(33)],
        PanelRatio::OneToThree => [Constraint::Percentage(25), Constraint::Percentage(75)],
        PanelRatio::ThreeToOne => [Constraint::Percentage(75), Constraint::Percentage(25)],
    }
}

#[derive(Clone, Copy)]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

pub struct Toast {
    pub text: String,
    pub level: ToastLevel,
    pub expires_at_tick: u64,
}

#[derive(Clone)]
pub(crate) enum FlatNode {
    Header { idx: usize, depth: usize },
    Menu { idx: usize, depth: usize },
    Child { key: String, depth: usize, val: JsonValue },
}

// Async loading support: every worker reports back through one channel.
pub(crate) enum LoadOutcome {
    Options(Vec<crate::graph::store::OptionItem>),
    Content(JsonValue),
    Items(Vec<JsonValue>),
}

pub(crate) struct LoadMsg {
    pub(crate) key: String,
    pub(crate) token: u64,
    pub(crate) outcome: Result<LoadOutcome, DirectoryError>,
    pub(crate) kind: LoadKind,
}

#[derive(Clone, Copy)]
pub(crate) enum LoadKind {
    SlotOptions,
    PanelContent,
    Roster,
    Detail,
    SubmitForm,
}

/// The register screen: the address cascade beside the application form.
pub(crate) struct RegisterState {
    pub mi: MenuItem,
    pub cascade: CascadeState,
    pub form: FormWidget,
    pub ratio: PanelRatio,
}

impl RegisterState {
    pub fn new(mi: MenuItem) -> Self {
        let form = FormWidget::new(form_from_spec(
            mi.title.clone(),
            &mi.fields,
            mi.submit_command.as_deref().unwrap_or(""),
        ));
        let ratio = parse_panel_ratio(mi.panel_size.as_deref());
        Self {
            mi,
            cascade: CascadeState::default(),
            form,
            ratio,
        }
    }

    pub fn slot_spec(&self, name: &str) -> Option<&SlotSpec> {
        self.mi.slots.iter().find(|s| s.name == name)
    }
}

pub(crate) struct DashboardViewState {
    pub mi: MenuItem,
    pub ds: DashboardState,
}

impl DashboardViewState {
    pub fn new(mi: MenuItem) -> Self {
        Self {
            mi,
            ds: DashboardState::default(),
        }
    }

    pub fn panel_spec(&self, name: &str) -> Option<&crate::model::PanelSpec> {
        self.mi.panels.iter().find(|p| p.name == name)
    }
}

#[derive(Default)]
pub(crate) struct AppState {
    pub(crate) config: AppConfig,
    pub(crate) header_h: u16,
    pub(crate) logo_lines: Vec<String>,
    pub(crate) selected: usize,
    pub(crate) view: View,
    pub(crate) children: HashMap<String, Vec<JsonValue>>,
    pub(crate) expanded: HashSet<String>,
    pub(crate) loading: HashSet<String>,
    pub(crate) tick: u64,
    pub(crate) boot_autoload_done: bool,
    tx: Option<Sender<LoadMsg>>,
    rx: Option<Receiver<LoadMsg>>,
    // Left menu viewport
    pub(crate) menu_viewport_h: u16,
    pub(crate) menu_offset: usize,
    pub(crate) status_text: Option<String>,
    // The selection core and its event sink
    pub(crate) engine: SelectionEngine,
    pub(crate) engine_events: Rc<RefCell<Vec<EngineEvent>>>,
    pub(crate) session: SessionContext,
    pub(crate) client: Option<Arc<dyn DirectoryClient>>,
    // Per-view state
    pub(crate) register: Option<RegisterState>,
    pub(crate) dashboard: Option<DashboardViewState>,
    pub(crate) detail: Option<DetailViewerWidget>,
    pub(crate) detail_return: View,
    pub(crate) panel_focus: PanelPane,
    pub(crate) submitting: bool,
    pub(crate) toast: Option<Toast>,
    pub(crate) theme: Theme,
    pub(crate) horizontal_tab_index: usize,
    pub(crate) current_config_path: Option<String>,
    // Debug log (rendered in bottom debug pane)
    pub(crate) debug_log: VecDeque<String>,
}

impl AppState {
    pub fn dbg(&mut self, msg: impl Into<String>) {
        const MAX_LOG_LINES: usize = 200;
        if self.debug_log.len() >= MAX_LOG_LINES {
            self.debug_log.pop_front();
        }
        self.debug_log.push_back(msg.into());
    }

    /// Swap in the engine for the view being entered and resubscribe the
    /// event sink. Slots live exactly as long as their view.
    pub(crate) fn attach_engine(&mut self, mut engine: SelectionEngine) {
        self.engine_events.borrow_mut().clear();
        let sink = Rc::clone(&self.engine_events);
        engine.subscribe(move |ev| sink.borrow_mut().push(ev.clone()));
        self.engine = engine;
    }

    pub(crate) fn open_detail(&mut self, title: impl Into<String>, value: JsonValue) {
        self.detail = Some(DetailViewerWidget::new(title, value));
        if !matches!(self.view, View::Detail) {
            self.detail_return = self.view;
        }
        self.view = View::Detail;
    }
}

pub(crate) fn is_header(mi: &MenuItem) -> bool {
    matches!(mi.widget.as_deref(), Some("header"))
}
pub(crate) fn is_lazy(mi: &MenuItem) -> bool {
    matches!(mi.widget.as_deref(), Some("lazy_items"))
}
pub(crate) fn is_autoload(mi: &MenuItem) -> bool {
    matches!(mi.widget.as_deref(), Some("autoload_items"))
}
pub(crate) fn auto_expand_menu(mi: &MenuItem) -> bool {
    if !is_autoload(mi) {
        return false;
    }
    !mi.expand_on_enter.unwrap_or(false) && mi.auto_expand.unwrap_or(true)
}
pub(crate) fn is_lazy_value(v: &JsonValue) -> bool {
    v.get("widget").and_then(|s| s.as_str()) == Some("lazy_items")
}
pub(crate) fn title_from_value(v: &JsonValue) -> String {
    if let Some(t) = v.get("title").and_then(|s| s.as_str()) {
        return t.to_string();
    }
    if let Some(n) = v.get("name").and_then(|s| s.as_str()) {
        return n.to_string();
    }
    v.to_string().chars().take(60).collect()
}

fn run_effects(state: &mut AppState, effects: Vec<Effect>) {
    for eff in effects {
        match eff {
            Effect::FetchSlotOptions {
                slot,
                source,
                parent_key,
                token,
            } => {
                state.dbg(format!("load options {slot} (token {token})"));
                if let (Some(client), Some(tx)) = (state.client.clone(), state.tx.clone()) {
                    loader::spawn_load_slot_options(client, source, slot, parent_key, token, tx);
                }
            }
            Effect::FetchPanelContent {
                panel,
                command,
                context_key,
                token,
            } => {
                state.dbg(format!("load panel {panel} (token {token})"));
                if let (Some(client), Some(tx)) = (state.client.clone(), state.tx.clone()) {
                    loader::spawn_load_panel_content(client, command, panel, context_key, token, tx);
                }
            }
            Effect::LoadRoster {
                cmdline,
                unwrap,
                key,
            } => {
                state.dbg(format!("load roster {key} -> {cmdline}"));
                if let Some(tx) = state.tx.clone() {
                    loader::spawn_load_roster(cmdline, unwrap, key, state.session.clone(), tx);
                }
            }
            Effect::LoadDetail { cmdline, key } => {
                state.dbg(format!("load detail {key} -> {cmdline}"));
                if let Some(tx) = state.tx.clone() {
                    loader::spawn_load_detail(cmdline, key, state.session.clone(), tx);
                }
            }
            Effect::SubmitForm { cmdline } => {
                state.dbg(format!("submit: {cmdline}"));
                state.submitting = true;
                state.status_text = Some("Submitting...".into());
                if let Some(reg) = &mut state.register {
                    reg.form.form.disabled = true;
                    reg.form.form.editing = false;
                    reg.form.form.message = Some("Submitting...".into());
                }
                if let Some(tx) = state.tx.clone() {
                    loader::spawn_submit_form(cmdline, state.session.clone(), tx);
                }
            }
            Effect::ForceReauth => {
                state.dbg("authentication expired: session cleared");
                state.session.clear();
                state.client = Some(Arc::new(GatewayDirectoryClient::new(state.session.clone())));
                state.view = View::SessionExpired;
                state.toast = Some(Toast {
                    text: "Session expired. Sign in and restart.".into(),
                    level: ToastLevel::Error,
                    expires_at_tick: state.tick.saturating_add(50),
                });
            }
            Effect::ShowToast {
                text,
                level,
                seconds,
            } => {
                let ticks = seconds.saturating_mul(5); // ~200ms tick
                let exp = state.tick.saturating_add(ticks);
                state.toast = Some(Toast {
                    text,
                    level,
                    expires_at_tick: exp,
                });
            }
        }
    }
}

/// Route completed loads back into update(), keyed by load kind.
fn pump_load_msgs(state: &mut AppState) {
    let mut drained: Vec<LoadMsg> = Vec::new();
    if let Some(rx) = &state.rx {
        while let Ok(msg) = rx.try_recv() {
            drained.push(msg);
        }
    }
    for msg in drained {
        let LoadMsg {
            key,
            token,
            outcome,
            kind,
        } = msg;
        let effects = match kind {
            LoadKind::SlotOptions => {
                let outcome = outcome.map(|o| match o {
                    LoadOutcome::Options(v) => v,
                    _ => Vec::new(),
                });
                update(
                    state,
                    AppMsg::LoadedSlotOptions {
                        slot: key,
                        token,
                        outcome,
                    },
                )
            }
            LoadKind::PanelContent => {
                let outcome = outcome.map(|o| match o {
                    LoadOutcome::Content(v) => v,
                    _ => JsonValue::Null,
                });
                update(
                    state,
                    AppMsg::LoadedPanelContent {
                        panel: key,
                        token,
                        outcome,
                    },
                )
            }
            LoadKind::Roster => {
                let outcome = outcome.map(|o| match o {
                    LoadOutcome::Items(v) => v,
                    _ => Vec::new(),
                });
                update(state, AppMsg::LoadedRoster { key, outcome })
            }
            LoadKind::Detail => {
                let outcome = outcome.map(|o| match o {
                    LoadOutcome::Content(v) => v,
                    _ => JsonValue::Null,
                });
                update(state, AppMsg::LoadedDetail { key, outcome })
            }
            LoadKind::SubmitForm => {
                let outcome = outcome.map(|o| match o {
                    LoadOutcome::Content(v) => v,
                    _ => JsonValue::Null,
                });
                update(state, AppMsg::LoadedSubmit { outcome })
            }
        };
        run_effects(state, effects);
    }
}

fn trigger_initial_autoloads(state: &mut AppState) {
    let mut effects = Vec::new();
    for mi in state.config.menu.clone() {
        if is_autoload(&mi) && auto_expand_menu(&mi) {
            let key = crate::nav::keys::menu_key(&mi);
            if !state.children.contains_key(&key) && !state.loading.contains(&key) {
                if let Some(cmdline) = mi.command.clone() {
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
    }
    run_effects(state, effects);
}

fn keep_menu_selection_visible(state: &mut AppState) {
    let vh = state.menu_viewport_h as usize;
    if vh == 0 {
        state.menu_offset = 0;
        return;
    }
    if state.selected < state.menu_offset {
        state.menu_offset = state.selected;
    } else if state.selected >= state.menu_offset + vh {
        state.menu_offset = state.selected + 1 - vh;
    }
}

fn handle_menu_key(state: &mut AppState, code: KeyCode) {
    let nodes = flatten_nodes(state);
    let total = nodes.len();
    match code {
        KeyCode::Up => {
            state.selected = state.selected.saturating_sub(1);
            keep_menu_selection_visible(state);
        }
        KeyCode::Down => {
            if total > 0 && state.selected + 1 < total {
                state.selected += 1;
            }
            keep_menu_selection_visible(state);
        }
        KeyCode::PageUp => {
            let step = state.menu_viewport_h as usize;
            state.selected = state.selected.saturating_sub(step.max(1));
            keep_menu_selection_visible(state);
        }
        KeyCode::PageDown => {
            let step = state.menu_viewport_h as usize;
            if total > 0 {
                state.selected = (state.selected + step.max(1)).min(total - 1);
            }
            keep_menu_selection_visible(state);
        }
        KeyCode::Home => {
            state.selected = 0;
            keep_menu_selection_visible(state);
        }
        KeyCode::End => {
            if total > 0 {
                state.selected = total - 1;
            }
            keep_menu_selection_visible(state);
        }
        KeyCode::Enter => {
            if let Some(node) = nodes.get(state.selected).cloned() {
                let effects = match node {
                    FlatNode::Menu { idx, .. } => {
                        let mi = state.config.menu[idx].clone();
                        update(state, AppMsg::EnterMenu(mi))
                    }
                    FlatNode::Child { key, val, .. } => {
                        update(state, AppMsg::EnterChild { key, val })
                    }
                    FlatNode::Header { .. } => Vec::new(),
                };
                run_effects(state, effects);
            }
        }
        KeyCode::Char('r') | KeyCode::Char('R') => {
            if let Some(FlatNode::Menu { idx, .. }) = nodes.get(state.selected) {
                let mi = state.config.menu[*idx].clone();
                if is_lazy(&mi) || is_autoload(&mi) {
                    let key = crate::nav::keys::menu_key(&mi);
                    state.children.remove(&key);
                    let effects = update(state, AppMsg::RefreshMenu(mi));
                    run_effects(state, effects);
                }
            }
        }
        _ => {}
    }
}

fn handle_register_key(state: &mut AppState, code: KeyCode) {
    let editing = state
        .register
        .as_ref()
        .map(|r| r.form.form.editing)
        .unwrap_or(false);
    if editing && matches!(state.panel_focus, PanelPane::B) {
        if let Some(reg) = &mut state.register {
            let effs = reg.form.on_key(code);
            run_effects(state, effs);
        }
        return;
    }
    match code {
        KeyCode::Tab | KeyCode::BackTab => {
            state.panel_focus = match state.panel_focus {
                PanelPane::A => PanelPane::B,
                PanelPane::B => PanelPane::A,
            };
        }
        KeyCode::Esc => {
            let dropdown_open = state
                .register
                .as_ref()
                .map(|r| r.cascade.open)
                .unwrap_or(false);
            if dropdown_open && matches!(state.panel_focus, PanelPane::A) {
                route_cascade_key(state, code);
            } else {
                state.view = View::Menu;
            }
        }
        other => match state.panel_focus {
            PanelPane::A => route_cascade_key(state, other),
            PanelPane::B => {
                let submit = state
                    .register
                    .as_ref()
                    .map(|r| r.form.form.on_submit_row() && matches!(other, KeyCode::Enter))
                    .unwrap_or(false);
                if submit {
                    if state.submitting {
                        return;
                    }
                    let effects = update(state, AppMsg::SubmitRequested);
                    run_effects(state, effects);
                } else if let Some(reg) = &mut state.register {
                    let effs = reg.form.on_key(other);
                    run_effects(state, effs);
                }
            }
        },
    }
}

fn route_cascade_key(state: &mut AppState, code: KeyCode) {
    let Some(reg) = &mut state.register else {
        return;
    };
    let action = cascade::handle_key(&mut reg.cascade, &reg.mi.slots, &state.engine, code);
    let Some(action) = action else {
        return;
    };
    let msg = match action {
        cascade::CascadeAction::Pick { slot, key } => AppMsg::SlotPicked { slot, key },
        cascade::CascadeAction::Reload { slot } => AppMsg::SlotReload { slot },
    };
    let effects = update(state, msg);
    run_effects(state, effects);
}

fn handle_dashboard_key(state: &mut AppState, code: KeyCode) {
    if matches!(code, KeyCode::Esc) {
        state.view = View::Menu;
        return;
    }
    let Some(dash) = &mut state.dashboard else {
        return;
    };
    let action = dashboard::handle_key(&mut dash.ds, &dash.mi.panels, &state.engine, code);
    if let Some(dashboard::DashboardAction::Activate(panel)) = action {
        let effects = update(state, AppMsg::PanelActivated { panel });
        run_effects(state, effects);
    }
}

/// Returns true when the app should quit.
fn handle_key(state: &mut AppState, key: event::KeyEvent) -> bool {
    let editing_form = matches!(state.view, View::Register)
        && matches!(state.panel_focus, PanelPane::B)
        && state
            .register
            .as_ref()
            .map(|r| r.form.form.editing)
            .unwrap_or(false);

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('s') | KeyCode::Char('S') => {
                if let Some(reg) = &mut state.register {
                    if reg.form.commit_textarea() {
                        return false;
                    }
                }
            }
            KeyCode::Char('c') | KeyCode::Char('C') => {
                // Copy the detail payload to the clipboard
                if matches!(state.view, View::Detail) {
                    let mut copied = false;
                    if let Some(d) = &state.detail {
                        if let Ok(mut clipboard) = arboard::Clipboard::new() {
                            let _ = clipboard.set_text(&d.json_pretty);
                            copied = true;
                        }
                    }
                    if copied {
                        run_effects(
                            state,
                            vec![Effect::ShowToast {
                                text: "Copied to clipboard".into(),
                                level: ToastLevel::Info,
                                seconds: 3,
                            }],
                        );
                    }
                    return false;
                }
            }
            _ => {}
        }
    }

    if let KeyCode::F(n) = key.code {
        if (1..=12).contains(&n) {
            let prev_index = state.horizontal_tab_index;
            if let Some(config_path) =
                crate::widgets::horizontal_menu::handle_function_key(state, n)
            {
                state.dbg(format!("load config: {config_path}"));
                if let Err(e) = load_config_from_path(state, &config_path) {
                    state.dbg(format!("failed to load {config_path}: {e}"));
                    state.toast = Some(Toast {
                        text: format!("Failed to load {config_path}"),
                        level: ToastLevel::Error,
                        expires_at_tick: state.tick.saturating_add(25),
                    });
                    state.horizontal_tab_index = prev_index;
                } else {
                    reset_for_new_config(state);
                }
            } else {
                // Switched to a tab without its own config (Home): reload the
                // main config. Same tab pressed again falls through to no-op.
                let index = (n - 1) as usize;
                let switched = state.horizontal_tab_index != prev_index;
                if switched && index < state.config.horizontal_menu.len() {
                    let item = &state.config.horizontal_menu[index];
                    if item.config.is_none() && state.current_config_path.is_some() {
                        state.dbg("load config: main (home)");
                        state.config = load_config().unwrap_or_default();
                        state.current_config_path = None;
                        init_logo_and_header(state);
                        state.horizontal_tab_index = index;
                        reset_for_new_config(state);
                    }
                }
            }
            return false;
        }
    }

    if !editing_form {
        if let KeyCode::Char('q') = key.code {
            return true;
        }
    }

    match state.view {
        View::Menu => handle_menu_key(state, key.code),
        View::Register => handle_register_key(state, key.code),
        View::Dashboard => handle_dashboard_key(state, key.code),
        View::Detail => match key.code {
            KeyCode::Esc | KeyCode::Backspace => {
                state.view = state.detail_return;
                state.detail = None;
            }
            other => {
                if let Some(d) = &mut state.detail {
                    let _ = d.on_key(other);
                }
            }
        },
        View::SessionExpired => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                state.view = View::Menu;
            }
        }
    }
    false
}

fn reset_for_new_config(state: &mut AppState) {
    state.selected = 0;
    state.menu_offset = 0;
    state.expanded.clear();
    state.children.clear();
    state.loading.clear();
    state.register = None;
    state.dashboard = None;
    state.detail = None;
    state.view = View::Menu;
    trigger_initial_autoloads(state);
    if let Some(id) = state.config.auto_enter.clone() {
        if let Some(mi) = state.config.menu.iter().find(|m| m.id == id).cloned() {
            let effs = update(state, AppMsg::EnterMenu(mi));
            run_effects(state, effs);
        }
    }
}

// ---------------- Config loading ------------------------------------------

fn load_config_from_path(state: &mut AppState, relative_path: &str) -> Result<()> {
    let rp = PathBuf::from(relative_path);
    let cfg_path = if rp.is_absolute() {
        rp
    } else {
        let base_dir = std::env::var("TAXREG_CONFIG_DIR")
            .map(PathBuf::from)
            .with_context(|| "TAXREG_CONFIG_DIR not set when loading relative config path")?;
        base_dir.join(relative_path)
    };

    let s =
        fs::read_to_string(&cfg_path).with_context(|| format!("reading config: {cfg_path:?}"))?;
    let new_config: AppConfig =
        serde_yaml::from_str(&s).with_context(|| format!("parsing config: {cfg_path:?}"))?;
    crate::model::validate_app_config(&new_config)
        .map_err(|e| anyhow::anyhow!("invalid config {cfg_path:?}: {e}"))?;
    state.config = new_config;
    state.current_config_path = Some(relative_path.to_string());
    init_logo_and_header(state);
    Ok(())
}

fn read_config(path: &PathBuf) -> Result<AppConfig> {
    let s = fs::read_to_string(path).with_context(|| format!("reading {path:?}"))?;
    let cfg: AppConfig =
        serde_yaml::from_str(&s).with_context(|| format!("parsing {path:?}"))?;
    crate::model::validate_app_config(&cfg)
        .map_err(|e| anyhow::anyhow!("invalid config {path:?}: {e}"))?;
    Ok(cfg)
}

fn load_config() -> Result<AppConfig> {
    // 1) TAXREG_CONFIG_DIR is authoritative when set
    if let Ok(base) = std::env::var("TAXREG_CONFIG_DIR") {
        let base_dir = PathBuf::from(&base);
        let entry = base_dir.join("taxreg.yaml");
        std::env::set_var("TAXREG_CONFIG_DIR", &base_dir);
        return read_config(&entry);
    }

    // 2) Discover taxreg.yaml from CWD and upwards
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let candidates = [
        cwd.join("taxreg.yaml"),
        cwd.join("config").join("taxreg.yaml"),
    ];
    for p in &candidates {
        if p.exists() {
            let base_dir = p.parent().unwrap_or(&cwd).to_path_buf();
            std::env::set_var("TAXREG_CONFIG_DIR", &base_dir);
            return read_config(p);
        }
    }
    let mut cur = cwd.as_path();
    while let Some(parent) = cur.parent() {
        let p = parent.join(".taxreg").join("taxreg.yaml");
        if p.exists() {
            let base_dir = p.parent().unwrap_or(parent).to_path_buf();
            std::env::set_var("TAXREG_CONFIG_DIR", &base_dir);
            return read_config(&p);
        }
        cur = parent;
    }
    if let Some(home) = std::env::var("HOME")
        .ok()
        .or_else(|| std::env::var("USERPROFILE").ok())
        .map(PathBuf::from)
    {
        let p = home.join(".taxreg").join("taxreg.yaml");
        if p.exists() {
            let base_dir = p.parent().unwrap_or(&home).to_path_buf();
            std::env::set_var("TAXREG_CONFIG_DIR", &base_dir);
            return read_config(&p);
        }
    }

    Err(anyhow::anyhow!(
        "No config found. Set TAXREG_CONFIG_DIR=<dir with taxreg.yaml> or place taxreg.yaml in CWD or ./config"
    ))
}

fn init_logo_and_header(state: &mut AppState) {
    let mut lines: Vec<String> = Vec::new();
    if let Some(path) = state.config.logo.clone() {
        let pb = PathBuf::from(&path);
        let full = if pb.is_absolute() {
            pb
        } else if let Ok(dir) = std::env::var("TAXREG_CONFIG_DIR") {
            PathBuf::from(dir).join(&path)
        } else {
            std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(&path)
        };
        if let Ok(s) = fs::read_to_string(&full) {
            lines = s.lines().map(|l| l.to_string()).collect();
        }
    }
    if lines.is_empty() {
        lines = vec![
            String::new(),
            state
                .config
                .header
                .clone()
                .unwrap_or_else(|| "taxreg-tui".to_string()),
            String::new(),
        ];
    }
    // One extra row for the banner's bottom border
    state.header_h = (lines.len() as u16).saturating_add(1);
    state.logo_lines = lines;
}

// ---------------- Drawing -------------------------------------------------

fn draw_overview(f: &mut Frame, area: Rect, state: &AppState) {
    let block = crate::widgets::chrome::panel_block_themed("Overview", false, &state.theme);
    let mut lines: Vec<Line> = Vec::new();
    lines.push(Line::from(""));
    if state.session.authenticated() {
        lines.push(Line::from(vec![
            Span::styled("Signed in", state.theme.text_success()),
            Span::raw("  "),
            Span::styled(
                state
                    .session
                    .tin
                    .clone()
                    .map(|t| format!("TIN {t}"))
                    .unwrap_or_default(),
                state.theme.text_muted(),
            ),
        ]));
    } else {
        lines.push(Line::from(Span::styled(
            "Not signed in. Set TAXREG_TOKEN and TAXREG_TIN.",
            Style::default().fg(state.theme.warning),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter opens an item. Registration walks the address",
        state.theme.text_muted(),
    )));
    lines.push(Line::from(Span::styled(
        "hierarchy level by level; the dashboard tracks your",
        state.theme.text_muted(),
    )));
    lines.push(Line::from(Span::styled(
        "application and documents.",
        state.theme.text_muted(),
    )));
    let p = Paragraph::new(lines).block(block);
    f.render_widget(p, area);
}

fn draw_register(f: &mut Frame, area: Rect, state: &mut AppState) {
    let Some(reg) = &mut state.register else {
        let p = Paragraph::new("Registration screen not initialized")
            .block(Block::default().borders(Borders::ALL).title("Register"));
        f.render_widget(p, area);
        return;
    };
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(ratio_constraints(reg.ratio))
        .split(area);
    cascade::draw_cascade(
        f,
        chunks[0],
        &reg.mi.slots,
        &reg.cascade,
        &state.engine,
        &state.theme,
        matches!(state.panel_focus, PanelPane::A),
        state.tick,
    );
    reg.form.render(
        f,
        chunks[1],
        matches!(state.panel_focus, PanelPane::B),
        state.tick,
    );
}

fn draw_dashboard_view(f: &mut Frame, area: Rect, state: &mut AppState) {
    let Some(dash) = &state.dashboard else {
        let p = Paragraph::new("Dashboard not initialized")
            .block(Block::default().borders(Borders::ALL).title("Dashboard"));
        f.render_widget(p, area);
        return;
    };
    dashboard::draw_dashboard(
        f,
        area,
        &dash.mi.panels,
        &dash.ds,
        &state.engine,
        &state.theme,
        true,
        state.tick,
    );
}

fn draw_session_expired(f: &mut Frame, area: Rect, state: &AppState) {
    let block = crate::widgets::chrome::panel_block("Session expired", true);
    let lines = vec![
        Line::from(""),
        Line::from("Your session is no longer valid."),
        Line::from(""),
        Line::from(Span::styled(
            "Sign in again (TAXREG_TOKEN), restart, and your work resumes.",
            state.theme.text_muted(),
        )),
        Line::from(Span::styled(
            "Esc returns to the menu.",
            state.theme.text_muted(),
        )),
    ];
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_debug(f: &mut Frame, area: Rect, state: &AppState) {
    let b = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            "Debug",
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        ));
    let h = area.height as usize;
    let mut lines: Vec<Line> = Vec::new();
    let total = state.debug_log.len();
    let start = total.saturating_sub(h);
    for s in state.debug_log.iter().skip(start) {
        lines.push(Line::raw(s.clone()));
    }
    let p = Paragraph::new(lines)
        .style(Style::default().fg(Color::Gray))
        .block(b)
        .wrap(Wrap { trim: true });
    f.render_widget(p, area);
}

fn ui(f: &mut Frame, state: &mut AppState) {
    // Clear expired toast
    if let Some(t) = &state.toast {
        if state.tick >= t.expires_at_tick {
            state.toast = None;
        }
    }

    let screen = f.area();
    let bg = Block::default().style(Style::default().bg(state.theme.bg));
    f.render_widget(bg, screen);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(state.header_h),
            Constraint::Length(2),
            Constraint::Min(5),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(screen);

    crate::widgets::header::draw_header(f, chunks[0], state);
    crate::widgets::horizontal_menu::draw_horizontal_menu(f, chunks[1], state);

    let main = chunks[2];
    match state.view {
        View::Menu => {
            let halves = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
                .split(main);
            state.menu_viewport_h = halves[0].height.saturating_sub(2);
            draw_menu(f, halves[0], state);
            draw_overview(f, halves[1], state);
        }
        View::Register => draw_register(f, main, state),
        View::Dashboard => draw_dashboard_view(f, main, state),
        View::Detail => {
            if let Some(d) = &mut state.detail {
                d.render(f, main, true, state.tick);
            }
        }
        View::SessionExpired => draw_session_expired(f, main, state),
    }

    draw_debug(f, chunks[3], state);

    let help_text: String = match state.view {
        View::Register => {
            "Tab switch pane  Enter choose/edit  Backspace clear  r retry  Esc back  q quit".into()
        }
        View::Dashboard => "↑/↓ section  Enter open  r refresh  Esc back  q quit".into(),
        View::Detail => "↑/↓ scroll  j raw  w wrap  Ctrl+C copy  Backspace back  q quit".into(),
        _ => "↑/↓ select  Enter open  r refresh  q quit".into(),
    };
    crate::widgets::status_bar::draw_footer_combined(f, chunks[4], state, &help_text);
}

// ---------------- Entry point ---------------------------------------------

pub fn run() -> Result<()> {
    let cfg = load_config()?;
    let session = SessionContext::from_env();
    let mut state = AppState {
        config: cfg,
        header_h: 3,
        theme: Theme::ledger_dark(),
        client: Some(Arc::new(GatewayDirectoryClient::new(session.clone()))),
        session,
        ..Default::default()
    };
    init_logo_and_header(&mut state);
    let (tx, rx) = mpsc::channel::<LoadMsg>();
    state.tx = Some(tx);
    state.rx = Some(rx);

    // Headless smoke mode
    let headless = std::env::var("TAXREG_HEADLESS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false);
    if headless {
        return run_headless(&mut state);
    }

    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();
    let res = loop {
        if !state.boot_autoload_done {
            trigger_initial_autoloads(&mut state);
            if let Some(id) = state.config.auto_enter.clone() {
                if let Some(mi) = state.config.menu.iter().find(|m| m.id == id).cloned() {
                    let effs = update(&mut state, AppMsg::EnterMenu(mi));
                    run_effects(&mut state, effs);
                }
            }
            state.boot_autoload_done = true;
        }
        if let Err(e) = terminal.draw(|f| ui(f, &mut state)) {
            break Err(anyhow::Error::from(e));
        }
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_millis(0));
        match event::poll(timeout) {
            Ok(true) => match event::read() {
                Ok(Event::Key(key)) => {
                    if handle_key(&mut state, key) {
                        break Ok(());
                    }
                }
                Ok(_) => {}
                Err(e) => break Err(anyhow::Error::from(e)),
            },
            Ok(false) => {}
            Err(e) => break Err(anyhow::Error::from(e)),
        }
        pump_load_msgs(&mut state);
        if last_tick.elapsed() >= tick_rate {
            state.tick = state.tick.wrapping_add(1);
            last_tick = Instant::now();
        }
    };
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    res
}

fn run_headless(state: &mut AppState) -> Result<()> {
    let headless_ticks: u64 = std::env::var("TAXREG_TICKS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(10);
    let headless_enter_id: Option<String> = std::env::var("TAXREG_HEADLESS_ENTER_ID").ok();
    let headless_summary: bool = std::env::var("TAXREG_SMOKE_SUMMARY")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes"))
        .unwrap_or(false);

    let backend = ratatui::backend::TestBackend::new(80, 24);
    let mut terminal = Terminal::new(backend)?;
    let tick_rate = Duration::from_millis(200);
    let mut headless_enter_done = false;
    for _ in 0..headless_ticks {
        if !state.boot_autoload_done {
            trigger_initial_autoloads(state);
            state.boot_autoload_done = true;
        }
        if !headless_enter_done {
            if let Some(ref id) = headless_enter_id {
                if let Some(mi) = state.config.menu.iter().find(|m| &m.id == id).cloned() {
                    let effs = update(state, AppMsg::EnterMenu(mi));
                    run_effects(state, effs);
                    headless_enter_done = true;
                }
            }
        }
        terminal.draw(|f| ui(f, state))?;
        pump_load_msgs(state);
        state.tick = state.tick.wrapping_add(1);
        std::thread::sleep(std::cmp::min(tick_rate, Duration::from_millis(200)));
    }
    if headless_summary {
        let view = match state.view {
            View::Menu => "Menu",
            View::Register => "Register",
            View::Dashboard => "Dashboard",
            View::Detail => "Detail",
            View::SessionExpired => "SessionExpired",
        };
        let result_present = state.detail.is_some()
            || state
                .engine
                .panels()
                .iter()
                .any(|p| p.content.is_some())
            || !state.children.is_empty();
        let summary = serde_json::json!({
            "ok": true,
            "view": view,
            "result_present": result_present,
            "enter_done": headless_enter_done,
        });
        println!("{summary}");
    }
    Ok(())
}
