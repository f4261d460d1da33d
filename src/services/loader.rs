use crate::services::directory::{
    get_by_path, normalize_list_response, DirectoryClient, OptionSource,
};
use crate::services::gateway::{run_gateway_envelope, run_gateway_to_json};
use crate::services::session::SessionContext;
use crate::ui::{LoadKind, LoadMsg, LoadOutcome};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

// All loaders run the blocking gateway call off thread and report back over
// the channel; the UI thread stays the only place state changes.

pub fn spawn_load_slot_options(
    client: Arc<dyn DirectoryClient>,
    source: OptionSource,
    slot: String,
    parent_key: Option<String>,
    token: u64,
    tx: Sender<LoadMsg>,
) {
    thread::spawn(move || {
        let outcome = client
            .fetch_options(&source, parent_key.as_deref())
            .map(LoadOutcome::Options);
        let _ = tx.send(LoadMsg {
            key: slot,
            token,
            outcome,
            kind: LoadKind::SlotOptions,
        });
    });
}

pub fn spawn_load_panel_content(
    client: Arc<dyn DirectoryClient>,
    command: String,
    panel: String,
    context_key: String,
    token: u64,
    tx: Sender<LoadMsg>,
) {
    thread::spawn(move || {
        let outcome = client
            .fetch_panel_content(&command, &context_key)
            .map(LoadOutcome::Content);
        let _ = tx.send(LoadMsg {
            key: panel,
            token,
            outcome,
            kind: LoadKind::PanelContent,
        });
    });
}

/// Fetch a roster list (company members, a member's applications) for a
/// lazily expanded menu entry.
pub fn spawn_load_roster(
    cmdline: String,
    unwrap: Option<String>,
    key: String,
    session: SessionContext,
    tx: Sender<LoadMsg>,
) {
    thread::spawn(move || {
        let outcome = run_gateway_to_json(&cmdline, &session).map(|v| {
            let items = match unwrap.as_deref() {
                Some(path) => get_by_path(&v, path)
                    .and_then(|x| x.as_array())
                    .cloned()
                    .unwrap_or_default(),
                None => normalize_list_response(&v),
            };
            LoadOutcome::Items(items)
        });
        let _ = tx.send(LoadMsg {
            key,
            token: 0,
            outcome,
            kind: LoadKind::Roster,
        });
    });
}

pub fn spawn_load_detail(
    cmdline: String,
    key: String,
    session: SessionContext,
    tx: Sender<LoadMsg>,
) {
    thread::spawn(move || {
        let outcome = run_gateway_to_json(&cmdline, &session)
            .map(|v| LoadOutcome::Content(v.get("data").cloned().unwrap_or(v)));
        let _ = tx.send(LoadMsg {
            key,
            token: 0,
            outcome,
            kind: LoadKind::Detail,
        });
    });
}

/// Submit the registration form. The full envelope comes back, a decodable
/// error envelope included, so field-level validation details survive for
/// the form to map. Only 401 escapes as an error here.
pub fn spawn_submit_form(cmdline: String, session: SessionContext, tx: Sender<LoadMsg>) {
    thread::spawn(move || {
        let outcome = run_gateway_envelope(&cmdline, &session).map(LoadOutcome::Content);
        let _ = tx.send(LoadMsg {
            key: "register:submit".into(),
            token: 0,
            outcome,
            kind: LoadKind::SubmitForm,
        });
    });
}
