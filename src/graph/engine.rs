use crate::graph::store::{OptionItem, Slot, SlotStatus, SlotStore};
use crate::services::directory::DirectoryError;
use serde_json::Value as JsonValue;

/// State-change notifications for presentation bindings and tests. Stale
/// discards are not user-visible but must be observable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    SlotChanged { name: String },
    PanelChanged { name: String },
    StaleResponseDiscarded { name: String, token: u64 },
    ReauthenticationRequired,
}

/// A fetch the engine wants issued: option list for `slot`, parametrized by
/// the parent's current selection. The response must be applied back with the
/// same token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchOptions {
    pub slot: String,
    pub parent_key: Option<String>,
    pub token: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchPanel {
    pub panel: String,
    pub context_key: String,
    pub token: u64,
}

/// The degenerate one-level instance of the pattern: a mutually exclusive
/// dashboard section with its own token-gated content load.
#[derive(Clone, Debug)]
pub struct PanelSlot {
    pub name: String,
    pub active: bool,
    pub status: SlotStatus,
    pub content: Option<JsonValue>,
    pub error: Option<String>,
    token: u64,
}

impl PanelSlot {
    pub fn current_token(&self) -> u64 {
        self.token
    }
}

pub type SubscriptionId = u64;

/// Drives the dependent-selection graph: selections cascade into synchronous
/// downstream invalidation plus fetch requests for the direct children, and
/// every response is applied through a token gate. Single-threaded; the
/// caller executes fetches elsewhere and feeds results back via apply_*.
#[derive(Default)]
pub struct SelectionEngine {
    store: SlotStore,
    panels: Vec<PanelSlot>,
    listeners: Vec<(SubscriptionId, Box<dyn FnMut(&EngineEvent)>)>,
    next_sub: SubscriptionId,
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_slot(&mut self, name: &str, parent: Option<&str>) {
        self.store.register(name, parent);
    }

    pub fn add_panel(&mut self, name: &str) {
        if self.panels.iter().any(|p| p.name == name) {
            panic!("panel already registered: {name}");
        }
        self.panels.push(PanelSlot {
            name: name.to_string(),
            active: false,
            status: SlotStatus::Idle,
            content: None,
            error: None,
            token: 0,
        });
    }

    pub fn has_slot(&self, name: &str) -> bool {
        self.store.contains(name)
    }

    pub fn has_panel(&self, name: &str) -> bool {
        self.panels.iter().any(|p| p.name == name)
    }

    pub fn slot_names(&self) -> &[String] {
        self.store.names()
    }

    /// Read-only snapshot; panics on unknown slot (programmer error).
    pub fn slot(&self, name: &str) -> &Slot {
        self.store.get(name)
    }

    pub fn panels(&self) -> &[PanelSlot] {
        &self.panels
    }

    pub fn panel(&self, name: &str) -> &PanelSlot {
        match self.panels.iter().find(|p| p.name == name) {
            Some(p) => p,
            None => panic!("unknown panel: {name}"),
        }
    }

    fn panel_mut(&mut self, name: &str) -> &mut PanelSlot {
        match self.panels.iter_mut().find(|p| p.name == name) {
            Some(p) => p,
            None => panic!("unknown panel: {name}"),
        }
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&EngineEvent) + 'static,
    {
        self.next_sub += 1;
        self.listeners.push((self.next_sub, Box::new(listener)));
        self.next_sub
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sid, _)| *sid != id);
        self.listeners.len() != before
    }

    fn notify(&mut self, events: Vec<EngineEvent>) {
        for (_, listener) in &mut self.listeners {
            for ev in &events {
                listener(ev);
            }
        }
    }

    /// The onSelect protocol. Re-selecting the current value is a no-op.
    /// Otherwise: record the selection, synchronously invalidate every
    /// descendant, then (when a key was set) begin a token-gated load for
    /// each direct child. Clearing (None) invalidates only.
    pub fn select(&mut self, slot: &str, key: Option<&str>) -> Vec<FetchOptions> {
        if self.store.get(slot).selected.as_deref() == key {
            return Vec::new();
        }
        self.store.set_selected(slot, key.map(str::to_string));
        let mut events = vec![EngineEvent::SlotChanged {
            name: slot.to_string(),
        }];
        // Invalidation must be visible before any new fetch is issued.
        let children: Vec<String> = self.store.children(slot).to_vec();
        for child in &children {
            for name in self.store.invalidate(child) {
                events.push(EngineEvent::SlotChanged { name });
            }
        }
        let mut fetches = Vec::new();
        if let Some(k) = key {
            for child in children {
                let token = self.store.begin_load(&child);
                events.push(EngineEvent::SlotChanged {
                    name: child.clone(),
                });
                fetches.push(FetchOptions {
                    slot: child,
                    parent_key: Some(k.to_string()),
                    token,
                });
            }
        }
        self.notify(events);
        fetches
    }

    /// Begin (or retry) loading a slot's own options from its parent's current
    /// selection. For root slots the parent key is None. Returns None when a
    /// parented slot has no parent selection to load from.
    pub fn reload(&mut self, slot: &str) -> Option<FetchOptions> {
        let parent_key = match &self.store.get(slot).parent {
            Some(p) => match &self.store.get(p).selected {
                Some(k) => Some(k.clone()),
                None => return None,
            },
            None => None,
        };
        let token = self.store.begin_load(slot);
        self.notify(vec![EngineEvent::SlotChanged {
            name: slot.to_string(),
        }]);
        Some(FetchOptions {
            slot: slot.to_string(),
            parent_key,
            token,
        })
    }

    /// Token-gated application of a fetch result. Stale responses, stale
    /// errors included, are dropped whole. AuthError is session-level: the slot
    /// returns to Idle (not Failed) and ReauthenticationRequired is emitted.
    pub fn apply_options(
        &mut self,
        slot: &str,
        token: u64,
        result: Result<Vec<OptionItem>, DirectoryError>,
    ) {
        let events = match result {
            Ok(options) => {
                if self.store.apply_loaded(slot, token, options) {
                    vec![EngineEvent::SlotChanged {
                        name: slot.to_string(),
                    }]
                } else {
                    vec![EngineEvent::StaleResponseDiscarded {
                        name: slot.to_string(),
                        token,
                    }]
                }
            }
            Err(DirectoryError::Auth) => {
                if self.store.abort_load(slot, token) {
                    vec![
                        EngineEvent::SlotChanged {
                            name: slot.to_string(),
                        },
                        EngineEvent::ReauthenticationRequired,
                    ]
                } else {
                    vec![EngineEvent::StaleResponseDiscarded {
                        name: slot.to_string(),
                        token,
                    }]
                }
            }
            Err(err) => {
                if self.store.apply_failed(slot, token, err.to_string()) {
                    vec![EngineEvent::SlotChanged {
                        name: slot.to_string(),
                    }]
                } else {
                    vec![EngineEvent::StaleResponseDiscarded {
                        name: slot.to_string(),
                        token,
                    }]
                }
            }
        };
        self.notify(events);
    }

    /// Exclusive activation: deactivate every sibling (clearing content and
    /// bumping its token so late responses die at the gate), then start a
    /// fresh load for the target. Re-activating the active panel refreshes it.
    pub fn activate_panel(&mut self, panel: &str, context_key: &str) -> FetchPanel {
        // Touch first so an unknown name panics before any sibling is reset.
        let _ = self.panel(panel);
        let mut events = Vec::new();
        for p in &mut self.panels {
            if p.name != panel && p.active {
                p.active = false;
                p.content = None;
                p.status = SlotStatus::Idle;
                p.error = None;
                p.token += 1;
                events.push(EngineEvent::PanelChanged {
                    name: p.name.clone(),
                });
            }
        }
        let target = self.panel_mut(panel);
        target.active = true;
        target.status = SlotStatus::Loading;
        target.error = None;
        target.token += 1;
        let token = target.token;
        events.push(EngineEvent::PanelChanged {
            name: panel.to_string(),
        });
        self.notify(events);
        FetchPanel {
            panel: panel.to_string(),
            context_key: context_key.to_string(),
            token,
        }
    }

    pub fn apply_panel(
        &mut self,
        panel: &str,
        token: u64,
        result: Result<JsonValue, DirectoryError>,
    ) {
        let p = self.panel_mut(panel);
        if !p.active || token != p.token {
            let name = panel.to_string();
            self.notify(vec![EngineEvent::StaleResponseDiscarded { name, token }]);
            return;
        }
        let mut events = vec![EngineEvent::PanelChanged {
            name: panel.to_string(),
        }];
        match result {
            Ok(content) => {
                p.status = SlotStatus::Loaded;
                p.content = Some(content);
                p.error = None;
            }
            Err(DirectoryError::Auth) => {
                p.status = SlotStatus::Idle;
                p.content = None;
                events.push(EngineEvent::ReauthenticationRequired);
            }
            Err(err) => {
                p.status = SlotStatus::Failed;
                p.content = None;
                p.error = Some(err.to_string());
            }
        }
        self.notify(events);
    }
}

#[cfg(test)]
mod engine_tests;
