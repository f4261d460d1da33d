use std::collections::HashMap;

/// One selectable entry, as delivered by the directory backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionItem {
    pub key: String,
    pub label: String,
}

impl OptionItem {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotStatus {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed,
}

/// A node in the dependent-selection graph: one selectable value plus the
/// option set loaded for the current parent selection.
#[derive(Clone, Debug, Default)]
pub struct Slot {
    pub name: String,
    pub parent: Option<String>,
    pub selected: Option<String>,
    pub options: Vec<OptionItem>,
    pub status: SlotStatus,
    pub error: Option<String>,
    // Monotonic request token; a response is applied only when it carries the
    // current value. Bumped by begin_load and by invalidate, so invalidation
    // preempts in-flight loads without any cancellation signal.
    token: u64,
}

impl Slot {
    pub fn current_token(&self) -> u64 {
        self.token
    }
}

/// In-memory slot map with registration-time topology. No I/O; all mutation
/// goes through the operations below, on the UI thread.
#[derive(Default)]
pub struct SlotStore {
    slots: HashMap<String, Slot>,
    children: HashMap<String, Vec<String>>,
    order: Vec<String>,
}

impl SlotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot. Topology is fixed at construction: duplicate names and
    /// dangling parents are programmer errors.
    pub fn register(&mut self, name: &str, parent: Option<&str>) {
        if self.slots.contains_key(name) {
            panic!("slot already registered: {name}");
        }
        if let Some(p) = parent {
            if !self.slots.contains_key(p) {
                panic!("unknown parent slot: {p} (registering {name})");
            }
            self.children
                .entry(p.to_string())
                .or_default()
                .push(name.to_string());
        }
        self.slots.insert(
            name.to_string(),
            Slot {
                name: name.to_string(),
                parent: parent.map(str::to_string),
                ..Default::default()
            },
        );
        self.order.push(name.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Slot names in registration order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn get(&self, name: &str) -> &Slot {
        match self.slots.get(name) {
            Some(s) => s,
            None => panic!("unknown slot: {name}"),
        }
    }

    fn get_mut(&mut self, name: &str) -> &mut Slot {
        match self.slots.get_mut(name) {
            Some(s) => s,
            None => panic!("unknown slot: {name}"),
        }
    }

    pub fn children(&self, name: &str) -> &[String] {
        if !self.slots.contains_key(name) {
            panic!("unknown slot: {name}");
        }
        self.children.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Set the selection only; cascading is the engine's job.
    pub fn set_selected(&mut self, name: &str, key: Option<String>) {
        self.get_mut(name).selected = key;
    }

    /// Mark a fetch as issued and hand out the token that gates its response.
    pub fn begin_load(&mut self, name: &str) -> u64 {
        let slot = self.get_mut(name);
        slot.token += 1;
        slot.status = SlotStatus::Loading;
        slot.error = None;
        slot.token
    }

    /// Apply a completed fetch. Returns false (and changes nothing) when the
    /// token is no longer current.
    pub fn apply_loaded(&mut self, name: &str, token: u64, options: Vec<OptionItem>) -> bool {
        let slot = self.get_mut(name);
        if token != slot.token {
            return false;
        }
        slot.options = options;
        slot.status = SlotStatus::Loaded;
        slot.error = None;
        true
    }

    /// Apply a failed fetch. Same staleness guard as apply_loaded.
    pub fn apply_failed(&mut self, name: &str, token: u64, message: String) -> bool {
        let slot = self.get_mut(name);
        if token != slot.token {
            return false;
        }
        slot.status = SlotStatus::Failed;
        slot.error = Some(message);
        true
    }

    /// Token-gated return to Idle without touching selection or options.
    /// Used when a load is abandoned for session-level reasons rather than
    /// failing the slot itself.
    pub fn abort_load(&mut self, name: &str, token: u64) -> bool {
        let slot = self.get_mut(name);
        if token != slot.token {
            return false;
        }
        slot.status = SlotStatus::Idle;
        slot.error = None;
        true
    }

    /// Clear the slot and every transitive descendant: selection gone, options
    /// empty, status Idle. Total and synchronous. Returns the cleared names in
    /// top-down order.
    pub fn invalidate(&mut self, name: &str) -> Vec<String> {
        if !self.slots.contains_key(name) {
            panic!("unknown slot: {name}");
        }
        let mut cleared = Vec::new();
        let mut queue = vec![name.to_string()];
        while let Some(n) = queue.pop() {
            let slot = self.get_mut(&n);
            slot.selected = None;
            slot.options.clear();
            slot.status = SlotStatus::Idle;
            slot.error = None;
            slot.token += 1;
            cleared.push(n.clone());
            if let Some(kids) = self.children.get(&n) {
                queue.extend(kids.iter().cloned());
            }
        }
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> SlotStore {
        let mut store = SlotStore::new();
        store.register("province", None);
        store.register("district", Some("province"));
        store.register("sector", Some("district"));
        store
    }

    #[test]
    fn register_builds_child_index_in_order() {
        let store = chain();
        assert_eq!(store.names(), ["province", "district", "sector"]);
        assert_eq!(store.children("province"), ["district"]);
        assert!(store.children("sector").is_empty());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_registration_panics() {
        let mut store = chain();
        store.register("district", Some("province"));
    }

    #[test]
    #[should_panic(expected = "unknown slot")]
    fn get_unknown_slot_panics() {
        let store = chain();
        let _ = store.get("village");
    }

    #[test]
    fn stale_token_is_discarded() {
        let mut store = chain();
        let t1 = store.begin_load("district");
        let t2 = store.begin_load("district");
        assert!(t2 > t1);
        assert!(!store.apply_loaded("district", t1, vec![OptionItem::new("10", "Gasabo")]));
        assert!(store.get("district").options.is_empty());
        assert!(store.apply_loaded("district", t2, vec![OptionItem::new("11", "Nyarugenge")]));
        assert_eq!(store.get("district").status, SlotStatus::Loaded);
        assert_eq!(store.get("district").options.len(), 1);
    }

    #[test]
    fn invalidate_clears_descendants_and_preempts_loads() {
        let mut store = chain();
        store.set_selected("district", Some("10".into()));
        let t = store.begin_load("sector");
        let cleared = store.invalidate("district");
        assert_eq!(cleared.len(), 2);
        assert!(store.get("district").selected.is_none());
        assert_eq!(store.get("sector").status, SlotStatus::Idle);
        // The in-flight sector load now carries a stale token.
        assert!(!store.apply_loaded("sector", t, vec![OptionItem::new("7", "Remera")]));
        assert!(store.get("sector").options.is_empty());
    }

    #[test]
    fn abort_load_returns_to_idle_without_failing() {
        let mut store = chain();
        let pt = store.begin_load("province");
        store.apply_loaded("province", pt, vec![]);
        let t = store.begin_load("district");
        assert!(store.abort_load("district", t));
        assert_eq!(store.get("district").status, SlotStatus::Idle);
        assert!(store.get("district").error.is_none());
        assert!(!store.abort_load("district", t.wrapping_sub(1)));
    }

    #[test]
    fn failed_keeps_message_until_next_load() {
        let mut store = chain();
        let t = store.begin_load("district");
        assert!(store.apply_failed("district", t, "gateway unreachable".into()));
        assert_eq!(store.get("district").status, SlotStatus::Failed);
        assert_eq!(
            store.get("district").error.as_deref(),
            Some("gateway unreachable")
        );
        let _ = store.begin_load("district");
        assert!(store.get("district").error.is_none());
    }
}
