use serde::Deserialize;
use serde_json::Value as JsonValue;

/// One level of a dependent-selection chain. `command` is a gateway command
/// template; `${PARENT}` is replaced with the parent slot's selected key.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SlotSpec {
    pub name: String,
    pub title: String,
    pub command: String,
    #[serde(default)]
    pub unwrap: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
}

/// One mutually exclusive dashboard section. `${CONTEXT}` in the command is
/// replaced with the session context key (the account TIN).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PanelSpec {
    pub name: String,
    pub title: String,
    pub command: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    // text (default) | textarea | select | checkbox | document
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub min_len: Option<usize>,
    #[serde(default)]
    pub max_len: Option<usize>,
    #[serde(default)]
    pub pattern: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct MenuItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub widget: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub unwrap: Option<String>,
    // Roster: gateway command for a member's application detail; ${MEMBER} is
    // replaced with the selected member id.
    #[serde(default)]
    pub detail_command: Option<String>,
    // Register: gateway command template the form submission is built on
    #[serde(default)]
    pub submit_command: Option<String>,
    #[serde(default)]
    pub slots: Vec<SlotSpec>,
    #[serde(default)]
    pub panels: Vec<PanelSpec>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub initial_text: Option<String>,
    #[serde(default)]
    pub auto_expand: Option<bool>,
    #[serde(default)]
    pub expand_on_enter: Option<bool>,
    // Static hierarchical children (for rosters defined inline in YAML)
    #[serde(default)]
    pub children: Option<Vec<JsonValue>>,
    // Register view split between cascade and form: "1:1" | "1:2" | "2:1"
    #[serde(default)]
    pub panel_size: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HorizontalMenuItem {
    #[allow(dead_code)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub config: Option<String>, // Path to YAML config to load when selected
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub header: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    // Optional: auto-enter a menu item by id when this screen loads
    #[serde(default)]
    pub auto_enter: Option<String>,
    #[serde(default)]
    pub horizontal_menu: Vec<HorizontalMenuItem>,
    pub menu: Vec<MenuItem>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            header: Some("TAXREG".to_string()),
            logo: None,
            auto_enter: None,
            horizontal_menu: vec![],
            menu: vec![],
        }
    }
}

/// Application lifecycle as the backend reports it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplicationStatus {
    Pending,
    Registered,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "REGISTERED" => Some(Self::Registered),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Registered => "Registered",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }

    /// Still moving through review.
    pub fn in_review(&self) -> bool {
        matches!(self, Self::Pending | Self::Registered)
    }
}

/// The fixed set of PDF documents an application carries. Unknown backend
/// codes are an error, not a fallback bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentKind {
    NationalId,
    DegreeCertificate,
    PoliceClearance,
    TaxClearance,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::NationalId,
        DocumentKind::DegreeCertificate,
        DocumentKind::PoliceClearance,
        DocumentKind::TaxClearance,
    ];

    pub fn from_code(code: &str) -> Result<Self, crate::services::directory::DirectoryError> {
        match code.trim().to_ascii_uppercase().as_str() {
            "NATIONAL_ID" | "ID" => Ok(Self::NationalId),
            "DEGREE" | "DEGREE_CERTIFICATE" => Ok(Self::DegreeCertificate),
            "POLICE_CLEARANCE" | "CRIMINAL_RECORD" => Ok(Self::PoliceClearance),
            "TAX_CLEARANCE" => Ok(Self::TaxClearance),
            other => Err(
                crate::services::directory::DirectoryError::UnknownDocumentType(other.to_string()),
            ),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::NationalId => "National ID",
            Self::DegreeCertificate => "Degree certificate",
            Self::PoliceClearance => "Police clearance",
            Self::TaxClearance => "Tax clearance certificate",
        }
    }
}

/// Stopgap until the backend exposes an explicit reapplication flag: the only
/// signal today is the marker appended to the rejection reason text. Used to
/// suppress the reapply hint, never sent back or persisted.
pub fn rejection_marks_reapplied(reason: &str) -> bool {
    reason.to_ascii_lowercase().contains("reapplied")
}

pub(crate) fn validate_app_config(cfg: &AppConfig) -> Result<(), String> {
    use std::collections::HashSet;
    let mut ids = HashSet::new();
    for (i, m) in cfg.menu.iter().enumerate() {
        if !ids.insert(&m.id) {
            return Err(format!("duplicate menu id: '{}' at index {}", m.id, i));
        }
        if let Some(w) = &m.widget {
            match w.as_str() {
                "register" => {
                    if m.slots.is_empty() {
                        return Err(format!(
                            "register '{}' requires a non-empty slot chain",
                            m.id
                        ));
                    }
                    let mut seen: HashSet<&str> = HashSet::new();
                    for (si, s) in m.slots.iter().enumerate() {
                        if s.command.trim().is_empty() {
                            return Err(format!(
                                "register '{}' slot '{}' requires a command",
                                m.id, s.name
                            ));
                        }
                        if !seen.insert(s.name.as_str()) {
                            return Err(format!(
                                "register '{}' has duplicate slot name '{}'",
                                m.id, s.name
                            ));
                        }
                        match (&s.parent, si) {
                            (Some(_), 0) => {
                                return Err(format!(
                                    "register '{}' first slot '{}' must not have a parent",
                                    m.id, s.name
                                ));
                            }
                            (None, 0) => {}
                            (Some(p), _) => {
                                if !m.slots[..si].iter().any(|prev| &prev.name == p) {
                                    return Err(format!(
                                        "register '{}' slot '{}' references unknown parent '{}'",
                                        m.id, s.name, p
                                    ));
                                }
                            }
                            (None, _) => {
                                return Err(format!(
                                    "register '{}' slot '{}' (not first) requires a parent",
                                    m.id, s.name
                                ));
                            }
                        }
                    }
                    if m.submit_command.as_deref().unwrap_or("").is_empty() {
                        return Err(format!("register '{}' requires 'submit_command'", m.id));
                    }
                    let mut fnames: HashSet<&str> = HashSet::new();
                    for fld in &m.fields {
                        if !fnames.insert(fld.name.as_str()) {
                            return Err(format!(
                                "register '{}' has duplicate field '{}'",
                                m.id, fld.name
                            ));
                        }
                        if fld.kind.as_deref() == Some("select") && fld.options.is_empty() {
                            return Err(format!(
                                "register '{}' select field '{}' requires options",
                                m.id, fld.name
                            ));
                        }
                    }
                }
                "dashboard" => {
                    if m.panels.is_empty() {
                        return Err(format!("dashboard '{}' requires panels", m.id));
                    }
                    let mut seen: HashSet<&str> = HashSet::new();
                    for p in &m.panels {
                        if !seen.insert(p.name.as_str()) {
                            return Err(format!(
                                "dashboard '{}' has duplicate panel '{}'",
                                m.id, p.name
                            ));
                        }
                        if p.command.trim().is_empty() {
                            return Err(format!(
                                "dashboard '{}' panel '{}' requires a command",
                                m.id, p.name
                            ));
                        }
                    }
                }
                "lazy_items" | "autoload_items" => {
                    if m.command.as_deref().unwrap_or("").is_empty() {
                        return Err(format!("menu '{}' requires 'command' for {}", m.id, w));
                    }
                }
                _ => {}
            }
        }
    }
    Ok(())
}
