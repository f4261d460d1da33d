use crate::graph::store::OptionItem;
use crate::services::gateway::run_gateway_to_json;
use crate::services::session::SessionContext;
use serde_json::Value as JsonValue;
use std::fmt;

/// Failure taxonomy at the directory boundary. Auth (401) routes to the
/// session-level recovery path; Network/Server stay on the slot that asked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DirectoryError {
    /// The request never produced a backend response.
    Network(String),
    /// Expired or missing credential (HTTP 401).
    Auth,
    /// Backend answered with an error (4xx/5xx except 401).
    Server {
        status: Option<u16>,
        message: String,
    },
    /// A document record carried a type code this client does not know.
    /// Surfaced instead of silently bucketing into a fallback category.
    UnknownDocumentType(String),
}

impl fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryError::Network(msg) => write!(f, "network error: {msg}"),
            DirectoryError::Auth => write!(f, "authentication required"),
            DirectoryError::Server {
                status: Some(code),
                message,
            } => write!(f, "server error ({code}): {message}"),
            DirectoryError::Server {
                status: None,
                message,
            } => write!(f, "server error: {message}"),
            DirectoryError::UnknownDocumentType(code) => {
                write!(f, "unknown document type: {code}")
            }
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Where a slot's option list comes from: a gateway command template plus an
/// optional unwrap path into the response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OptionSource {
    pub command: String,
    pub unwrap: Option<String>,
}

/// The boundary the selection engine's fetches go through. Implemented over
/// the gateway command in production and by fakes in tests.
pub trait DirectoryClient: Send + Sync {
    fn fetch_options(
        &self,
        source: &OptionSource,
        parent_key: Option<&str>,
    ) -> Result<Vec<OptionItem>, DirectoryError>;

    fn fetch_panel_content(
        &self,
        command: &str,
        context_key: &str,
    ) -> Result<JsonValue, DirectoryError>;
}

pub struct GatewayDirectoryClient {
    session: SessionContext,
}

impl GatewayDirectoryClient {
    pub fn new(session: SessionContext) -> Self {
        Self { session }
    }
}

impl DirectoryClient for GatewayDirectoryClient {
    fn fetch_options(
        &self,
        source: &OptionSource,
        parent_key: Option<&str>,
    ) -> Result<Vec<OptionItem>, DirectoryError> {
        let cmdline = source
            .command
            .replace("${PARENT}", parent_key.unwrap_or(""));
        let v = run_gateway_to_json(&cmdline, &self.session)?;
        Ok(parse_option_items(&v, source.unwrap.as_deref()))
    }

    fn fetch_panel_content(
        &self,
        command: &str,
        context_key: &str,
    ) -> Result<JsonValue, DirectoryError> {
        let cmdline = command.replace("${CONTEXT}", context_key);
        let v = run_gateway_to_json(&cmdline, &self.session)?;
        // Strip the transport envelope; panels render the payload.
        Ok(v.get("data").cloned().unwrap_or(v))
    }
}

pub fn get_by_path<'a>(v: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut cur = v;
    for seg in path.split('.') {
        cur = cur.get(seg)?;
    }
    Some(cur)
}

/// Pull the list out of whatever envelope the backend wrapped it in.
/// Precedence, matching the shapes observed in the wild:
///   1. `data.data` array (double envelope)
///   2. `data` array (single envelope)
///   3. bare array
///   4. first array-typed value in the top-level object, then one object
///      level deeper (covers `{data: {items: [...]}}` and friends)
pub fn normalize_list_response(v: &JsonValue) -> Vec<JsonValue> {
    if let Some(arr) = v
        .get("data")
        .and_then(|d| d.get("data"))
        .and_then(|x| x.as_array())
    {
        return arr.clone();
    }
    if let Some(arr) = v.get("data").and_then(|x| x.as_array()) {
        return arr.clone();
    }
    if let Some(arr) = v.as_array() {
        return arr.clone();
    }
    if let Some(obj) = v.as_object() {
        for val in obj.values() {
            if let Some(arr) = val.as_array() {
                return arr.clone();
            }
        }
        for val in obj.values() {
            if let Some(inner) = val.as_object() {
                for nested in inner.values() {
                    if let Some(arr) = nested.as_array() {
                        return arr.clone();
                    }
                }
            }
        }
    }
    Vec::new()
}

fn scalar_to_string(v: &JsonValue) -> Option<String> {
    match v {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Map raw list items onto option entries. Keys come from id/key/value
/// (string or number, normalized to string), labels from
/// name/displayName/title. Plain strings stand for both.
pub fn parse_option_items(v: &JsonValue, unwrap: Option<&str>) -> Vec<OptionItem> {
    let items = match unwrap {
        Some(path) => get_by_path(v, path)
            .and_then(|x| x.as_array())
            .cloned()
            .unwrap_or_default(),
        None => normalize_list_response(v),
    };
    let mut out = Vec::new();
    for item in &items {
        if let Some(s) = item.as_str() {
            out.push(OptionItem::new(s, s));
            continue;
        }
        let Some(obj) = item.as_object() else {
            continue;
        };
        let key = ["id", "key", "value"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(scalar_to_string));
        let Some(key) = key else {
            continue;
        };
        let label = ["name", "displayName", "title"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(|x| x.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| key.clone());
        out.push(OptionItem { key, label });
    }
    out
}

#[cfg(test)]
mod directory_tests;
