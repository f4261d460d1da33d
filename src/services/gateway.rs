use crate::services::directory::DirectoryError;
use crate::services::session::SessionContext;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::process::Command;
use std::{collections::HashMap, env};

/// Expand `${VAR}` placeholders in a configured gateway command line.
/// `${GATEWAY_BIN}` resolves to TAXREG_GATEWAY_BIN (quoted when it contains
/// whitespace) or the default binary name; `${TIN}` and `${BASE_URL}` come
/// from the session; anything else falls back to the process environment.
pub(crate) fn expand_cmdline(cmdline: &str, session: &SessionContext) -> String {
    let re = Regex::new(r"\$\{([A-Z0-9_]+)\}").unwrap();
    let env_map: HashMap<String, String> = env::vars().collect();
    re.replace_all(cmdline, |caps: &regex::Captures| {
        let key = &caps[1];
        match key {
            "GATEWAY_BIN" => {
                if let Some(v) = env_map.get("TAXREG_GATEWAY_BIN") {
                    // Quote if it contains whitespace to keep it a single arg
                    // through shlex::split
                    if v.chars().any(|c| c.is_whitespace()) {
                        let escaped = v.replace('"', "\\\"");
                        return format!("\"{escaped}\"");
                    }
                    return v.to_string();
                }
                "taxreg-gateway".to_string()
            }
            "TIN" => session.tin.clone().unwrap_or_default(),
            "BASE_URL" => session.base_url.clone(),
            _ => env_map.get(key).cloned().unwrap_or_default(),
        }
    })
    .to_string()
}

/// Map a gateway error envelope onto the directory error taxonomy. The
/// gateway mirrors backend HTTP status in `data.status_code`; 401 is the one
/// session-level case.
pub(crate) fn classify_error_envelope(v: &JsonValue) -> DirectoryError {
    let status = v
        .get("data")
        .and_then(|d| d.get("status_code"))
        .or_else(|| v.get("status_code"))
        .and_then(|n| n.as_u64())
        .map(|n| n as u16);
    if status == Some(401) {
        return DirectoryError::Auth;
    }
    let message = v
        .get("data")
        .and_then(|d| d.get("message"))
        .or_else(|| v.get("message"))
        .and_then(|s| s.as_str())
        .unwrap_or("request rejected by backend")
        .to_string();
    DirectoryError::Server { status, message }
}

fn run_gateway_output(
    cmdline: &str,
    session: &SessionContext,
) -> Result<std::process::Output, DirectoryError> {
    let expanded = expand_cmdline(cmdline, session);
    let parts = shlex::split(&expanded)
        .ok_or_else(|| DirectoryError::Network(format!("bad gateway command line: {cmdline}")))?;
    if parts.is_empty() {
        return Err(DirectoryError::Network("empty gateway command".into()));
    }
    let program = &parts[0];
    let args = &parts[1..];
    Command::new(program)
        .args(args)
        .env("TAXREG_JSON", "1")
        .envs(session.gateway_env())
        .output()
        .map_err(|e| DirectoryError::Network(format!("spawning {expanded}: {e}")))
}

/// Run the gateway and decode its stdout envelope, classifying every failure
/// into the directory error taxonomy.
pub fn run_gateway_to_json(
    cmdline: &str,
    session: &SessionContext,
) -> Result<JsonValue, DirectoryError> {
    let output = run_gateway_output(cmdline, session)?;
    if !output.status.success() {
        let err_text = String::from_utf8_lossy(&output.stderr).to_string();
        if let Ok(v) = serde_json::from_str::<JsonValue>(&err_text) {
            return Err(classify_error_envelope(&v));
        }
        // No envelope at all: the request never reached the backend.
        return Err(DirectoryError::Network(if err_text.trim().is_empty() {
            format!("gateway failed: {cmdline}")
        } else {
            err_text.trim().to_string()
        }));
    }
    let text = String::from_utf8_lossy(&output.stdout).to_string();
    let v: JsonValue = serde_json::from_str(&text).map_err(|_| DirectoryError::Server {
        status: None,
        message: "invalid JSON from gateway".into(),
    })?;
    if v.get("ok").and_then(|b| b.as_bool()) == Some(false) {
        return Err(classify_error_envelope(&v));
    }
    Ok(v)
}

/// Like run_gateway_to_json, but a decodable error envelope is handed back as
/// Ok so the caller can map backend validation details (e.g. per-field form
/// errors) instead of losing them to a flat message. 401 still escapes as
/// Auth.
pub fn run_gateway_envelope(
    cmdline: &str,
    session: &SessionContext,
) -> Result<JsonValue, DirectoryError> {
    let output = run_gateway_output(cmdline, session)?;
    let text = if output.status.success() {
        String::from_utf8_lossy(&output.stdout).to_string()
    } else {
        let err_text = String::from_utf8_lossy(&output.stderr).to_string();
        match serde_json::from_str::<JsonValue>(&err_text) {
            Ok(v) => {
                if matches!(classify_error_envelope(&v), DirectoryError::Auth) {
                    return Err(DirectoryError::Auth);
                }
                return Ok(v);
            }
            Err(_) => {
                return Err(DirectoryError::Network(if err_text.trim().is_empty() {
                    format!("gateway failed: {cmdline}")
                } else {
                    err_text.trim().to_string()
                }))
            }
        }
    };
    let v: JsonValue = serde_json::from_str(&text).map_err(|_| DirectoryError::Server {
        status: None,
        message: "invalid JSON from gateway".into(),
    })?;
    if v.get("ok").and_then(|b| b.as_bool()) == Some(false)
        && matches!(classify_error_envelope(&v), DirectoryError::Auth)
    {
        return Err(DirectoryError::Auth);
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expired_credential_classifies_as_auth() {
        let env = json!({
            "ok": false,
            "type": "error",
            "data": {"status_code": 401, "message": "token expired"}
        });
        assert_eq!(classify_error_envelope(&env), DirectoryError::Auth);
    }

    #[test]
    fn backend_rejection_keeps_status_and_message() {
        let env = json!({
            "ok": false,
            "type": "error",
            "data": {"status_code": 422, "message": "TIN already registered"}
        });
        match classify_error_envelope(&env) {
            DirectoryError::Server { status, message } => {
                assert_eq!(status, Some(422));
                assert_eq!(message, "TIN already registered");
            }
            other => panic!("expected Server, got {other:?}"),
        }
    }

    #[test]
    fn flat_envelopes_without_data_still_classify() {
        let env = json!({"ok": false, "status_code": 503, "message": "maintenance"});
        match classify_error_envelope(&env) {
            DirectoryError::Server { status, .. } => assert_eq!(status, Some(503)),
            other => panic!("expected Server, got {other:?}"),
        }
    }

    #[test]
    fn tin_placeholder_expands_from_session() {
        let session = SessionContext {
            base_url: "http://backend/api".into(),
            bearer_token: Some("tok".into()),
            tin: Some("102345678".into()),
        };
        let out = expand_cmdline("${GATEWAY_BIN} applications status --tin ${TIN}", &session);
        assert!(out.ends_with("applications status --tin 102345678"));
        assert!(!out.contains("${"));
    }
}
