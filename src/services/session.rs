use std::env;

/// Explicit session context handed to the directory client at construction.
/// The bearer credential never leaves this struct except as environment for
/// the gateway process; header injection stays the gateway's concern.
#[derive(Clone, Debug, Default)]
pub struct SessionContext {
    pub base_url: String,
    pub bearer_token: Option<String>,
    pub tin: Option<String>,
}

impl SessionContext {
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("TAXREG_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/api".to_string()),
            bearer_token: env::var("TAXREG_TOKEN").ok().filter(|s| !s.is_empty()),
            tin: env::var("TAXREG_TIN").ok().filter(|s| !s.is_empty()),
        }
    }

    pub fn authenticated(&self) -> bool {
        self.bearer_token.is_some()
    }

    /// Drop the credential. Called once, by the reauthentication hook.
    pub fn clear(&mut self) {
        self.bearer_token = None;
        self.tin = None;
    }

    /// The key that parametrizes account-scoped panel fetches.
    pub fn context_key(&self) -> String {
        self.tin.clone().unwrap_or_default()
    }

    /// Environment injected into every gateway invocation.
    pub fn gateway_env(&self) -> Vec<(String, String)> {
        let mut env = vec![("TAXREG_BASE_URL".to_string(), self.base_url.clone())];
        if let Some(tok) = &self.bearer_token {
            env.push(("TAXREG_TOKEN".to_string(), tok.clone()));
        }
        if let Some(tin) = &self.tin {
            env.push(("TAXREG_TIN".to_string(), tin.clone()));
        }
        env
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_drops_credential_and_tin() {
        let mut s = SessionContext {
            base_url: "http://backend/api".into(),
            bearer_token: Some("t0ken".into()),
            tin: Some("102345678".into()),
        };
        assert!(s.authenticated());
        assert_eq!(s.context_key(), "102345678");
        s.clear();
        assert!(!s.authenticated());
        assert_eq!(s.context_key(), "");
        // Base URL survives; only the identity is gone.
        assert_eq!(s.base_url, "http://backend/api");
    }

    #[test]
    fn gateway_env_only_carries_present_values() {
        let s = SessionContext {
            base_url: "http://backend/api".into(),
            bearer_token: None,
            tin: None,
        };
        let env = s.gateway_env();
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].0, "TAXREG_BASE_URL");
    }
}
