//! ============================================================================
//! Gatekeeper Config - Backend address, bootstrap token and login identities
//! ============================================================================
//! Two values are required at startup: `VAULT_ADDR` and `VAULT_TOKEN` (the
//! bootstrap token). Everything else has a default and can be overridden via
//! `GATEKEEPER_*` variables.
//! ============================================================================

/// Duo MFA method configured on the backend
pub const DEFAULT_MFA_METHOD_ID: &str = "a573c36b-3cb4-4ee1-b947-bc1a81bb674a";

/// HTTP timeout; covers the backend's own Duo push window
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

pub const ENV_ADDR: &str = "VAULT_ADDR";
pub const ENV_BOOTSTRAP_TOKEN: &str = "VAULT_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// A userpass identity whose password lives in the KV store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginIdentity {
    pub username: String,
    /// KV path (relative to the mount) holding `{ password }`
    pub password_path: String,
}

impl LoginIdentity {
    pub fn new(username: impl Into<String>, password_path: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_path: password_path.into(),
        }
    }
}

/// Not serialisable: it carries the bootstrap token.
#[derive(Clone)]
pub struct GatekeeperConfig {
    /// Backend base address, no trailing slash
    pub addr: String,
    /// Minimal token used only to read the RO password and validate MFA
    pub bootstrap_token: String,
    pub kv_mount: String,
    pub userpass_mount: String,
    /// Identity logged in for NoAccess -> RO
    pub ro_identity: LoginIdentity,
    /// Identity logged in for RO -> RW
    pub rw_identity: LoginIdentity,
    pub mfa_method_id: String,
    pub request_timeout_secs: u64,
}

impl GatekeeperConfig {
    /// Config with defaults for everything but the two required values
    pub fn new(addr: &str, bootstrap_token: &str) -> Self {
        Self {
            addr: addr.trim_end_matches('/').to_string(),
            bootstrap_token: bootstrap_token.to_string(),
            kv_mount: "secret".to_string(),
            userpass_mount: "userpass".to_string(),
            ro_identity: LoginIdentity::new("claude-ro", "claude/ro-login"),
            rw_identity: LoginIdentity::new("claude-rw", "claude/rw-login"),
            mfa_method_id: DEFAULT_MFA_METHOD_ID.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }

    /// Load from process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using `lookup` for variable resolution. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let addr = get(ENV_ADDR).ok_or(ConfigError::Missing(ENV_ADDR))?;
        let token = get(ENV_BOOTSTRAP_TOKEN).ok_or(ConfigError::Missing(ENV_BOOTSTRAP_TOKEN))?;
        let mut config = Self::new(&addr, &token);

        if let Some(v) = get("GATEKEEPER_KV_MOUNT") {
            config.kv_mount = v.trim_matches('/').to_string();
        }
        if let Some(v) = get("GATEKEEPER_USERPASS_MOUNT") {
            config.userpass_mount = v.trim_matches('/').to_string();
        }
        if let Some(v) = get("GATEKEEPER_RO_USER") {
            config.ro_identity.username = v;
        }
        if let Some(v) = get("GATEKEEPER_RO_PASSWORD_PATH") {
            config.ro_identity.password_path = v;
        }
        if let Some(v) = get("GATEKEEPER_RW_USER") {
            config.rw_identity.username = v;
        }
        if let Some(v) = get("GATEKEEPER_RW_PASSWORD_PATH") {
            config.rw_identity.password_path = v;
        }
        if let Some(v) = get("GATEKEEPER_MFA_METHOD_ID") {
            config.mfa_method_id = v;
        }
        if let Some(v) = get("GATEKEEPER_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = v
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    name: "GATEKEEPER_REQUEST_TIMEOUT_SECS",
                    value: v,
                })?;
        }

        Ok(config)
    }
}

impl std::fmt::Debug for GatekeeperConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatekeeperConfig")
            .field("addr", &self.addr)
            .field("bootstrap_token", &"<redacted>")
            .field("kv_mount", &self.kv_mount)
            .field("userpass_mount", &self.userpass_mount)
            .field("ro_identity", &self.ro_identity)
            .field("rw_identity", &self.rw_identity)
            .field("mfa_method_id", &self.mfa_method_id)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}
