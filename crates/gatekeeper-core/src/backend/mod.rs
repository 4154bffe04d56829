//! ============================================================================
//! Backend Module - The secrets API as seen by the gateway
//! ============================================================================
//! `SecretsBackend` is the only way the gateway and login flow reach the
//! secrets store. `OpenBaoClient` speaks the real HTTP contract; tests swap
//! in a scripted fake.
//! ============================================================================

mod openbao;
mod wire;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;

use crate::types::{GatekeeperError, GatekeeperResult};

pub use openbao::OpenBaoClient;
pub use wire::{
    IssuedToken, KvListResponse, KvReadResponse, KvWriteResponse, LoginResponse,
    MfaValidateResponse, SecretData, DEFAULT_LEASE_SECS,
};

/// Check that a KV path stays under the mount once placed in a URL.
///
/// HTTP clients normalise `.`/`..` segments (and `\` as `/`), and `?`/`#`
/// end the path, so any of those could address an endpoint outside the KV
/// engine. `%` is refused too since `%2e%2e` normalises the same way.
pub fn check_secret_path(path: &str) -> GatekeeperResult<()> {
    let invalid = |reason: &str| {
        Err(GatekeeperError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        })
    };

    if let Some(c) = path.chars().find(|&c| matches!(c, '?' | '#' | '%' | '\\')) {
        return invalid(&format!("'{}' is not allowed", c));
    }
    if path.chars().any(char::is_control) {
        return invalid("control characters are not allowed");
    }
    if path.split('/').any(|segment| segment == "." || segment == "..") {
        return invalid("'.' and '..' segments are not allowed");
    }
    Ok(())
}

/// Calls the gatekeeper makes against the secrets store.
///
/// Paths passed to the KV methods are relative to the KV v2 mount. Any
/// non-success HTTP status surfaces as `GatekeeperError::BackendRequest`,
/// except the 404-on-list case documented on [`SecretsBackend::list_kv`].
#[async_trait]
pub trait SecretsBackend: Send + Sync {
    /// Read a KV v2 secret with `token`
    async fn read_kv(&self, path: &str, token: &str) -> GatekeeperResult<KvReadResponse>;

    /// List keys under `path`. A 404 yields an empty listing, not an error.
    async fn list_kv(&self, path: &str, token: &str) -> GatekeeperResult<KvListResponse>;

    /// Write a new version of a KV v2 secret
    async fn write_kv(
        &self,
        path: &str,
        data: &SecretData,
        token: &str,
    ) -> GatekeeperResult<KvWriteResponse>;

    /// Userpass login. With MFA enforced this returns a pending-MFA handle.
    async fn userpass_login(&self, username: &str, password: &str) -> GatekeeperResult<LoginResponse>;

    /// Resolve a pending MFA request. Blocks until the push is answered or
    /// the backend gives up.
    async fn validate_mfa(
        &self,
        mfa_request_id: &str,
        method_id: &str,
        token: &str,
    ) -> GatekeeperResult<MfaValidateResponse>;

    /// Revoke `token` itself
    async fn revoke_self(&self, token: &str) -> GatekeeperResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_paths_accepted() {
        for path in ["claude/config", "ssh/", "", "/leading", "a/b.c/d..e", "team/.env-backup"] {
            assert!(check_secret_path(path).is_ok(), "{:?} should pass", path);
        }
    }

    #[test]
    fn test_escaping_paths_rejected() {
        for path in [
            "../../sys/policy/evil",
            "claude/../../sys/mounts",
            "./claude",
            "claude/..",
            "claude/config?list=true",
            "claude/config#frag",
            "%2e%2e/sys/policy/evil",
            "..\\..\\sys\\policy",
            "claude/\nconfig",
        ] {
            assert!(
                matches!(check_secret_path(path), Err(GatekeeperError::InvalidPath { .. })),
                "{:?} should be rejected",
                path
            );
        }
    }
}
