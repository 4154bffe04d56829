//! ============================================================================
//! MFA Login Flow - Password lookup, userpass login, push validation
//! ============================================================================
//! 1. Read the identity's password from KV with the authorising token
//! 2. Userpass login, which yields a pending MFA request instead of a token
//! 3. Validate the MFA request with the bootstrap token; this sends the push
//!    and blocks until it is approved, denied or times out on the backend
//! ============================================================================

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{IssuedToken, SecretsBackend};
use crate::config::LoginIdentity;
use crate::types::{GatekeeperError, GatekeeperResult};

/// Executes the two-call MFA login protocol against the backend
pub struct MfaLoginFlow {
    backend: Arc<dyn SecretsBackend>,
    bootstrap_token: String,
    mfa_method_id: String,
}

impl MfaLoginFlow {
    pub fn new(backend: Arc<dyn SecretsBackend>, bootstrap_token: String, mfa_method_id: String) -> Self {
        Self {
            backend,
            bootstrap_token,
            mfa_method_id,
        }
    }

    /// The externally supplied bootstrap token
    pub fn bootstrap_token(&self) -> &str {
        &self.bootstrap_token
    }

    /// Run the full flow for `identity`. `authorizing_token` is the token
    /// allowed to read the identity's password.
    pub async fn login(&self, identity: &LoginIdentity, authorizing_token: &str) -> GatekeeperResult<IssuedToken> {
        debug!(
            "Fetching {} password from {}",
            identity.username, identity.password_path
        );
        let password = self
            .backend
            .read_kv(&identity.password_path, authorizing_token)
            .await?
            .into_password(&identity.password_path)?;

        let mfa_request_id = self
            .backend
            .userpass_login(&identity.username, &password)
            .await?
            .into_mfa_request_id(&identity.username)?;

        info!(
            "MFA push sent for {}, waiting for approval (request {})",
            identity.username, mfa_request_id
        );

        let issued = self
            .backend
            .validate_mfa(&mfa_request_id, &self.mfa_method_id, &self.bootstrap_token)
            .await?
            .into_issued_token(&identity.username)
            .inspect_err(|e| {
                if let GatekeeperError::MfaDeniedOrTimedOut { .. } = e {
                    warn!("MFA push for {} was not approved", identity.username);
                }
            })?;

        info!(
            "MFA approved for {}, token leased for {}s",
            identity.username, issued.lease_secs
        );
        Ok(issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{Call, FakeBackend, MfaDecision, BOOTSTRAP, RO_LEASE};
    use crate::config::{GatekeeperConfig, DEFAULT_MFA_METHOD_ID};
    use serde_json::json;

    fn flow(fake: &Arc<FakeBackend>) -> MfaLoginFlow {
        MfaLoginFlow::new(fake.clone(), BOOTSTRAP.to_string(), DEFAULT_MFA_METHOD_ID.to_string())
    }

    fn ro_identity() -> LoginIdentity {
        GatekeeperConfig::new("http://fake", BOOTSTRAP).ro_identity
    }

    #[tokio::test]
    async fn test_login_issues_token_with_backend_lease() {
        let fake = Arc::new(FakeBackend::standard());
        let issued = flow(&fake).login(&ro_identity(), BOOTSTRAP).await.unwrap();

        assert_eq!(issued.lease_secs, RO_LEASE);
        assert!(fake.is_live(&issued.client_token));
        assert_eq!(
            fake.calls(),
            vec![
                Call::Read {
                    path: "claude/ro-login".into(),
                    token: BOOTSTRAP.into()
                },
                Call::Login {
                    username: "claude-ro".into()
                },
                Call::ValidateMfa {
                    username: "claude-ro".into(),
                    token: BOOTSTRAP.into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_password_field() {
        let fake = Arc::new(FakeBackend::standard());
        fake.put_secret("claude/ro-login", json!({ "username": "claude-ro" }));

        let err = flow(&fake).login(&ro_identity(), BOOTSTRAP).await.unwrap_err();
        assert_eq!(
            err,
            GatekeeperError::CredentialLookup {
                path: "claude/ro-login".into()
            }
        );
        assert_eq!(fake.logins(), 0);
    }

    #[tokio::test]
    async fn test_unenrolled_identity() {
        let fake = Arc::new(FakeBackend::standard());
        fake.unenroll_mfa("claude-ro");

        let err = flow(&fake).login(&ro_identity(), BOOTSTRAP).await.unwrap_err();
        assert_eq!(
            err,
            GatekeeperError::MfaNotConfigured {
                username: "claude-ro".into()
            }
        );
        assert_eq!(fake.mfa_validations(), 0);
    }

    #[tokio::test]
    async fn test_denied_push() {
        let fake = Arc::new(FakeBackend::standard());
        fake.script_mfa(&[MfaDecision::Deny]);

        let err = flow(&fake).login(&ro_identity(), BOOTSTRAP).await.unwrap_err();
        assert_eq!(
            err,
            GatekeeperError::MfaDeniedOrTimedOut {
                username: "claude-ro".into()
            }
        );
    }

    #[tokio::test]
    async fn test_password_read_refused_surfaces_backend_error() {
        let fake = Arc::new(FakeBackend::standard());
        let rw_identity = GatekeeperConfig::new("http://fake", BOOTSTRAP).rw_identity;

        // The bootstrap token may not read the RW password
        let err = flow(&fake).login(&rw_identity, BOOTSTRAP).await.unwrap_err();
        assert!(matches!(err, GatekeeperError::BackendRequest { status: 403, .. }));
        assert_eq!(fake.logins(), 0);
    }
}
