//! ============================================================================
//! Access Gateway - Tier transitions and authenticated secret operations
//! ============================================================================
//! Reads and lists renew the RO token on demand. Writes need an RW token
//! that is already valid and never trigger a login. RW is only ever
//! entered through an explicit `escalate`.
//!
//! Renewal of each slot is serialised by its own lock, held across the whole
//! MFA flow, so concurrent callers wait for a push in flight instead of
//! sending a second one. Callers that already hold a valid token never touch
//! those locks.
//! ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::store::TierStore;
use super::types::{TokenSlot, TokenStatus};
use crate::auth::MfaLoginFlow;
use crate::backend::{check_secret_path, IssuedToken, OpenBaoClient, SecretData, SecretsBackend};
use crate::config::{GatekeeperConfig, LoginIdentity};
use crate::types::{Deescalation, GatekeeperError, GatekeeperResult, TierGrant, WriteReceipt};

/// The broker: owns both credential slots and every path that changes them
pub struct AccessGateway {
    backend: Arc<dyn SecretsBackend>,
    login: MfaLoginFlow,
    ro_identity: LoginIdentity,
    rw_identity: LoginIdentity,
    store: Mutex<TierStore>,
    ro_renewal: Mutex<()>,
    rw_escalation: Mutex<()>,
    /// Bumped every time an RW token is installed
    rw_generation: AtomicU64,
}

impl AccessGateway {
    /// Gateway talking HTTP to the configured backend, on the wall clock
    pub fn new(config: &GatekeeperConfig) -> GatekeeperResult<Self> {
        let backend = Arc::new(OpenBaoClient::new(config)?);
        Ok(Self::with_backend(config, backend, Arc::new(SystemClock)))
    }

    pub fn with_backend(
        config: &GatekeeperConfig,
        backend: Arc<dyn SecretsBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            login: MfaLoginFlow::new(
                backend.clone(),
                config.bootstrap_token.clone(),
                config.mfa_method_id.clone(),
            ),
            backend,
            ro_identity: config.ro_identity.clone(),
            rw_identity: config.rw_identity.clone(),
            store: Mutex::new(TierStore::new(clock)),
            ro_renewal: Mutex::new(()),
            rw_escalation: Mutex::new(()),
            rw_generation: AtomicU64::new(0),
        }
    }

    // ------------------------------------------------------------------------
    // Tier transitions
    // ------------------------------------------------------------------------

    /// Obtain a fresh RO token via MFA push, replacing any existing one
    pub async fn authenticate(&self) -> GatekeeperResult<TierGrant> {
        let _renewal = self.ro_renewal.lock().await;
        let (_, grant) = self.login_read_only().await?;
        Ok(grant)
    }

    /// Valid RO token, logging in first if it is missing or expired.
    /// This is the only automatic renewal and it only ever yields RO.
    pub async fn ensure_read_access(&self) -> GatekeeperResult<String> {
        if let Some(token) = self.valid_token(TokenSlot::ReadOnly).await {
            return Ok(token);
        }

        let _renewal = self.ro_renewal.lock().await;
        // Someone else may have renewed while we waited for the lock
        if let Some(token) = self.valid_token(TokenSlot::ReadOnly).await {
            return Ok(token);
        }

        warn!("RO token expired or missing, re-authenticating via MFA");
        let (token, _) = self.login_read_only().await?;
        Ok(token)
    }

    /// Obtain an RW token via a second MFA push. Renews RO first if needed,
    /// so this can cost two pushes.
    pub async fn escalate(&self) -> GatekeeperResult<TierGrant> {
        let seen_generation = self.rw_generation.load(Ordering::SeqCst);
        let _escalation = self.rw_escalation.lock().await;

        // An escalation that finished while we queued already asked for consent
        if self.rw_generation.load(Ordering::SeqCst) != seen_generation {
            let mut store = self.store.lock().await;
            if let Some(cred) = store.current(TokenSlot::ReadWrite) {
                let lease_secs = (cred.expiry() - cred.issued_at()).num_seconds().max(0) as u64;
                return Ok(TierGrant {
                    slot: TokenSlot::ReadWrite,
                    lease_secs,
                    expires_at: cred.expiry(),
                });
            }
        }

        let ro_token = self.ensure_read_access().await?;
        let issued = self.login.login(&self.rw_identity, &ro_token).await?;
        let (_, grant) = self.install(TokenSlot::ReadWrite, issued).await;
        self.rw_generation.fetch_add(1, Ordering::SeqCst);
        Ok(grant)
    }

    /// Drop RW. Remote revocation is best effort; the local token is gone
    /// either way.
    pub async fn deescalate(&self) -> Deescalation {
        let taken = {
            let mut store = self.store.lock().await;
            match store.current(TokenSlot::ReadWrite).cloned() {
                Some(cred) => {
                    store.clear(TokenSlot::ReadWrite);
                    cred
                }
                None => {
                    return Deescalation {
                        revoked: false,
                        tier: store.tier(),
                    }
                }
            }
        };

        if let Err(e) = self.backend.revoke_self(taken.token()).await {
            warn!(
                "Remote revoke of RW token failed, dropped locally anyway: {}",
                e
            );
        }

        let tier = self.store.lock().await.tier();
        info!("RW token revoked, now at {}", tier);
        Deescalation {
            revoked: true,
            tier,
        }
    }

    /// Current tier and lease state. No I/O.
    pub async fn status(&self) -> TokenStatus {
        self.store.lock().await.status()
    }

    // ------------------------------------------------------------------------
    // Secret operations
    // ------------------------------------------------------------------------

    /// Read a secret's key/value payload. Uses RW if held, else RO.
    pub async fn read_secret(&self, path: &str) -> GatekeeperResult<SecretData> {
        check_secret_path(path)?;
        let token = self.read_token().await?;
        let body = self.backend.read_kv(path, &token).await?;
        Ok(body.into_data())
    }

    /// List keys under `path`; nothing stored there is an empty list
    pub async fn list_secrets(&self, path: &str) -> GatekeeperResult<Vec<String>> {
        check_secret_path(path)?;
        let token = self.read_token().await?;
        let body = self.backend.list_kv(path, &token).await?;
        Ok(body.into_keys())
    }

    /// Write a secret. Requires a valid RW token; never logs in on its own.
    pub async fn write_secret(&self, path: &str, data: &SecretData) -> GatekeeperResult<WriteReceipt> {
        check_secret_path(path)?;
        let Some(token) = self.valid_token(TokenSlot::ReadWrite).await else {
            warn!("Write to {} refused: no valid RW token", path);
            return Err(GatekeeperError::InsufficientPrivilege);
        };

        let receipt = self.backend.write_kv(path, data, &token).await?.into_receipt()?;
        info!("Secret written to {} (version {})", path, receipt.version);
        Ok(receipt)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    async fn valid_token(&self, slot: TokenSlot) -> Option<String> {
        self.store
            .lock()
            .await
            .current(slot)
            .map(|cred| cred.token().to_string())
    }

    /// RO login authorised by the bootstrap token. Caller holds `ro_renewal`.
    async fn login_read_only(&self) -> GatekeeperResult<(String, TierGrant)> {
        let issued = self
            .login
            .login(&self.ro_identity, self.login.bootstrap_token())
            .await?;
        Ok(self.install(TokenSlot::ReadOnly, issued).await)
    }

    async fn install(&self, slot: TokenSlot, issued: IssuedToken) -> (String, TierGrant) {
        let token = issued.client_token.clone();
        let expires_at = self
            .store
            .lock()
            .await
            .set(slot, issued.client_token, issued.lease_secs)
            .expiry();

        info!(
            "{} token acquired with {}s TTL (expires {})",
            slot.label(),
            issued.lease_secs,
            expires_at.to_rfc3339()
        );
        (
            token,
            TierGrant {
                slot,
                lease_secs: issued.lease_secs,
                expires_at,
            },
        )
    }

    /// Ensure RO, then prefer RW if one is held
    async fn read_token(&self) -> GatekeeperResult<String> {
        let ro_token = self.ensure_read_access().await?;
        Ok(self.store.lock().await.best_token().unwrap_or(ro_token))
    }
}
