//! Scripted in-memory `SecretsBackend` for gateway and login tests.
//!
//! Mirrors the policy layout the gatekeeper expects: the bootstrap token can
//! only read the RO login password and validate MFA, RO tokens read and
//! list, only RW tokens write.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;

use super::wire::{
    KvListResponse, KvReadResponse, KvWriteResponse, LoginResponse, MfaValidateResponse,
    SecretData,
};
use super::SecretsBackend;
use crate::access::{RO_TARGET_LEASE_SECS, RW_TARGET_LEASE_SECS};
use crate::config::GatekeeperConfig;
use crate::types::{GatekeeperError, GatekeeperResult};

pub(crate) const BOOTSTRAP: &str = "s.bootstrap";
pub(crate) const RO_LEASE: u64 = RO_TARGET_LEASE_SECS;
pub(crate) const RW_LEASE: u64 = RW_TARGET_LEASE_SECS;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Read { path: String, token: String },
    List { path: String, token: String },
    Write { path: String, token: String },
    Login { username: String },
    ValidateMfa { username: String, token: String },
    Revoke { token: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MfaDecision {
    Approve,
    Deny,
}

#[derive(Default)]
struct Inner {
    secrets: HashMap<String, SecretData>,
    versions: HashMap<String, u64>,
    users: HashMap<String, (String, u64)>,
    unenrolled: HashSet<String>,
    decisions: VecDeque<MfaDecision>,
    pending: HashMap<String, String>,
    issued: HashMap<String, String>,
    next_id: u64,
    revoke_fails: bool,
    calls: Vec<Call>,
}

pub(crate) struct FakeBackend {
    inner: Mutex<Inner>,
    ro_password_path: String,
    rw_username: String,
    hold_mfa: Mutex<Option<Arc<Notify>>>,
}

impl FakeBackend {
    /// Backend seeded for the default config: both login passwords stored,
    /// both users MFA-enrolled, every push approved.
    pub(crate) fn standard() -> Self {
        let config = GatekeeperConfig::new("http://fake", BOOTSTRAP);
        let fake = Self {
            inner: Mutex::new(Inner::default()),
            ro_password_path: config.ro_identity.password_path.clone(),
            rw_username: config.rw_identity.username.clone(),
            hold_mfa: Mutex::new(None),
        };

        fake.put_secret(&config.ro_identity.password_path, json!({ "password": "ro-pass" }));
        fake.put_secret(&config.rw_identity.password_path, json!({ "password": "rw-pass" }));
        fake.add_user(&config.ro_identity.username, "ro-pass", RO_LEASE);
        fake.add_user(&config.rw_identity.username, "rw-pass", RW_LEASE);
        fake
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn put_secret(&self, path: &str, data: Value) {
        let data = match data {
            Value::Object(map) => map,
            other => panic!("secret must be an object, got {}", other),
        };
        self.lock().secrets.insert(path.to_string(), data);
    }

    pub(crate) fn add_user(&self, username: &str, password: &str, lease: u64) {
        self.lock()
            .users
            .insert(username.to_string(), (password.to_string(), lease));
    }

    pub(crate) fn unenroll_mfa(&self, username: &str) {
        self.lock().unenrolled.insert(username.to_string());
    }

    /// Queue answers for the next pushes; unqueued pushes are approved
    pub(crate) fn script_mfa(&self, decisions: &[MfaDecision]) {
        self.lock().decisions.extend(decisions.iter().copied());
    }

    pub(crate) fn fail_revocations(&self) {
        self.lock().revoke_fails = true;
    }

    /// Make MFA validation wait until the returned handle is notified
    pub(crate) fn hold_mfa(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.hold_mfa.lock().unwrap_or_else(PoisonError::into_inner) = Some(notify.clone());
        notify
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub(crate) fn logins(&self) -> usize {
        self.count(|c| matches!(c, Call::Login { .. }))
    }

    pub(crate) fn logins_for(&self, username: &str) -> usize {
        self.count(|c| matches!(c, Call::Login { username: u } if u == username))
    }

    pub(crate) fn mfa_validations(&self) -> usize {
        self.count(|c| matches!(c, Call::ValidateMfa { .. }))
    }

    pub(crate) fn writes(&self) -> usize {
        self.count(|c| matches!(c, Call::Write { .. }))
    }

    pub(crate) fn revocations(&self) -> usize {
        self.count(|c| matches!(c, Call::Revoke { .. }))
    }

    pub(crate) fn is_live(&self, token: &str) -> bool {
        self.lock().issued.contains_key(token)
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|c| pred(c)).count()
    }

    fn forbidden() -> GatekeeperError {
        GatekeeperError::BackendRequest {
            status: 403,
            body: r#"{"errors":["permission denied"]}"#.into(),
        }
    }
}

#[async_trait]
impl SecretsBackend for FakeBackend {
    async fn read_kv(&self, path: &str, token: &str) -> GatekeeperResult<KvReadResponse> {
        let mut inner = self.lock();
        inner.calls.push(Call::Read {
            path: path.to_string(),
            token: token.to_string(),
        });

        let allowed = inner.issued.contains_key(token)
            || (token == BOOTSTRAP && path == self.ro_password_path);
        if !allowed {
            return Err(Self::forbidden());
        }

        match inner.secrets.get(path) {
            Some(data) => Ok(KvReadResponse::with_data(data.clone())),
            None => Err(GatekeeperError::BackendRequest {
                status: 404,
                body: r#"{"errors":[]}"#.into(),
            }),
        }
    }

    async fn list_kv(&self, path: &str, token: &str) -> GatekeeperResult<KvListResponse> {
        let mut inner = self.lock();
        inner.calls.push(Call::List {
            path: path.to_string(),
            token: token.to_string(),
        });
        if !inner.issued.contains_key(token) {
            return Err(Self::forbidden());
        }

        let prefix = path.trim_end_matches('/');
        let mut keys: Vec<String> = inner
            .secrets
            .keys()
            .filter_map(|k| k.strip_prefix(prefix)?.strip_prefix('/'))
            .map(|rest| match rest.split_once('/') {
                Some((dir, _)) => format!("{}/", dir),
                None => rest.to_string(),
            })
            .collect();
        keys.sort();
        keys.dedup();
        Ok(KvListResponse::with_keys(keys))
    }

    async fn write_kv(
        &self,
        path: &str,
        data: &SecretData,
        token: &str,
    ) -> GatekeeperResult<KvWriteResponse> {
        let mut inner = self.lock();
        inner.calls.push(Call::Write {
            path: path.to_string(),
            token: token.to_string(),
        });
        if inner.issued.get(token) != Some(&self.rw_username) {
            return Err(Self::forbidden());
        }

        inner.secrets.insert(path.to_string(), data.clone());
        let version = inner.versions.entry(path.to_string()).or_insert(0);
        *version += 1;
        Ok(KvWriteResponse::with_version(*version))
    }

    async fn userpass_login(&self, username: &str, password: &str) -> GatekeeperResult<LoginResponse> {
        let mut inner = self.lock();
        inner.calls.push(Call::Login {
            username: username.to_string(),
        });

        match inner.users.get(username) {
            Some((expected, _)) if expected == password => {}
            _ => {
                return Err(GatekeeperError::BackendRequest {
                    status: 400,
                    body: r#"{"errors":["invalid username or password"]}"#.into(),
                })
            }
        }
        if inner.unenrolled.contains(username) {
            return Ok(LoginResponse::default());
        }

        inner.next_id += 1;
        let request_id = format!("mfa-req-{}", inner.next_id);
        inner.pending.insert(request_id.clone(), username.to_string());
        Ok(LoginResponse::pending_mfa(&request_id))
    }

    async fn validate_mfa(
        &self,
        mfa_request_id: &str,
        _method_id: &str,
        token: &str,
    ) -> GatekeeperResult<MfaValidateResponse> {
        let username = {
            let mut inner = self.lock();
            let username = inner.pending.get(mfa_request_id).cloned().unwrap_or_default();
            inner.calls.push(Call::ValidateMfa {
                username: username.clone(),
                token: token.to_string(),
            });
            if token != BOOTSTRAP {
                return Err(Self::forbidden());
            }
            username
        };

        let hold = self
            .hold_mfa
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(notify) = hold {
            notify.notified().await;
        }

        let mut inner = self.lock();
        inner.pending.remove(mfa_request_id);
        let decision = inner.decisions.pop_front().unwrap_or(MfaDecision::Approve);
        if decision == MfaDecision::Deny {
            return Ok(MfaValidateResponse::default());
        }

        let lease = inner.users.get(&username).map(|(_, l)| *l).unwrap_or(900);
        inner.next_id += 1;
        let client_token = format!("s.{}-{}", username, inner.next_id);
        inner.issued.insert(client_token.clone(), username);
        Ok(MfaValidateResponse::approved(&client_token, lease))
    }

    async fn revoke_self(&self, token: &str) -> GatekeeperResult<()> {
        let mut inner = self.lock();
        inner.calls.push(Call::Revoke {
            token: token.to_string(),
        });
        if inner.revoke_fails {
            return Err(GatekeeperError::BackendRequest {
                status: 500,
                body: "internal error".into(),
            });
        }
        inner.issued.remove(token);
        Ok(())
    }
}
