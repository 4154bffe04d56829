//! ============================================================================
//! Wire Types - Response bodies of the OpenBao endpoints we call
//! ============================================================================
//! Every field is optional on the way in. The accessor methods are where a
//! missing field becomes the matching `GatekeeperError`.
//! ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::{GatekeeperError, GatekeeperResult, WriteReceipt};

/// Lease assumed when the MFA response omits `lease_duration`
pub const DEFAULT_LEASE_SECS: u64 = 900;

/// Key/value payload of a KV v2 secret
pub type SecretData = Map<String, Value>;

/// `GET <mount>/data/<path>`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KvReadResponse {
    #[serde(default)]
    pub data: Option<KvReadData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KvReadData {
    #[serde(default)]
    pub data: Option<SecretData>,
}

impl KvReadResponse {
    pub fn with_data(data: SecretData) -> Self {
        Self {
            data: Some(KvReadData { data: Some(data) }),
        }
    }

    /// The secret's key/value payload; empty when the body carries none
    pub fn into_data(self) -> SecretData {
        self.data.and_then(|d| d.data).unwrap_or_default()
    }

    /// Non-empty `password` field, or `CredentialLookup` naming `path`
    pub fn into_password(self, path: &str) -> GatekeeperResult<String> {
        self.into_data()
            .remove("password")
            .and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s),
                _ => None,
            })
            .ok_or_else(|| GatekeeperError::CredentialLookup {
                path: path.to_string(),
            })
    }
}

/// `LIST <mount>/metadata/<path>`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KvListResponse {
    #[serde(default)]
    pub data: Option<KvListData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KvListData {
    #[serde(default)]
    pub keys: Vec<String>,
}

impl KvListResponse {
    pub fn with_keys(keys: Vec<String>) -> Self {
        Self {
            data: Some(KvListData { keys }),
        }
    }

    pub fn into_keys(self) -> Vec<String> {
        self.data.map(|d| d.keys).unwrap_or_default()
    }
}

/// `POST <mount>/data/<path>`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KvWriteResponse {
    #[serde(default)]
    pub data: Option<KvWriteData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KvWriteData {
    #[serde(default)]
    pub version: Option<u64>,
}

impl KvWriteResponse {
    pub fn with_version(version: u64) -> Self {
        Self {
            data: Some(KvWriteData {
                version: Some(version),
            }),
        }
    }

    pub fn into_receipt(self) -> GatekeeperResult<WriteReceipt> {
        self.data
            .and_then(|d| d.version)
            .map(|version| WriteReceipt { version })
            .ok_or_else(|| GatekeeperError::InvalidResponse {
                message: "write response carried no version".into(),
            })
    }
}

/// `POST auth/<userpass>/login/<username>`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub auth: Option<LoginAuth>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginAuth {
    #[serde(default)]
    pub mfa_requirement: Option<MfaRequirement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MfaRequirement {
    #[serde(default)]
    pub mfa_request_id: Option<String>,
}

impl LoginResponse {
    pub fn pending_mfa(request_id: &str) -> Self {
        Self {
            auth: Some(LoginAuth {
                mfa_requirement: Some(MfaRequirement {
                    mfa_request_id: Some(request_id.to_string()),
                }),
            }),
        }
    }

    /// Pending-MFA handle, or `MfaNotConfigured` for `username`
    pub fn into_mfa_request_id(self, username: &str) -> GatekeeperResult<String> {
        self.auth
            .and_then(|a| a.mfa_requirement)
            .and_then(|m| m.mfa_request_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| GatekeeperError::MfaNotConfigured {
                username: username.to_string(),
            })
    }
}

/// `POST sys/mfa/validate`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MfaValidateResponse {
    #[serde(default)]
    pub auth: Option<MfaValidateAuth>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MfaValidateAuth {
    #[serde(default)]
    pub client_token: Option<String>,
    #[serde(default)]
    pub lease_duration: Option<u64>,
}

/// Terminal output of a login flow
#[derive(Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub client_token: String,
    pub lease_secs: u64,
}

impl std::fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedToken")
            .field("client_token", &"<redacted>")
            .field("lease_secs", &self.lease_secs)
            .finish()
    }
}

impl MfaValidateResponse {
    pub fn approved(client_token: &str, lease_duration: u64) -> Self {
        Self {
            auth: Some(MfaValidateAuth {
                client_token: Some(client_token.to_string()),
                lease_duration: Some(lease_duration),
            }),
        }
    }

    /// Issued token, or `MfaDeniedOrTimedOut` for `username`
    pub fn into_issued_token(self, username: &str) -> GatekeeperResult<IssuedToken> {
        let auth = self.auth.unwrap_or_default();
        let client_token = auth
            .client_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| GatekeeperError::MfaDeniedOrTimedOut {
                username: username.to_string(),
            })?;

        Ok(IssuedToken {
            client_token,
            lease_secs: auth.lease_duration.unwrap_or(DEFAULT_LEASE_SECS),
        })
    }
}
