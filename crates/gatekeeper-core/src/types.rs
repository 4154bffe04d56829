//! ============================================================================
//! Shared Types - Errors and operation outcomes
//! ============================================================================
//! Every failure the gateway can produce is a `GatekeeperError` value so the
//! calling layer can render it; nothing escapes as a panic.
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::{AccessTier, TokenSlot};

/// Error types for the gatekeeper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GatekeeperError {
    #[error("Failed to retrieve login password from {path}")]
    CredentialLookup { path: String },

    #[error("Userpass login for {username} did not return an MFA request ID. Check that MFA enforcement is configured.")]
    MfaNotConfigured { username: String },

    #[error("MFA validation for {username} was denied or timed out: no token was returned")]
    MfaDeniedOrTimedOut { username: String },

    #[error("Backend returned {status}: {body}")]
    BackendRequest { status: u16, body: String },

    #[error("Invalid secret path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("RW token expired or not held. Call `escalate` to obtain a new read-write token (requires Duo approval).")]
    InsufficientPrivilege,

    #[error("Request to secrets backend failed: {message}")]
    Transport { message: String },

    #[error("Unexpected response from secrets backend: {message}")]
    InvalidResponse { message: String },
}

pub type GatekeeperResult<T> = Result<T, GatekeeperError>;

/// A freshly minted tier credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierGrant {
    pub slot: TokenSlot,
    pub lease_secs: u64,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Display for TierGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let action = match self.slot {
            TokenSlot::ReadOnly => "Authentication",
            TokenSlot::ReadWrite => "Escalation",
        };
        write!(
            f,
            "{} successful. {} token acquired with {}s TTL (expires {}).",
            action,
            self.slot.label(),
            self.lease_secs,
            self.expires_at.to_rfc3339()
        )
    }
}

/// Result of a de-escalation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deescalation {
    /// Whether an RW token was held and dropped
    pub revoked: bool,
    /// Tier after the call
    pub tier: AccessTier,
}

impl std::fmt::Display for Deescalation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.revoked {
            write!(f, "RW token revoked. Dropped to {}.", self.tier)
        } else {
            write!(f, "No active RW token to revoke. Current tier: {}", self.tier)
        }
    }
}

/// Backend acknowledgement of a secret write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub version: u64,
}
