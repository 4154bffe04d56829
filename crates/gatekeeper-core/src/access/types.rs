//! ============================================================================
//! Access Types - Token tiers, credential slots and status snapshots
//! ============================================================================
//! Defines the derived access tier, the two credential slots it is derived
//! from, and the status report handed back to callers.
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Design-target lease for a read-only token (4 hours)
pub const RO_TARGET_LEASE_SECS: u64 = 4 * 60 * 60;

/// Design-target lease for a read-write token (15 minutes)
pub const RW_TARGET_LEASE_SECS: u64 = 15 * 60;

/// Current capability level, derived from which credentials are valid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AccessTier {
    /// No valid token held
    #[default]
    #[serde(rename = "no_access")]
    NoAccess,
    /// Read-only token valid
    #[serde(rename = "ro")]
    ReadOnly,
    /// Read-write token valid
    #[serde(rename = "rw")]
    ReadWrite,
}

impl AccessTier {
    /// Derive the tier from slot validity: RW > RO > none
    pub fn from_validity(ro_valid: bool, rw_valid: bool) -> Self {
        match (ro_valid, rw_valid) {
            (_, true) => AccessTier::ReadWrite,
            (true, false) => AccessTier::ReadOnly,
            (false, false) => AccessTier::NoAccess,
        }
    }

    /// Short wire name ("no_access", "ro", "rw")
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessTier::NoAccess => "no_access",
            AccessTier::ReadOnly => "ro",
            AccessTier::ReadWrite => "rw",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            AccessTier::NoAccess => 0,
            AccessTier::ReadOnly => 1,
            AccessTier::ReadWrite => 2,
        }
    }
}

impl PartialOrd for AccessTier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AccessTier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl std::fmt::Display for AccessTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two independent credential slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSlot {
    ReadOnly,
    ReadWrite,
}

impl TokenSlot {
    pub fn label(&self) -> &'static str {
        match self {
            TokenSlot::ReadOnly => "RO",
            TokenSlot::ReadWrite => "RW",
        }
    }
}

/// An opaque bearer token plus its absolute expiry
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    value: String,
    issued_at: DateTime<Utc>,
    expiry: DateTime<Utc>,
}

impl Credential {
    pub fn new(value: String, issued_at: DateTime<Utc>, lease_secs: u64) -> Self {
        // Clamp so absurd backend leases cannot overflow the timestamp
        let lease = chrono::Duration::seconds(lease_secs.min(u64::from(u32::MAX)) as i64);
        Self {
            value,
            issued_at,
            expiry: issued_at + lease,
        }
    }

    /// Token value for the auth header
    pub fn token(&self) -> &str {
        &self.value
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expiry(&self) -> DateTime<Utc> {
        self.expiry
    }

    /// Valid strictly before expiry
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expiry
    }

    /// Whole seconds left, truncated toward zero
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expiry - now).num_seconds().max(0)
    }
}

// Token values never reach logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expiry", &self.expiry)
            .finish()
    }
}

/// Snapshot of the current tier and per-slot lease state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStatus {
    pub tier: AccessTier,
    pub ro_token: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ro_token_remaining_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ro_token_expiry: Option<DateTime<Utc>>,
    pub rw_token: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rw_token_remaining_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rw_token_expiry: Option<DateTime<Utc>>,
}
