//! ============================================================================
//! Tier Store - The two credential slots and their expiry evaluation
//! ============================================================================
//! Holds at most one RO and one RW credential. Expired credentials are
//! dropped the next time they are looked at; there is no background sweep.
//! No I/O happens here.
//! ============================================================================

use std::sync::Arc;
use tracing::debug;

use super::clock::Clock;
use super::types::{AccessTier, Credential, TokenSlot, TokenStatus};

/// In-memory credential slots
pub struct TierStore {
    clock: Arc<dyn Clock>,
    ro: Option<Credential>,
    rw: Option<Credential>,
}

impl TierStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            ro: None,
            rw: None,
        }
    }

    fn slot_mut(&mut self, slot: TokenSlot) -> &mut Option<Credential> {
        match slot {
            TokenSlot::ReadOnly => &mut self.ro,
            TokenSlot::ReadWrite => &mut self.rw,
        }
    }

    /// Whether the slot holds an unexpired credential. Clears it if expired.
    pub fn is_valid(&mut self, slot: TokenSlot) -> bool {
        let now = self.clock.now();
        let held = self.slot_mut(slot);
        let valid = held.as_ref().is_some_and(|cred| cred.is_valid_at(now));
        if !valid && held.take().is_some() {
            debug!("{} token expired, clearing", slot.label());
        }
        valid
    }

    /// The slot's credential if still valid
    pub fn current(&mut self, slot: TokenSlot) -> Option<&Credential> {
        if !self.is_valid(slot) {
            return None;
        }
        self.slot_mut(slot).as_ref()
    }

    /// Replace the slot with a fresh credential leased from now
    pub fn set(&mut self, slot: TokenSlot, value: String, lease_secs: u64) -> &Credential {
        let now = self.clock.now();
        self.slot_mut(slot)
            .insert(Credential::new(value, now, lease_secs))
    }

    pub fn clear(&mut self, slot: TokenSlot) {
        *self.slot_mut(slot) = None;
    }

    /// Token for operations accepting either tier: RW > RO > none
    pub fn best_token(&mut self) -> Option<String> {
        if let Some(rw) = self.current(TokenSlot::ReadWrite) {
            return Some(rw.token().to_string());
        }
        self.current(TokenSlot::ReadOnly)
            .map(|ro| ro.token().to_string())
    }

    pub fn tier(&mut self) -> AccessTier {
        let ro_valid = self.is_valid(TokenSlot::ReadOnly);
        let rw_valid = self.is_valid(TokenSlot::ReadWrite);
        AccessTier::from_validity(ro_valid, rw_valid)
    }

    pub fn status(&mut self) -> TokenStatus {
        let now = self.clock.now();
        let ro = self.current(TokenSlot::ReadOnly).cloned();
        let rw = self.current(TokenSlot::ReadWrite).cloned();

        TokenStatus {
            tier: AccessTier::from_validity(ro.is_some(), rw.is_some()),
            ro_token: ro.is_some(),
            ro_token_remaining_seconds: ro.as_ref().map(|c| c.remaining_secs(now)),
            ro_token_expiry: ro.as_ref().map(Credential::expiry),
            rw_token: rw.is_some(),
            rw_token_remaining_seconds: rw.as_ref().map(|c| c.remaining_secs(now)),
            rw_token_expiry: rw.as_ref().map(Credential::expiry),
        }
    }
}
