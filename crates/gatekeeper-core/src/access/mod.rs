//! ============================================================================
//! Access Module - MFA-gated token tiers for the secrets store
//! ============================================================================
//! Tracks the RO and RW tokens and drives every transition between tiers.
//!
//! ## Tiers
//! - **no_access**: no valid token (process start, or RO lease elapsed)
//! - **ro**: read/list, renewed automatically with an MFA push when expired
//! - **rw**: read/write, only via explicit `escalate`, never renewed
//!
//! ## Usage
//! ```rust,ignore
//! use gatekeeper_core::access::AccessGateway;
//!
//! let gateway = AccessGateway::new(&config)?;
//! let data = gateway.read_secret("claude/config").await?;
//! gateway.escalate().await?;
//! gateway.write_secret("claude/config", &data).await?;
//! gateway.deescalate().await;
//! ```
//! ============================================================================

mod clock;
mod gateway;
mod store;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use gateway::AccessGateway;
pub use store::TierStore;
pub use types::{
    AccessTier, Credential, TokenSlot, TokenStatus, RO_TARGET_LEASE_SECS, RW_TARGET_LEASE_SECS,
};
