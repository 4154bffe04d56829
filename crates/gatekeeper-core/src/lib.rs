//! ============================================================================
//! GATEKEEPER-CORE: Zero-standing-access token broker
//! ============================================================================
//! This crate holds no long-lived credentials. It handles:
//! - RO / RW token tiers with lazy expiry
//! - Duo-gated userpass login flows against OpenBao
//! - Secret read/list/write through the tier that permits it
//! ============================================================================

pub mod access;
pub mod auth;
pub mod backend;
pub mod config;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use access::{AccessGateway, AccessTier, TokenStatus};
pub use backend::{OpenBaoClient, SecretData, SecretsBackend};
pub use config::{ConfigError, GatekeeperConfig};
