//! ============================================================================
//! Auth Module - MFA-gated login flows
//! ============================================================================
//! Turns a userpass identity into a leased token via an out-of-band Duo
//! push. The same flow mints RO tokens (authorised by the bootstrap token)
//! and RW tokens (authorised by a valid RO token).
//! ============================================================================

mod mfa_login;

pub use mfa_login::MfaLoginFlow;
