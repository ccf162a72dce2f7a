//! Authenticated identity types.

use serde::Serialize;

/// The authenticated subject behind a session token.
///
/// Carries no role or permission information; presence only proves the
/// caller holds a valid session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// Opaque subject id assigned by the identity provider
    pub subject_id: String,
    pub email: String,
    /// Issued at (Unix timestamp)
    pub issued_at: u64,
    /// Expiration time (Unix timestamp)
    pub expires_at: u64,
}

impl Identity {
    /// Whether the session behind this identity is still valid at `now`.
    pub fn is_valid_at(&self, now: u64) -> bool {
        now < self.expires_at
    }
}
