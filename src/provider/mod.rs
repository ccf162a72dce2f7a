//! Identity provider clients.
//!
//! The gate only needs two operations from the provider: validating an
//! existing session token and exchanging a one-time code for a new session.

mod gotrue;
mod jwt;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::auth::Identity;

pub use gotrue::GoTrueProvider;
pub use jwt::{JwtProvider, SessionClaims, TokenError};

/// Errors returned by identity provider calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The token or code was rejected (expired, malformed, revoked).
    #[error("credential rejected: {0}")]
    InvalidCredential(String),

    /// The provider could not be reached or answered unexpectedly.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    /// The provider answered successfully but the payload was unusable.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// The operation is not supported by this provider.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),
}

/// Kind of one-time code sent by the provider's email flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpKind {
    Signup,
    Invite,
    Magiclink,
    Recovery,
    EmailChange,
    Email,
}

impl OtpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpKind::Signup => "signup",
            OtpKind::Invite => "invite",
            OtpKind::Magiclink => "magiclink",
            OtpKind::Recovery => "recovery",
            OtpKind::EmailChange => "email_change",
            OtpKind::Email => "email",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "signup" => Some(OtpKind::Signup),
            "invite" => Some(OtpKind::Invite),
            "magiclink" => Some(OtpKind::Magiclink),
            "recovery" => Some(OtpKind::Recovery),
            "email_change" => Some(OtpKind::EmailChange),
            "email" => Some(OtpKind::Email),
            _ => None,
        }
    }
}

/// A session issued by the provider after a successful code exchange.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub access_token: String,
    /// Lifetime of the access token in seconds
    pub expires_in: u64,
    pub identity: Identity,
}

/// Operations the gate and the auth-flow routes consume from the provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validate a session token and return the identity it belongs to.
    async fn validate_session(&self, token: &str) -> Result<Identity, ProviderError>;

    /// Exchange a one-time code (email confirmation, magic link, recovery)
    /// for a new session.
    async fn verify_otp(
        &self,
        token_hash: &str,
        kind: OtpKind,
    ) -> Result<IssuedSession, ProviderError>;

    /// End a session at the provider. Stateless providers have nothing to do.
    async fn revoke_session(&self, _token: &str) -> Result<(), ProviderError> {
        Ok(())
    }
}
