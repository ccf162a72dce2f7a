//! Local validation of provider-issued access tokens.
//!
//! Supabase signs access tokens with a project-wide HS256 secret. Holding that
//! secret lets the gate validate sessions without a network round trip.

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{IdentityProvider, IssuedSession, OtpKind, ProviderError};
use crate::auth::Identity;

/// Audience claim carried by end-user access tokens.
pub const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// Claims of a provider access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user UUID)
    pub sub: String,
    /// Email address, empty for phone-only accounts
    #[serde(default)]
    pub email: String,
    /// Audience
    pub aud: String,
    /// Database role the token maps to
    #[serde(default)]
    pub role: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl From<SessionClaims> for Identity {
    fn from(claims: SessionClaims) -> Self {
        Identity {
            subject_id: claims.sub,
            email: claims.email,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

/// Validates (and for development, mints) HS256 session tokens.
#[derive(Clone)]
pub struct JwtProvider {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtProvider {
    /// Create a provider with the given shared secret.
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Mint a session token valid for `duration` seconds.
    pub fn issue_token(
        &self,
        subject_id: &str,
        email: &str,
        duration: u64,
    ) -> Result<String, TokenError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| TokenError::TimeError)?
            .as_secs();

        let claims = SessionClaims {
            sub: subject_id.to_string(),
            email: email.to_string(),
            aud: AUTHENTICATED_AUDIENCE.to_string(),
            role: AUTHENTICATED_AUDIENCE.to_string(),
            iat: now,
            exp: now + duration,
        };

        self.encode(&claims)
    }

    /// Sign arbitrary claims.
    pub fn encode(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::default(), claims, &self.encoding_key)
            .map_err(TokenError::Encoding)
    }

    /// Validate and decode a session token.
    pub fn validate_token(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(&[AUTHENTICATED_AUDIENCE]);

        let token_data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map_err(TokenError::Decoding)?;

        if token_data.claims.sub.is_empty() {
            return Err(TokenError::MissingSubject);
        }

        Ok(token_data.claims)
    }
}

#[async_trait]
impl IdentityProvider for JwtProvider {
    async fn validate_session(&self, token: &str) -> Result<Identity, ProviderError> {
        self.validate_token(token)
            .map(Identity::from)
            .map_err(|e| ProviderError::InvalidCredential(e.to_string()))
    }

    async fn verify_otp(
        &self,
        _token_hash: &str,
        _kind: OtpKind,
    ) -> Result<IssuedSession, ProviderError> {
        Err(ProviderError::Unsupported(
            "one-time codes require the GoTrue provider",
        ))
    }
}

/// Errors that can occur during token operations.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("Failed to decode token: {0}")]
    Decoding(jsonwebtoken::errors::Error),
    #[error("System time error")]
    TimeError,
    #[error("Token has no subject")]
    MissingSubject,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn test_issue_and_validate() {
        let provider = JwtProvider::new(b"test-secret-key-for-testing");

        let token = provider
            .issue_token("uuid-123", "alice@example.com", 3600)
            .unwrap();

        let claims = provider.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "uuid-123");
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.aud, AUTHENTICATED_AUDIENCE);
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_invalid_token() {
        let provider = JwtProvider::new(b"test-secret-key-for-testing");
        assert!(provider.validate_token("invalid-token").is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let p1 = JwtProvider::new(b"secret-1");
        let p2 = JwtProvider::new(b"secret-2");

        let token = p1.issue_token("uuid-123", "alice@example.com", 60).unwrap();
        assert!(p2.validate_token(&token).is_err());
    }

    #[test]
    fn test_expired_token() {
        let provider = JwtProvider::new(b"test-secret");
        let now = now();

        let token = provider
            .encode(&SessionClaims {
                sub: "uuid-123".to_string(),
                email: "alice@example.com".to_string(),
                aud: AUTHENTICATED_AUDIENCE.to_string(),
                role: AUTHENTICATED_AUDIENCE.to_string(),
                iat: now - 100,
                exp: now - 50,
            })
            .unwrap();

        assert!(provider.validate_token(&token).is_err());
    }

    #[test]
    fn test_wrong_audience_rejected() {
        let provider = JwtProvider::new(b"test-secret");
        let now = now();

        // Service-role tokens are not end-user sessions
        let token = provider
            .encode(&SessionClaims {
                sub: "uuid-123".to_string(),
                email: String::new(),
                aud: "service_role".to_string(),
                role: "service_role".to_string(),
                iat: now,
                exp: now + 60,
            })
            .unwrap();

        assert!(provider.validate_token(&token).is_err());
    }

    #[test]
    fn test_missing_subject_rejected() {
        let provider = JwtProvider::new(b"test-secret");
        let now = now();

        let token = provider
            .encode(&SessionClaims {
                sub: String::new(),
                email: String::new(),
                aud: AUTHENTICATED_AUDIENCE.to_string(),
                role: AUTHENTICATED_AUDIENCE.to_string(),
                iat: now,
                exp: now + 60,
            })
            .unwrap();

        assert!(matches!(
            provider.validate_token(&token),
            Err(TokenError::MissingSubject)
        ));
    }

    #[tokio::test]
    async fn test_validate_session_maps_identity() {
        let provider = JwtProvider::new(b"test-secret");
        let token = provider.issue_token("uuid-9", "bob@example.com", 60).unwrap();

        let identity = provider.validate_session(&token).await.unwrap();
        assert_eq!(identity.subject_id, "uuid-9");
        assert_eq!(identity.email, "bob@example.com");
    }

    #[tokio::test]
    async fn test_verify_otp_unsupported() {
        let provider = JwtProvider::new(b"test-secret");
        let result = provider.verify_otp("hash", OtpKind::Signup).await;
        assert!(matches!(result, Err(ProviderError::Unsupported(_))));
    }
}
