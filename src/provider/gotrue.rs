//! Supabase GoTrue client.
//!
//! Sessions are validated with `GET /auth/v1/user`. One-time codes are
//! exchanged with `POST /auth/v1/verify`, and sign-out calls
//! `POST /auth/v1/logout`. Expiry and issue time are read from the access
//! token's own payload, since the user endpoint does not report them.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{IdentityProvider, IssuedSession, OtpKind, ProviderError};
use crate::auth::Identity;

/// HTTP client for a GoTrue instance.
#[derive(Clone)]
pub struct GoTrueProvider {
    client: reqwest::Client,
    user_url: Url,
    verify_url: Url,
    logout_url: Url,
    anon_key: String,
}

#[derive(Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    token_hash: &'a str,
}

#[derive(Deserialize)]
struct VerifyResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct TokenTimes {
    #[serde(default)]
    iat: u64,
    exp: u64,
}

impl GoTrueProvider {
    /// Create a client for the project at `base_url` (e.g. `https://xyz.supabase.co`).
    pub fn new(base_url: &Url, anon_key: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let join = |path: &str| {
            base_url
                .join(path)
                .map_err(|e| ProviderError::Unavailable(format!("invalid provider URL: {}", e)))
        };

        Ok(Self {
            client,
            user_url: join("/auth/v1/user")?,
            verify_url: join("/auth/v1/verify")?,
            logout_url: join("/auth/v1/logout")?,
            anon_key: anon_key.to_string(),
        })
    }

    async fn fetch_user(&self, token: &str) -> Result<UserResponse, ProviderError> {
        let response = self
            .client
            .get(self.user_url.clone())
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let response = check_status(response)?;
        response
            .json::<UserResponse>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl IdentityProvider for GoTrueProvider {
    async fn validate_session(&self, token: &str) -> Result<Identity, ProviderError> {
        // Reject tokens we cannot date before spending a round trip on them
        let times = token_times(token)?;
        let user = self.fetch_user(token).await?;

        Ok(Identity {
            subject_id: user.id,
            email: user.email.unwrap_or_default(),
            issued_at: times.iat,
            expires_at: times.exp,
        })
    }

    async fn verify_otp(
        &self,
        token_hash: &str,
        kind: OtpKind,
    ) -> Result<IssuedSession, ProviderError> {
        let response = self
            .client
            .post(self.verify_url.clone())
            .header("apikey", &self.anon_key)
            .json(&VerifyRequest {
                kind: kind.as_str(),
                token_hash,
            })
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let session = check_status(response)?
            .json::<VerifyResponse>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        let identity = self.validate_session(&session.access_token).await?;

        Ok(IssuedSession {
            access_token: session.access_token,
            expires_in: session.expires_in,
            identity,
        })
    }

    async fn revoke_session(&self, token: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(self.logout_url.clone())
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        check_status(response)?;
        Ok(())
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::NOT_FOUND
        | StatusCode::UNPROCESSABLE_ENTITY => Err(ProviderError::InvalidCredential(format!(
            "provider returned {}",
            status
        ))),
        _ => Err(ProviderError::Unavailable(format!(
            "provider returned {}",
            status
        ))),
    }
}

/// Read `iat`/`exp` from a JWT payload without verifying the signature.
/// The provider performs verification; this only dates the session.
fn token_times(token: &str) -> Result<TokenTimes, ProviderError> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(_), Some(payload), Some(_), None) => payload,
        _ => {
            return Err(ProviderError::InvalidCredential(
                "token is not a JWT".to_string(),
            ));
        }
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ProviderError::InvalidCredential(format!("bad token payload: {}", e)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| ProviderError::InvalidCredential(format!("bad token payload: {}", e)))
}
