//! Session resolution: request credential to identity.
//!
//! Resolution never fails loudly. Every failure mode (no token, rejected
//! token, unreachable provider) comes out as "no identity".

use axum::http::HeaderMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::cache::{Clock, SessionCache, SessionCacheEntry};
use super::cookie::extract_session_token;
use super::types::Identity;
use crate::provider::{IdentityProvider, ProviderError};

/// Default upper bound on how long a resolved session is cached.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60;

/// Why a request did not resolve to an identity. Only used for logging.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no session credential presented")]
    NoCredential,
    #[error("session credential rejected: {0}")]
    InvalidCredential(String),
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
}

impl From<ProviderError> for ResolveError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::InvalidCredential(msg) => ResolveError::InvalidCredential(msg),
            ProviderError::Unavailable(msg) => ResolveError::ProviderUnavailable(msg),
            ProviderError::Malformed(msg) => ResolveError::ProviderUnavailable(msg),
            ProviderError::Unsupported(msg) => ResolveError::ProviderUnavailable(msg.to_string()),
        }
    }
}

/// Resolves session tokens through a cache in front of the identity provider.
#[derive(Clone)]
pub struct SessionResolver {
    provider: Arc<dyn IdentityProvider>,
    cache: SessionCache,
    clock: Arc<dyn Clock>,
    cache_ttl: u64,
}

impl SessionResolver {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        cache: SessionCache,
        clock: Arc<dyn Clock>,
        cache_ttl: u64,
    ) -> Self {
        Self {
            provider,
            cache,
            clock,
            cache_ttl,
        }
    }

    /// Resolve the identity behind the request's credential, if any.
    pub async fn resolve(&self, headers: &HeaderMap) -> Option<Identity> {
        match self.try_resolve(headers).await {
            Ok(identity) => Some(identity),
            Err(ResolveError::NoCredential) => None,
            Err(e @ ResolveError::InvalidCredential(_)) => {
                debug!(error = %e, "Session not resolved");
                None
            }
            Err(e @ ResolveError::ProviderUnavailable(_)) => {
                warn!(error = %e, "Session not resolved");
                None
            }
        }
    }

    /// Resolution with the failure reason preserved.
    pub async fn try_resolve(&self, headers: &HeaderMap) -> Result<Identity, ResolveError> {
        let token = extract_session_token(headers).ok_or(ResolveError::NoCredential)?;
        self.resolve_token(token).await
    }

    /// Resolve a raw session token.
    pub async fn resolve_token(&self, token: &str) -> Result<Identity, ResolveError> {
        let now = self.clock.now();
        if let Some(identity) = self.cache.get(token, now) {
            return Ok(identity);
        }

        let identity = self.provider.validate_session(token).await?;

        // The provider may have taken a while; date the result on return
        let now = self.clock.now();
        if !identity.is_valid_at(now) {
            return Err(ResolveError::InvalidCredential(
                "session already expired".to_string(),
            ));
        }

        self.store(token, &identity, now);
        Ok(identity)
    }

    /// Cache a session the provider just issued, so the first request that
    /// presents it does not need a round trip.
    pub fn remember(&self, token: &str, identity: &Identity) {
        let now = self.clock.now();
        if identity.is_valid_at(now) {
            self.store(token, identity, now);
        }
    }

    fn store(&self, token: &str, identity: &Identity, now: u64) {
        let expires_at = identity
            .expires_at
            .min(now.saturating_add(self.cache_ttl));
        self.cache.insert(
            token,
            SessionCacheEntry {
                identity: identity.clone(),
                expires_at,
            },
            now,
        );
    }

    /// Forget a cached session (sign-out).
    pub fn invalidate(&self, token: &str) {
        self.cache.invalidate(token);
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }
}
