//! Axum extractors exposing the gate's outcome to handlers.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};

use super::errors::GateRejection;
use super::gate::GateOutcome;
use super::types::Identity;

fn outcome(parts: &Parts) -> Option<&GateOutcome> {
    let outcome = parts.extensions.get::<GateOutcome>();
    if outcome.is_none() {
        tracing::error!(path = %parts.uri.path(), "Access gate did not run for this route");
    }
    outcome
}

/// Extractor for handlers that require an authenticated caller.
///
/// The gate has already blocked unauthenticated requests on protected
/// routes; this rejects with the same JSON 401 if it is used on a route the
/// gate classified as public.
pub struct Auth(pub Identity);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        outcome(parts)
            .and_then(GateOutcome::identity)
            .cloned()
            .map(Auth)
            .ok_or(GateRejection::unauthorized(StatusCode::UNAUTHORIZED))
    }
}

/// Optional authentication extractor - never fails.
/// Always `None` on routes the gate classified as public.
pub struct OptionalAuth(pub Option<Identity>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(OptionalAuth(
            outcome(parts).and_then(GateOutcome::identity).cloned(),
        ))
    }
}
