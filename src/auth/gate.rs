//! The access gate: classification plus resolution for every request.
//!
//! Installed once as the outermost router layer so it runs before any
//! handler. It can also be invoked directly through [`AccessGate::intercept`].

use axum::{
    extract::{OriginalUri, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;

use super::errors::GateRejection;
use super::resolver::SessionResolver;
use super::types::Identity;
use crate::policy::{PolicyTable, RoutePolicy};

/// Outcome of the gate, stored in request extensions for handlers.
///
/// The identity is fixed when the gate runs and is not replaced afterwards.
#[derive(Debug, Clone)]
pub struct GateOutcome {
    policy: RoutePolicy,
    identity: Option<Arc<Identity>>,
}

impl GateOutcome {
    pub fn policy(&self) -> &RoutePolicy {
        &self.policy
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

/// A request that passed the gate.
#[derive(Debug)]
pub struct RequestContext {
    request: Request,
    outcome: GateOutcome,
}

impl RequestContext {
    fn new(request: Request, policy: RoutePolicy, identity: Option<Identity>) -> Self {
        Self {
            request,
            outcome: GateOutcome {
                policy,
                identity: identity.map(Arc::new),
            },
        }
    }

    pub fn policy(&self) -> &RoutePolicy {
        self.outcome.policy()
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.outcome.identity()
    }

    pub fn is_authenticated(&self) -> bool {
        self.outcome.is_authenticated()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Hand the request on to the router with the outcome attached.
    pub fn into_request(self) -> Request {
        let mut request = self.request;
        request.extensions_mut().insert(self.outcome);
        request
    }
}

/// Composes route classification and session resolution.
#[derive(Clone)]
pub struct AccessGate {
    policy: Arc<PolicyTable>,
    resolver: SessionResolver,
}

impl AccessGate {
    pub fn new(policy: Arc<PolicyTable>, resolver: SessionResolver) -> Self {
        Self { policy, resolver }
    }

    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    pub fn resolver(&self) -> &SessionResolver {
        &self.resolver
    }

    /// Decide whether `request` may proceed.
    pub async fn intercept(&self, request: Request) -> Result<RequestContext, GateRejection> {
        // Nested routers strip their prefix; classify the path the client sent
        let uri = request
            .extensions()
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| request.uri().clone());
        let path = uri.path();
        let policy = self.policy.classify(path);

        // Public routes never consult the provider
        let identity = if policy.is_public() {
            None
        } else {
            self.resolver.resolve(request.headers()).await
        };

        match (policy, identity) {
            (policy, Some(identity)) => {
                debug!(path, subject = %identity.subject_id, "Request authenticated");
                Ok(RequestContext::new(request, policy, Some(identity)))
            }
            (RoutePolicy::Public, None) => Ok(RequestContext::new(request, RoutePolicy::Public, None)),
            (RoutePolicy::ProtectedPage { redirect_to }, None) => {
                debug!(path, "Unauthenticated page request redirected");
                let original = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or(path);
                Err(GateRejection::redirect_to_login(&redirect_to, original))
            }
            (RoutePolicy::ProtectedApi { status }, None) => {
                debug!(path, "Unauthenticated API request rejected");
                Err(GateRejection::unauthorized(status))
            }
        }
    }
}

/// Router middleware running the gate.
pub async fn access_gate(
    State(gate): State<Arc<AccessGate>>,
    request: Request,
    next: Next,
) -> Response {
    // Nested routers must not resolve the same request twice
    if request.extensions().get::<GateOutcome>().is_some() {
        return next.run(request).await;
    }

    match gate.intercept(request).await {
        Ok(context) => next.run(context.into_request()).await,
        Err(rejection) => rejection.into_response(),
    }
}
