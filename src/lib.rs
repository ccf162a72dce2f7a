pub mod api;
pub mod auth;
pub mod auth_flow;
pub mod cleanup;
pub mod cli;
pub mod db;
pub mod newsletter;
pub mod pages;
pub mod policy;
pub mod provider;
pub mod rate_limit;

use api::{ApiState, create_api_router};
use auth::{AccessGate, Clock, SessionCache, SessionResolver, access_gate};
use auth_flow::AuthFlowState;
use axum::{Router, middleware};
use db::Database;
use newsletter::NewsletterClient;
use policy::PolicyTable;
use provider::IdentityProvider;
use rate_limit::RateLimitConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// Validates session tokens and exchanges one-time codes
    pub provider: Arc<dyn IdentityProvider>,
    /// Validated route classification table
    pub policy: PolicyTable,
    /// Resolved sessions; shared with the cleanup task
    pub cache: SessionCache,
    pub clock: Arc<dyn Clock>,
    /// Upper bound on how long a resolved session is cached, in seconds
    pub cache_ttl: u64,
    /// Whether to set Secure flag on cookies (should be true in production with HTTPS)
    pub secure_cookies: bool,
    /// Header carrying the client IP (requires running behind a proxy)
    pub ip_header: Option<String>,
    /// Newsletter signup; `None` disables the endpoint
    pub newsletter: Option<Arc<NewsletterClient>>,
}

impl ServerConfig {
    /// Session resolver over this configuration's provider and cache.
    pub fn resolver(&self) -> SessionResolver {
        SessionResolver::new(
            self.provider.clone(),
            self.cache.clone(),
            self.clock.clone(),
            self.cache_ttl,
        )
    }
}

/// Create the application router with the given configuration.
///
/// The access gate wraps every route, including the fallback, so no request
/// reaches a handler without being classified first.
pub fn create_app(config: &ServerConfig) -> Router {
    let resolver = config.resolver();
    let policy = Arc::new(config.policy.clone());
    let gate = Arc::new(AccessGate::new(policy.clone(), resolver.clone()));
    let rate_limits = Arc::new(RateLimitConfig::new(config.ip_header.clone()));

    let api_state = ApiState {
        db: config.db.clone(),
        newsletter: config.newsletter.clone(),
    };

    let auth_flow_state = AuthFlowState {
        resolver,
        login_path: policy.login_path().to_string(),
        secure_cookies: config.secure_cookies,
    };

    Router::new()
        .nest("/api", create_api_router(api_state, rate_limits.clone()))
        .merge(auth_flow::router(auth_flow_state, rate_limits))
        .merge(pages::router())
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(gate, access_gate))
}

/// Run cleanup tasks and spawn background scheduler.
/// Call this before starting the server.
pub fn init_cleanup(config: &ServerConfig) {
    let resolver = config.resolver();
    cleanup::run_cleanup(&resolver);
    cleanup::spawn_cleanup_scheduler(resolver);
}

/// Run the server on the given listener. This function blocks until the server exits.
/// Call `init_cleanup` before this to start the cache sweeper.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service).await
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    init_cleanup(&config);

    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
