#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use arenas::auth::{Identity, ManualClock, SessionCache};
use arenas::db::Database;
use arenas::newsletter::NewsletterClient;
use arenas::policy::PolicyTable;
use arenas::provider::{IdentityProvider, IssuedSession, OtpKind, ProviderError};
use arenas::{ServerConfig, create_app};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use tower::ServiceExt;

pub const NOW: u64 = 1_700_000_000;
pub const CLIENT_IP: &str = "198.51.100.7";
pub const ALICE_TOKEN: &str = "token-alice";
pub const BOB_TOKEN: &str = "token-bob";
/// One-time code the mock provider exchanges for Alice's session.
pub const GOOD_TOKEN_HASH: &str = "good-hash";

pub fn identity(subject: &str) -> Identity {
    Identity {
        subject_id: subject.to_string(),
        email: format!("{}@example.com", subject),
        issued_at: NOW,
        expires_at: NOW + 3600,
    }
}

/// Identity provider accepting `token-<subject>` tokens, with call counters.
#[derive(Default)]
pub struct MockProvider {
    validate_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    down: AtomicBool,
    revoked: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for MockProvider {
    async fn validate_session(&self, token: &str) -> Result<Identity, ProviderError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("connection refused".into()));
        }
        match token.strip_prefix("token-") {
            Some(subject) if !subject.is_empty() => Ok(identity(subject)),
            _ => Err(ProviderError::InvalidCredential("unknown token".into())),
        }
    }

    async fn verify_otp(
        &self,
        token_hash: &str,
        _kind: OtpKind,
    ) -> Result<IssuedSession, ProviderError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("connection refused".into()));
        }
        if token_hash != GOOD_TOKEN_HASH {
            return Err(ProviderError::InvalidCredential("code expired".into()));
        }
        Ok(IssuedSession {
            access_token: ALICE_TOKEN.to_string(),
            expires_in: 3600,
            identity: identity("alice"),
        })
    }

    async fn revoke_session(&self, token: &str) -> Result<(), ProviderError> {
        self.revoked.lock().unwrap().push(token.to_string());
        Ok(())
    }
}

pub struct TestApp {
    pub app: Router,
    pub provider: Arc<MockProvider>,
    pub cache: SessionCache,
    pub clock: Arc<ManualClock>,
    pub db: Database,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_newsletter(None).await
    }

    pub async fn with_newsletter(newsletter: Option<Arc<NewsletterClient>>) -> Self {
        let db = Database::open(":memory:")
            .await
            .expect("Failed to open test database");
        let provider = Arc::new(MockProvider::default());
        let cache = SessionCache::new(1024);
        let clock = Arc::new(ManualClock::new(NOW));

        let config = ServerConfig {
            db: db.clone(),
            provider: provider.clone(),
            policy: PolicyTable::default(),
            cache: cache.clone(),
            clock: clock.clone(),
            cache_ttl: 60,
            secure_cookies: false,
            ip_header: Some("x-forwarded-for".to_string()),
            newsletter,
        };

        Self {
            app: create_app(&config),
            provider,
            cache,
            clock,
            db,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        self.send(request("GET", uri, token, None)).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: &str) -> Response<Body> {
        self.send(request("POST", uri, token, Some(body))).await
    }

    pub async fn put_json(&self, uri: &str, token: Option<&str>, body: &str) -> Response<Body> {
        self.send(request("PUT", uri, token, Some(body))).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        self.send(request("DELETE", uri, token, None)).await
    }
}

/// Build a request carrying the session token as a cookie.
pub fn request(method: &str, uri: &str, token: Option<&str>, json: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", CLIENT_IP);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("sb-access-token={}", token));
    }
    match json {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
}

pub fn set_cookie(response: &Response<Body>) -> &str {
    response
        .headers()
        .get(header::SET_COOKIE)
        .expect("missing Set-Cookie header")
        .to_str()
        .unwrap()
}
