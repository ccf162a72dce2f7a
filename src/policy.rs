//! Route classification.
//!
//! Every request path maps to exactly one [`RoutePolicy`] through a table of
//! path prefixes built once at startup. The table is the only place where the
//! redirect-vs-JSON decision for unauthenticated requests is made.

use axum::http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Default login page used as the redirect target for protected pages.
pub const DEFAULT_LOGIN_PATH: &str = "/login";

/// Access rule bound to a path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePolicy {
    /// No identity required.
    Public,
    /// Identity required; redirect to `redirect_to` when missing.
    ProtectedPage { redirect_to: String },
    /// Identity required; respond with `status` and a JSON error when missing.
    ProtectedApi { status: StatusCode },
}

impl RoutePolicy {
    pub fn is_public(&self) -> bool {
        matches!(self, RoutePolicy::Public)
    }

    /// Ordering used to break ties between duplicate prefixes.
    fn restrictiveness(&self) -> u8 {
        match self {
            RoutePolicy::Public => 0,
            RoutePolicy::ProtectedPage { .. } => 1,
            RoutePolicy::ProtectedApi { .. } => 2,
        }
    }
}

/// Policy class as written in the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    Public,
    ProtectedPage,
    ProtectedApi,
}

/// One row of the route table.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteRule {
    pub prefix: String,
    pub policy: PolicyKind,
    /// Match only the identical path instead of the whole subtree.
    #[serde(default)]
    pub exact: bool,
}

impl RouteRule {
    fn new(prefix: &str, policy: PolicyKind) -> Self {
        Self {
            prefix: prefix.to_string(),
            policy,
            exact: false,
        }
    }

    fn exact(prefix: &str, policy: PolicyKind) -> Self {
        Self {
            exact: true,
            ..Self::new(prefix, policy)
        }
    }
}

/// Operator-facing policy configuration, loadable from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Redirect target for unauthenticated page requests.
    #[serde(default = "default_login_path")]
    pub login_path: String,
    /// Status code for unauthenticated API requests.
    #[serde(default = "default_unauthorized_status")]
    pub unauthorized_status: u16,
    pub routes: Vec<RouteRule>,
}

fn default_login_path() -> String {
    DEFAULT_LOGIN_PATH.to_string()
}

fn default_unauthorized_status() -> u16 {
    StatusCode::UNAUTHORIZED.as_u16()
}

impl Default for PolicyConfig {
    fn default() -> Self {
        use PolicyKind::*;

        let routes = vec![
            // Static assets
            RouteRule::new("/_next/static", Public),
            RouteRule::new("/_next/image", Public),
            RouteRule::new("/static", Public),
            RouteRule::new("/favicon.ico", Public),
            RouteRule::new("/robots.txt", Public),
            RouteRule::new("/sitemap.xml", Public),
            // Marketing pages
            RouteRule::exact("/", Public),
            RouteRule::new("/pricing", Public),
            RouteRule::new("/privacy", Public),
            RouteRule::new("/terms", Public),
            RouteRule::new("/terms-of-service", Public),
            RouteRule::new("/changelog", Public),
            // Auth flow
            RouteRule::new("/login", Public),
            RouteRule::new("/register", Public),
            RouteRule::new("/signin", Public),
            RouteRule::new("/auth", Public),
            // API namespace
            RouteRule::new("/api", ProtectedApi),
            RouteRule::new("/api/health", Public),
            RouteRule::new("/api/newsletter", Public),
        ];

        Self {
            login_path: default_login_path(),
            unauthorized_status: default_unauthorized_status(),
            routes,
        }
    }
}

/// Startup-time policy validation failure.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("route prefix must start with '/': {0:?}")]
    InvalidPrefix(String),
    #[error("login path must be a local path starting with '/': {0:?}")]
    InvalidLoginPath(String),
    #[error("login path {0:?} is not classified as public")]
    LoginPathNotPublic(String),
    #[error("unauthorized status must be a 4xx or 5xx code, got {0}")]
    InvalidStatus(u16),
    #[error("failed to read policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse policy file: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
struct CompiledRule {
    prefix: String,
    exact: bool,
    policy: RoutePolicy,
}

impl CompiledRule {
    fn matches(&self, path: &str) -> bool {
        if self.exact {
            return path == self.prefix;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || self.prefix.ends_with('/'),
            None => false,
        }
    }
}

/// Validated, immutable route table.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    /// Sorted by descending prefix length so the first match is the longest.
    rules: Vec<CompiledRule>,
    default: RoutePolicy,
}

impl PolicyTable {
    /// Validate a configuration and compile it into a table.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, PolicyError> {
        if !is_local_path(&config.login_path) {
            return Err(PolicyError::InvalidLoginPath(config.login_path.clone()));
        }

        let status = StatusCode::from_u16(config.unauthorized_status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .ok_or(PolicyError::InvalidStatus(config.unauthorized_status))?;

        let page = RoutePolicy::ProtectedPage {
            redirect_to: config.login_path.clone(),
        };
        let api = RoutePolicy::ProtectedApi { status };

        let mut rules: Vec<CompiledRule> = Vec::with_capacity(config.routes.len());
        for rule in &config.routes {
            if !rule.prefix.starts_with('/') {
                return Err(PolicyError::InvalidPrefix(rule.prefix.clone()));
            }

            let policy = match rule.policy {
                PolicyKind::Public => RoutePolicy::Public,
                PolicyKind::ProtectedPage => page.clone(),
                PolicyKind::ProtectedApi => api.clone(),
            };

            // Duplicate prefixes keep the more restrictive policy
            if let Some(existing) = rules
                .iter_mut()
                .find(|r| r.prefix == rule.prefix && r.exact == rule.exact)
            {
                if policy.restrictiveness() > existing.policy.restrictiveness() {
                    existing.policy = policy;
                }
                continue;
            }

            rules.push(CompiledRule {
                prefix: rule.prefix.clone(),
                exact: rule.exact,
                policy,
            });
        }

        // An exact rule shares its path with a prefix rule of the same text, so
        // it takes the more restrictive of the two
        let subtree_policies: Vec<(String, RoutePolicy)> = rules
            .iter()
            .filter(|r| !r.exact)
            .map(|r| (r.prefix.clone(), r.policy.clone()))
            .collect();
        for rule in rules.iter_mut().filter(|r| r.exact) {
            if let Some((_, policy)) = subtree_policies.iter().find(|(p, _)| *p == rule.prefix) {
                if policy.restrictiveness() > rule.policy.restrictiveness() {
                    rule.policy = policy.clone();
                }
            }
        }

        // Longest prefix first; at equal length an exact rule is more specific
        rules.sort_by(|a, b| {
            b.prefix
                .len()
                .cmp(&a.prefix.len())
                .then_with(|| b.exact.cmp(&a.exact))
        });

        let table = Self {
            rules,
            default: page,
        };

        if !table.classify(&config.login_path).is_public() {
            return Err(PolicyError::LoginPathNotPublic(config.login_path.clone()));
        }

        Ok(table)
    }

    /// Load a table from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path)?;
        let config: PolicyConfig = serde_json::from_str(&content)?;
        Self::from_config(&config)
    }

    /// Decide which policy applies to `path`. Total and deterministic.
    pub fn classify(&self, path: &str) -> RoutePolicy {
        if has_dot_segment(path) {
            return self.default.clone();
        }

        self.rules
            .iter()
            .find(|rule| rule.matches(path))
            .map(|rule| rule.policy.clone())
            .unwrap_or_else(|| self.default.clone())
    }

    /// The page protected routes redirect to.
    pub fn login_path(&self) -> &str {
        match &self.default {
            RoutePolicy::ProtectedPage { redirect_to } => redirect_to,
            _ => DEFAULT_LOGIN_PATH,
        }
    }
}

impl Default for PolicyTable {
    fn default() -> Self {
        // The built-in configuration is covered by tests below
        Self::from_config(&PolicyConfig::default()).expect("default policy table is valid")
    }
}

fn has_dot_segment(path: &str) -> bool {
    path.split('/').any(|segment| segment == "." || segment == "..")
}

/// A same-origin absolute path (no scheme, no `//host`, no backslashes).
/// Control characters are refused since the value becomes a Location header.
pub fn is_local_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.chars().any(char::is_control)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> PolicyTable {
        PolicyTable::default()
    }

    fn page() -> RoutePolicy {
        RoutePolicy::ProtectedPage {
            redirect_to: "/login".to_string(),
        }
    }

    fn api() -> RoutePolicy {
        RoutePolicy::ProtectedApi {
            status: StatusCode::UNAUTHORIZED,
        }
    }

    #[test]
    fn test_auth_flow_paths_are_public() {
        let table = table();
        for path in [
            "/login",
            "/register",
            "/signin",
            "/auth/confirm",
            "/auth/callback",
            "/auth/auth-code-error",
        ] {
            assert_eq!(table.classify(path), RoutePolicy::Public, "{path}");
        }
    }

    #[test]
    fn test_assets_are_public() {
        let table = table();
        assert_eq!(table.classify("/_next/static/chunk.js"), RoutePolicy::Public);
        assert_eq!(table.classify("/favicon.ico"), RoutePolicy::Public);
        assert_eq!(table.classify("/robots.txt"), RoutePolicy::Public);
    }

    #[test]
    fn test_api_namespace_is_protected_api() {
        let table = table();
        assert_eq!(table.classify("/api"), api());
        assert_eq!(table.classify("/api/workspaces"), api());
        assert_eq!(table.classify("/api/scripts/abc"), api());
    }

    #[test]
    fn test_public_api_exceptions() {
        let table = table();
        assert_eq!(table.classify("/api/health"), RoutePolicy::Public);
        assert_eq!(table.classify("/api/newsletter"), RoutePolicy::Public);
    }

    #[test]
    fn test_unmatched_defaults_to_protected_page() {
        let table = table();
        assert_eq!(table.classify("/chat"), page());
        assert_eq!(table.classify("/files/123"), page());
        assert_eq!(table.classify("/you"), page());
        assert_eq!(table.classify(""), page());
    }

    #[test]
    fn test_root_is_exact() {
        let table = table();
        assert_eq!(table.classify("/"), RoutePolicy::Public);
        assert_eq!(table.classify("/anything"), page());
    }

    #[test]
    fn test_prefix_matches_on_segment_boundary() {
        let table = table();
        assert_eq!(table.classify("/login/"), RoutePolicy::Public);
        assert_eq!(table.classify("/loginx"), page());
        assert_eq!(table.classify("/apix"), page());
        assert_eq!(table.classify("/api/healthcheck"), api());
    }

    #[test]
    fn test_dot_segments_fail_closed() {
        let table = table();
        assert_eq!(table.classify("/login/../chat"), page());
        assert_eq!(table.classify("/api/health/../workspaces"), page());
        assert_eq!(table.classify("/./login"), page());
    }

    #[test]
    fn test_classify_is_deterministic() {
        let table = table();
        for path in ["/api/workspaces", "/login", "/chat", "/", "/%2e%2e"] {
            assert_eq!(table.classify(path), table.classify(path));
        }
    }

    #[test]
    fn test_duplicate_prefix_resolves_to_more_restrictive() {
        let config = PolicyConfig {
            routes: vec![
                RouteRule::new("/login", PolicyKind::Public),
                RouteRule::new("/reports", PolicyKind::Public),
                RouteRule::new("/reports", PolicyKind::ProtectedApi),
                RouteRule::new("/reports", PolicyKind::ProtectedPage),
            ],
            ..PolicyConfig::default()
        };
        let table = PolicyTable::from_config(&config).unwrap();
        assert_eq!(table.classify("/reports/q1"), api());
    }

    #[test]
    fn test_exact_rule_never_weakens_same_prefix() {
        let config = PolicyConfig {
            routes: vec![
                RouteRule::new("/login", PolicyKind::Public),
                RouteRule::exact("/reports", PolicyKind::Public),
                RouteRule::new("/reports", PolicyKind::ProtectedApi),
                RouteRule::exact("/docs", PolicyKind::ProtectedApi),
                RouteRule::new("/docs", PolicyKind::Public),
            ],
            ..PolicyConfig::default()
        };
        let table = PolicyTable::from_config(&config).unwrap();
        assert_eq!(table.classify("/reports"), api());
        assert_eq!(table.classify("/reports/q1"), api());
        // A stricter exact rule still applies only to its own path
        assert_eq!(table.classify("/docs"), api());
        assert_eq!(table.classify("/docs/intro"), RoutePolicy::Public);
    }

    #[test]
    fn test_custom_status_and_login_path() {
        let config = PolicyConfig {
            login_path: "/signin".to_string(),
            unauthorized_status: 403,
            routes: vec![
                RouteRule::new("/signin", PolicyKind::Public),
                RouteRule::new("/api", PolicyKind::ProtectedApi),
            ],
        };
        let table = PolicyTable::from_config(&config).unwrap();
        assert_eq!(
            table.classify("/api/x"),
            RoutePolicy::ProtectedApi {
                status: StatusCode::FORBIDDEN
            }
        );
        assert_eq!(
            table.classify("/chat"),
            RoutePolicy::ProtectedPage {
                redirect_to: "/signin".to_string()
            }
        );
        assert_eq!(table.login_path(), "/signin");
    }

    #[test]
    fn test_rejects_relative_prefix() {
        let config = PolicyConfig {
            routes: vec![RouteRule::new("api", PolicyKind::ProtectedApi)],
            ..PolicyConfig::default()
        };
        assert!(matches!(
            PolicyTable::from_config(&config),
            Err(PolicyError::InvalidPrefix(_))
        ));
    }

    #[test]
    fn test_rejects_non_error_status() {
        let config = PolicyConfig {
            unauthorized_status: 302,
            ..PolicyConfig::default()
        };
        assert!(matches!(
            PolicyTable::from_config(&config),
            Err(PolicyError::InvalidStatus(302))
        ));
    }

    #[test]
    fn test_rejects_protected_login_path() {
        let config = PolicyConfig {
            routes: vec![RouteRule::new("/api", PolicyKind::ProtectedApi)],
            ..PolicyConfig::default()
        };
        assert!(matches!(
            PolicyTable::from_config(&config),
            Err(PolicyError::LoginPathNotPublic(_))
        ));
    }

    #[test]
    fn test_rejects_offsite_login_path() {
        let config = PolicyConfig {
            login_path: "//evil.example/login".to_string(),
            ..PolicyConfig::default()
        };
        assert!(matches!(
            PolicyTable::from_config(&config),
            Err(PolicyError::InvalidLoginPath(_))
        ));
    }

    #[test]
    fn test_local_paths() {
        assert!(is_local_path("/"));
        assert!(is_local_path("/chat?tab=1"));
        assert!(!is_local_path("chat"));
        assert!(!is_local_path("//evil.example/"));
        assert!(!is_local_path("/\\evil.example"));
        assert!(!is_local_path("https://evil.example/"));
        assert!(!is_local_path("/a\r\nSet-Cookie: x=1"));
    }

    #[test]
    fn test_parse_json_config() {
        let json = r#"{
            "routes": [
                {"prefix": "/", "policy": "public", "exact": true},
                {"prefix": "/login", "policy": "public"},
                {"prefix": "/api", "policy": "protected_api"}
            ]
        }"#;
        let config: PolicyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.login_path, "/login");
        assert_eq!(config.unauthorized_status, 401);

        let table = PolicyTable::from_config(&config).unwrap();
        assert_eq!(table.classify("/"), RoutePolicy::Public);
        assert_eq!(table.classify("/api/workspaces"), api());
        assert_eq!(table.classify("/chat"), page());
    }
}
