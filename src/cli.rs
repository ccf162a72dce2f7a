//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::{SessionCache, SystemClock};
use crate::db::Database;
use crate::newsletter::{BEEHIIV_API_URL, NewsletterClient, NewsletterError};
use crate::policy::{PolicyConfig, PolicyError, PolicyTable};
use crate::provider::{GoTrueProvider, IdentityProvider, JwtProvider, ProviderError};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;

const JWT_SECRET_ENV: &str = "SUPABASE_JWT_SECRET";
const BEEHIIV_API_KEY_ENV: &str = "BEEHIIV_API_KEY";

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// How session tokens are validated.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProviderKind {
    /// Ask the Supabase auth server (GoTrue) about every uncached token
    #[default]
    Gotrue,
    /// Verify HS256 access tokens locally with the project's JWT secret
    Jwt,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "Arenas",
    about = "Authenticated-request gateway for the Arenas workspace app"
)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "ARENAS_PORT", default_value = "3000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "ARENAS_DATABASE", default_value = "arenas.db")]
    pub database: String,

    /// Public URL of the site; https enables Secure cookies
    #[arg(long, env = "ARENAS_PUBLIC_URL", default_value = "http://localhost:3000")]
    pub public_url: String,

    /// Identity provider used to validate session tokens
    #[arg(long, env = "ARENAS_PROVIDER", value_enum, default_value = "gotrue")]
    pub provider: ProviderKind,

    /// Supabase project URL (e.g. "https://xyz.supabase.co")
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase anonymous API key
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub supabase_anon_key: Option<String>,

    /// Path to file containing the Supabase JWT secret. Prefer the SUPABASE_JWT_SECRET env var
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Timeout for identity and newsletter provider calls, in seconds
    #[arg(long, env = "ARENAS_PROVIDER_TIMEOUT", default_value = "5")]
    pub provider_timeout: u64,

    /// JSON route policy file; the built-in table is used when absent
    #[arg(long, env = "ARENAS_POLICY_FILE")]
    pub policy_file: Option<String>,

    /// Upper bound on how long a resolved session is cached, in seconds
    #[arg(long, env = "ARENAS_SESSION_CACHE_TTL", default_value = "60")]
    pub session_cache_ttl: u64,

    /// Maximum number of cached sessions
    #[arg(long, env = "ARENAS_SESSION_CACHE_CAPACITY", default_value = "10000")]
    pub session_cache_capacity: usize,

    /// Header carrying the client IP when behind a proxy (e.g. "x-forwarded-for")
    #[arg(long, env = "ARENAS_IP_HEADER")]
    pub ip_header: Option<String>,

    /// Beehiiv publication id; newsletter signup is disabled when absent
    #[arg(long, env = "BEEHIIV_PUBLICATION_ID")]
    pub beehiiv_publication_id: Option<String>,

    /// Path to file containing the Beehiiv API key. Prefer the BEEHIIV_API_KEY env var
    #[arg(long)]
    pub beehiiv_api_key_file: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Startup configuration failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid route policy: {0}")]
    Policy(#[from] PolicyError),
    #[error("invalid {name} URL {value:?}: {reason}")]
    Url {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("failed to read {name} from {path}: {source}")]
    SecretFile {
        name: &'static str,
        path: String,
        source: std::io::Error,
    },
    #[error("JWT secret is shorter than {} characters", MIN_JWT_SECRET_LENGTH)]
    WeakSecret,
    #[error("identity provider setup failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("newsletter setup failed: {0}")]
    Newsletter(#[from] NewsletterError),
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

/// Read a secret from `env_var` or, failing that, from `file`.
/// The environment variable is cleared once read to prevent leaking.
pub fn read_secret(
    name: &'static str,
    env_var: &str,
    file: Option<&str>,
) -> Result<Option<String>, ConfigError> {
    if let Ok(secret) = std::env::var(env_var) {
        // SAFETY: We're single-threaded at this point during startup,
        // and no other code is reading this environment variable.
        unsafe { std::env::remove_var(env_var) };
        return Ok(Some(secret.trim().to_string()));
    }

    match file {
        Some(path) => std::fs::read_to_string(path)
            .map(|content| Some(content.trim().to_string()))
            .map_err(|source| ConfigError::SecretFile {
                name,
                path: path.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Load the Supabase JWT secret from environment variable or file.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Result<String, ConfigError> {
    let secret = read_secret("JWT secret", JWT_SECRET_ENV, jwt_secret_file)?.ok_or(
        ConfigError::Missing("JWT secret (set SUPABASE_JWT_SECRET or use --jwt-secret-file)"),
    )?;

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::WeakSecret);
    }

    Ok(secret)
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::Url {
        name,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Load the route policy table from a JSON file, or use the built-in one.
pub fn load_policy(policy_file: Option<&str>) -> Result<PolicyTable, ConfigError> {
    let table = match policy_file {
        Some(path) => {
            info!(path = %path, "Loading route policy");
            PolicyTable::from_file(path)?
        }
        None => PolicyTable::from_config(&PolicyConfig::default())?,
    };
    Ok(table)
}

/// Build the identity provider selected on the command line.
pub fn build_provider(args: &Args) -> Result<Arc<dyn IdentityProvider>, ConfigError> {
    let timeout = Duration::from_secs(args.provider_timeout);

    match args.provider {
        ProviderKind::Gotrue => {
            let url = args
                .supabase_url
                .as_deref()
                .ok_or(ConfigError::Missing("--supabase-url (SUPABASE_URL)"))?;
            let url = parse_url("Supabase", url)?;
            let anon_key = args
                .supabase_anon_key
                .as_deref()
                .ok_or(ConfigError::Missing("--supabase-anon-key (SUPABASE_ANON_KEY)"))?;

            if url.scheme() != "https" && url.host_str() != Some("localhost") {
                warn!("Supabase URL is not HTTPS; session tokens will travel in the clear");
            }

            info!(url = %url, "Validating sessions with GoTrue");
            Ok(Arc::new(GoTrueProvider::new(&url, anon_key, timeout)?))
        }
        ProviderKind::Jwt => {
            let secret = load_jwt_secret(args.jwt_secret_file.as_deref())?;
            info!("Validating sessions locally with the JWT secret");
            Ok(Arc::new(JwtProvider::new(secret.as_bytes())))
        }
    }
}

/// Build the newsletter client, if a publication is configured.
pub fn build_newsletter(args: &Args) -> Result<Option<Arc<NewsletterClient>>, ConfigError> {
    let Some(publication_id) = args.beehiiv_publication_id.as_deref() else {
        info!("Newsletter signup disabled");
        return Ok(None);
    };

    let api_key = read_secret(
        "Beehiiv API key",
        BEEHIIV_API_KEY_ENV,
        args.beehiiv_api_key_file.as_deref(),
    )?
    .ok_or(ConfigError::Missing(
        "Beehiiv API key (set BEEHIIV_API_KEY or use --beehiiv-api-key-file)",
    ))?;

    let base = parse_url("Beehiiv", BEEHIIV_API_URL)?;
    let client = NewsletterClient::new(
        &base,
        publication_id,
        api_key,
        Duration::from_secs(args.provider_timeout),
    )?;
    Ok(Some(Arc::new(client)))
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database) -> Result<ServerConfig, ConfigError> {
    let public_url = parse_url("public", &args.public_url)?;
    let secure_cookies = public_url.scheme() == "https";
    if !secure_cookies {
        warn!("Public URL is not HTTPS; session cookies will not be marked Secure");
    }

    Ok(ServerConfig {
        db,
        provider: build_provider(args)?,
        policy: load_policy(args.policy_file.as_deref())?,
        cache: SessionCache::new(args.session_cache_capacity),
        clock: Arc::new(SystemClock),
        cache_ttl: args.session_cache_ttl,
        secure_cookies,
        ip_header: args.ip_header.clone(),
        newsletter: build_newsletter(args)?,
    })
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}
