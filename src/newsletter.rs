//! Beehiiv newsletter subscriptions.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

pub const BEEHIIV_API_URL: &str = "https://api.beehiiv.com/v2/";

#[derive(Debug, Error)]
pub enum NewsletterError {
    #[error("invalid newsletter endpoint: {0}")]
    Endpoint(String),
    #[error("newsletter request failed: {0}")]
    Transport(String),
    #[error("newsletter provider returned {0}")]
    Rejected(u16),
}

#[derive(Serialize)]
struct SubscriptionRequest<'a> {
    email: &'a str,
    reactivate_existing: bool,
    send_welcome_email: bool,
    utm_source: &'a str,
    utm_medium: &'a str,
}

/// Client for one Beehiiv publication.
pub struct NewsletterClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl NewsletterClient {
    /// `base` is the API root (normally [`BEEHIIV_API_URL`]).
    pub fn new(
        base: &Url,
        publication_id: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, NewsletterError> {
        if publication_id.is_empty()
            || !publication_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(NewsletterError::Endpoint(
                "publication id must be alphanumeric".into(),
            ));
        }

        let endpoint = base
            .join(&format!("publications/{}/subscriptions", publication_id))
            .map_err(|e| NewsletterError::Endpoint(e.to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NewsletterError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn subscribe(&self, email: &str) -> Result<(), NewsletterError> {
        let body = SubscriptionRequest {
            email,
            reactivate_existing: false,
            send_welcome_email: true,
            utm_source: "website",
            utm_medium: "landing_page",
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NewsletterError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Newsletter subscription rejected");
            return Err(NewsletterError::Rejected(status.as_u16()));
        }

        debug!("Newsletter subscription accepted");
        Ok(())
    }
}

/// Loose syntactic check; the newsletter provider does the real validation.
pub fn is_plausible_email(email: &str) -> bool {
    if email.len() > 254 || email.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}
