//! Client configuration.
//!
//! `ClientConfig` carries everything needed to address one Zendesk tenant:
//! the subdomain, API version, credentials, transport timeout and retry
//! policy. It can be assembled in code with the `with_*` methods or read
//! from `ZENDESK_*` environment variables.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::ApiError;
use crate::retry::RetryPolicy;

pub const DEFAULT_API_VERSION: &str = "v2";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How requests authenticate against the tenant.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Basic auth as `{email}/token:{token}`.
    ApiToken { email: String, token: String },
    /// Basic auth as `{email}:{password}`.
    Password { email: String, password: String },
    /// OAuth access token.
    Bearer(String),
}

impl Credentials {
    /// Value of the `authorization` header.
    pub fn header_value(&self) -> String {
        match self {
            Credentials::ApiToken { email, token } => {
                format!("Basic {}", STANDARD.encode(format!("{email}/token:{token}")))
            }
            Credentials::Password { email, password } => {
                format!("Basic {}", STANDARD.encode(format!("{email}:{password}")))
            }
            Credentials::Bearer(token) => format!("Bearer {token}"),
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::ApiToken { email, .. } => f
                .debug_struct("ApiToken")
                .field("email", email)
                .finish_non_exhaustive(),
            Credentials::Password { email, .. } => f
                .debug_struct("Password")
                .field("email", email)
                .finish_non_exhaustive(),
            Credentials::Bearer(_) => f.write_str("Bearer(..)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Tenant subdomain, e.g. `acme` for `acme.zendesk.com`.
    pub domain: String,
    pub api_version: String,
    /// Scheme and host to use instead of `https://{domain}.zendesk.com`.
    pub base_url: Option<String>,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            base_url: None,
            credentials: None,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    /// Read configuration from the process environment.
    ///
    /// `ZENDESK_DOMAIN` is required. `ZENDESK_EMAIL` + `ZENDESK_API_TOKEN`
    /// select token auth; otherwise `ZENDESK_OAUTH_TOKEN` selects bearer auth.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let domain = lookup("ZENDESK_DOMAIN")
            .filter(|d| !d.is_empty())
            .ok_or(ApiError::MissingConfig("ZENDESK_DOMAIN"))?;
        let mut config = Self::new(domain);

        if let Some(version) = lookup("ZENDESK_API_VERSION") {
            config.api_version = version;
        }
        config.base_url = lookup("ZENDESK_BASE_URL");
        config.credentials = match (lookup("ZENDESK_EMAIL"), lookup("ZENDESK_API_TOKEN")) {
            (Some(email), Some(token)) => Some(Credentials::ApiToken { email, token }),
            (None, Some(_)) => return Err(ApiError::MissingConfig("ZENDESK_EMAIL")),
            (Some(_), None) => match lookup("ZENDESK_OAUTH_TOKEN") {
                Some(token) => Some(Credentials::Bearer(token)),
                None => return Err(ApiError::MissingConfig("ZENDESK_API_TOKEN")),
            },
            (None, None) => lookup("ZENDESK_OAUTH_TOKEN").map(Credentials::Bearer),
        };
        Ok(config)
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Scheme and host every endpoint URL starts with.
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("https://{}.zendesk.com", self.domain),
        }
    }
}
