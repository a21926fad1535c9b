use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ProviderError;

pub const DEFAULT_BASE_URL: &str = "https://developers.cjdropshipping.com/api2.0/v1";

/// Upper bound on concurrent requests, whatever the config says.
pub const MAX_WORKERS: usize = 8;

/// Longest configurable token lifetime (one year).
pub const MAX_TOKEN_TTL_HOURS: u64 = 24 * 366;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// `[provider]` section of `ordercheck.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub page_size: u32,
    /// Hard ceiling on pages per listing query.
    pub max_pages: u32,
    /// Minimum gap between consecutive requests, across all workers.
    pub page_delay_ms: u64,
    pub max_retries: u32,
    /// First retry delay; doubles on every further attempt.
    pub retry_backoff_ms: u64,
    pub request_timeout_secs: u64,
    /// Token lifetime when the provider does not advertise one.
    pub token_ttl_hours: u64,
    pub workers: usize,
    pub detail_policy: DetailPolicy,
    /// Header carrying the access token on authenticated calls.
    pub token_header: String,
    /// JSON body field the API key is sent in on the auth call.
    pub credential_field: String,
    /// Payload `code` values that mean "token invalid or expired".
    pub invalid_token_codes: Vec<i64>,
    pub endpoints: Endpoints,
    pub params: ParamNames,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            page_size: 50,
            max_pages: 100,
            page_delay_ms: 300,
            max_retries: 3,
            retry_backoff_ms: 1000,
            request_timeout_secs: 30,
            token_ttl_hours: 360,
            workers: 4,
            detail_policy: DetailPolicy::Auto,
            token_header: "CJ-Access-Token".to_string(),
            credential_field: "apiKey".to_string(),
            invalid_token_codes: vec![1600001],
            endpoints: Endpoints::default(),
            params: ParamNames::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Endpoints + query parameter names
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub auth: String,
    pub list: String,
    pub detail: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth: "/authentication/getAccessToken".to_string(),
            list: "/shopping/order/list".to_string(),
            detail: "/shopping/order/getOrderDetail".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParamNames {
    pub page: String,
    pub page_size: String,
    pub identifier: String,
    pub date_from: String,
    pub date_to: String,
    pub detail_id: String,
}

impl Default for ParamNames {
    fn default() -> Self {
        Self {
            page: "pageNum".to_string(),
            page_size: "pageSize".to_string(),
            identifier: "orderNum".to_string(),
            date_from: "createTimeFrom".to_string(),
            date_to: "createTimeTo".to_string(),
            detail_id: "orderId".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Detail policy
// ---------------------------------------------------------------------------

/// When to call the detail endpoint for a listed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailPolicy {
    /// Only when the listing lacks computable quantities.
    Auto,
    Always,
    Never,
}

impl Default for DetailPolicy {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::fmt::Display for DetailPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Always => write!(f, "always"),
            Self::Never => write!(f, "never"),
        }
    }
}

impl FromStr for DetailPolicy {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            other => Err(ProviderError::Config(format!(
                "detail policy must be auto, always or never, got '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Validate + derived values
// ---------------------------------------------------------------------------

impl ProviderConfig {
    pub fn validate(&self) -> Result<(), ProviderError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ProviderError::Config(format!(
                "base_url must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.page_size == 0 {
            return Err(ProviderError::Config("page_size must be at least 1".into()));
        }
        if self.max_pages == 0 {
            return Err(ProviderError::Config("max_pages must be at least 1".into()));
        }
        if self.request_timeout_secs == 0 {
            return Err(ProviderError::Config(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.token_ttl_hours == 0 || self.token_ttl_hours > MAX_TOKEN_TTL_HOURS {
            return Err(ProviderError::Config(format!(
                "token_ttl_hours must be between 1 and {MAX_TOKEN_TTL_HOURS}, got {}",
                self.token_ttl_hours
            )));
        }
        if self.token_header.trim().is_empty() {
            return Err(ProviderError::Config("token_header must not be empty".into()));
        }
        if self.credential_field.trim().is_empty() {
            return Err(ProviderError::Config("credential_field must not be empty".into()));
        }
        Ok(())
    }

    /// Join an endpoint path onto the base URL with exactly one slash.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Configured worker count clamped to `1..=MAX_WORKERS`.
    pub fn worker_count(&self) -> usize {
        self.workers.clamp(1, MAX_WORKERS)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_hours.saturating_mul(3600))
    }
}
