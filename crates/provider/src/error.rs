/// Error type for provider operations.
#[derive(Debug)]
pub enum ProviderError {
    /// Credential exchange rejected, or the token stayed invalid after one re-authentication
    Auth(String),
    /// Network error or retryable status that outlasted every retry
    Fetch(String),
    /// Non-retryable HTTP error with status code
    Http(u16, String),
    /// Response decoded but the payload reports failure
    Api { code: i64, message: String },
    /// Body was not JSON, or lacked the expected shape
    Parse(String),
    /// Detail enrichment failed for one order
    DetailFetch { order_id: String, reason: String },
    /// Run cancelled before the request was sent
    Cancelled,
    /// Invalid client configuration
    Config(String),
}

impl ProviderError {
    /// Errors that must abort the whole run rather than degrade one page or order.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Cancelled | Self::Config(_))
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "authentication failed: {}", msg),
            ProviderError::Fetch(msg) => write!(f, "fetch failed: {}", msg),
            ProviderError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            ProviderError::Api { code, message } => {
                write!(f, "provider error {}: {}", code, message)
            }
            ProviderError::Parse(msg) => write!(f, "parse error: {}", msg),
            ProviderError::DetailFetch { order_id, reason } => {
                write!(f, "detail fetch for order {} failed: {}", order_id, reason)
            }
            ProviderError::Cancelled => write!(f, "cancelled"),
            ProviderError::Config(msg) => write!(f, "invalid provider config: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}
