//! Access-token handling.
//!
//! The provider exchanges an API key for a long-lived access token. The token
//! is held in a [`TokenCache`] owned by the client: reused until it expires or
//! an authenticated call reports it invalid, then replaced. Only complete,
//! validated token responses ever reach the cache.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

use crate::error::ProviderError;
use crate::wire;

/// An access token as issued by the provider.
/// Longest lifetime a cached token is ever given.
const MAX_TOKEN_LIFETIME: Duration = Duration::from_secs(366 * 24 * 3600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
}

#[derive(Debug)]
struct CachedToken {
    token: Token,
    expires_at: Instant,
}

/// Lifetime-bounded, thread-safe holder for the current access token.
#[derive(Debug)]
pub struct TokenCache {
    ttl: Duration,
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    /// `ttl` is the upper bound on token lifetime; an earlier expiry
    /// advertised by the provider wins.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(None),
        }
    }

    /// The cached token, if one is present and unexpired.
    pub fn get(&self) -> Option<Token> {
        let slot = self.slot.lock();
        slot.as_ref()
            .filter(|c| Instant::now() < c.expires_at)
            .map(|c| c.token.clone())
    }

    /// Return the cached token or acquire a new one with `acquire`.
    ///
    /// The lock is held while acquiring, so concurrent callers wait for a
    /// single credential exchange instead of racing their own.
    pub fn get_or_acquire<F>(&self, acquire: F) -> Result<Token, ProviderError>
    where
        F: FnOnce() -> Result<(Token, Option<Duration>), ProviderError>,
    {
        let mut slot = self.slot.lock();
        if let Some(cached) = slot.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
            log::debug!("cached access token expired");
        }

        let (token, advertised) = acquire()?;
        let lifetime = match advertised {
            Some(adv) if adv < self.ttl => adv,
            _ => self.ttl,
        }
        .min(MAX_TOKEN_LIFETIME);
        let now = Instant::now();
        let expires_at = now.checked_add(lifetime).unwrap_or(now);
        *slot = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });
        Ok(token)
    }

    /// Drop `stale` from the cache. A token that another caller already
    /// replaced is left alone.
    pub fn invalidate(&self, stale: &Token) {
        let mut slot = self.slot.lock();
        if slot.as_ref().is_some_and(|c| &c.token == stale) {
            *slot = None;
        }
    }
}

/// Extract the token and advertised lifetime from an auth response body.
/// Payload-level failure is an auth error even on HTTP 200.
pub fn parse_auth_response(body: &Value) -> Result<(Token, Option<Duration>), ProviderError> {
    if let Err((code, message)) = wire::check_envelope(body) {
        return Err(ProviderError::Auth(format!(
            "credential exchange rejected (code {code}): {message}"
        )));
    }

    let data = &body["data"];
    let access_token = data["accessToken"]
        .as_str()
        .or_else(|| data["access_token"].as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ProviderError::Auth("auth response missing accessToken".into()))?;

    let advertised = data["accessTokenExpiryDate"]
        .as_str()
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .and_then(|expiry| (expiry.with_timezone(&chrono::Utc) - chrono::Utc::now()).to_std().ok());

    Ok((
        Token {
            access_token: access_token.to_string(),
        },
        advertised,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn token(s: &str) -> Token {
        Token {
            access_token: s.into(),
        }
    }

    #[test]
    fn acquires_once_then_reuses() {
        let cache = TokenCache::new(Duration::from_secs(60));
        let mut calls = 0;
        let t1 = cache
            .get_or_acquire(|| {
                calls += 1;
                Ok((token("a"), None))
            })
            .unwrap();
        let t2 = cache
            .get_or_acquire(|| {
                calls += 1;
                Ok((token("b"), None))
            })
            .unwrap();
        assert_eq!(t1, t2);
        assert_eq!(calls, 1);
        assert_eq!(cache.get(), Some(token("a")));
    }

    #[test]
    fn expired_token_is_reacquired() {
        let cache = TokenCache::new(Duration::from_secs(60));
        cache
            .get_or_acquire(|| Ok((token("a"), Some(Duration::ZERO))))
            .unwrap();
        assert!(cache.get().is_none());
        let t = cache.get_or_acquire(|| Ok((token("b"), None))).unwrap();
        assert_eq!(t, token("b"));
    }

    #[test]
    fn oversized_ttl_is_capped_instead_of_overflowing() {
        let cache = TokenCache::new(Duration::from_secs(u64::MAX / 2));
        let t = cache.get_or_acquire(|| Ok((token("a"), None))).unwrap();
        assert_eq!(t, token("a"));
        assert_eq!(cache.get(), Some(token("a")));
    }

    #[test]
    fn invalidate_only_drops_matching_token() {
        let cache = TokenCache::new(Duration::from_secs(60));
        cache.get_or_acquire(|| Ok((token("a"), None))).unwrap();
        cache.invalidate(&token("other"));
        assert_eq!(cache.get(), Some(token("a")));
        cache.invalidate(&token("a"));
        assert!(cache.get().is_none());
    }

    #[test]
    fn failed_acquire_leaves_cache_empty() {
        let cache = TokenCache::new(Duration::from_secs(60));
        let err = cache
            .get_or_acquire(|| Err(ProviderError::Auth("nope".into())))
            .unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
        assert!(cache.get().is_none());
    }

    #[test]
    fn parse_success_with_expiry() {
        let expiry = (chrono::Utc::now() + chrono::Duration::hours(2)).to_rfc3339();
        let body = json!({
            "code": 200,
            "result": true,
            "data": { "accessToken": "tok", "accessTokenExpiryDate": expiry }
        });
        let (t, ttl) = parse_auth_response(&body).unwrap();
        assert_eq!(t.access_token, "tok");
        let ttl = ttl.unwrap();
        assert!(ttl <= Duration::from_secs(2 * 3600));
        assert!(ttl > Duration::from_secs(3600));
    }

    #[test]
    fn parse_failure_code_on_http_200() {
        let body = json!({ "code": 1600100, "result": false, "message": "Invalid API key", "data": null });
        let err = parse_auth_response(&body).unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[test]
    fn parse_missing_token() {
        let body = json!({ "code": 200, "result": true, "data": {} });
        assert!(parse_auth_response(&body).is_err());
    }
}
