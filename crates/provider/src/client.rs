//! Fulfillment provider HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). Covers the full
//! retrieval flow: credential exchange → paged order listing (optionally one
//! query per merchant identifier) → per-order detail enrichment.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;
use ordercheck_recon::ident::normalize;
use ordercheck_recon::model::ProviderOrder;
use serde_json::Value;

use crate::auth::{self, Token, TokenCache};
use crate::config::{DetailPolicy, ProviderConfig};
use crate::error::ProviderError;
use crate::pool::{run_bounded, Pacer};
use crate::wire::{self, OrderDetail};

const USER_AGENT: &str = concat!("ordercheck/", env!("CARGO_PKG_VERSION"));

/// Which orders to list.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Inclusive creation-date range.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Merchant identifiers; one paged query per distinct normalized id.
    pub identifiers: Option<Vec<String>>,
}

/// Orders gathered by `list_orders`, plus what could not be gathered.
#[derive(Debug, Clone, Default)]
pub struct OrderListing {
    pub orders: Vec<ProviderOrder>,
    pub pages_fetched: u32,
    /// One entry per query that stopped early (failed page, page ceiling).
    pub warnings: Vec<String>,
    /// Normalized identifiers whose query failed before returning any order.
    pub failed_identifiers: Vec<String>,
}

impl OrderListing {
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }

    fn absorb(&mut self, other: OrderListing) {
        self.orders.extend(other.orders);
        self.pages_fetched += other.pages_fetched;
        self.warnings.extend(other.warnings);
        self.failed_identifiers.extend(other.failed_identifiers);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichOutcome {
    pub requested: usize,
    pub enriched: usize,
    pub failed: usize,
}

/// Outcome of one authenticated call, before token handling.
enum CallError {
    /// HTTP 401/403 or a configured invalid-token payload code.
    TokenRejected(String),
    Failed(ProviderError),
}

impl From<ProviderError> for CallError {
    fn from(e: ProviderError) -> Self {
        CallError::Failed(e)
    }
}

/// Fulfillment provider API client (blocking).
pub struct ProviderClient {
    http: reqwest::blocking::Client,
    config: ProviderConfig,
    api_key: String,
    tokens: TokenCache,
    pacer: Pacer,
    cancel: Arc<AtomicBool>,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        config.validate()?;
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::Config("API key is empty".into()));
        }

        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ProviderError::Config(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            tokens: TokenCache::new(config.token_ttl()),
            pacer: Pacer::new(config.page_delay()),
            cancel: Arc::new(AtomicBool::new(false)),
            api_key,
            config,
        })
    }

    /// Share an externally owned cancel flag (e.g. set from a signal handler).
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Setting the returned flag makes every later request fail with `Cancelled`.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    // ── Authentication ──────────────────────────────────────────────

    /// Return the cached access token, exchanging credentials if none is valid.
    pub fn authenticate(&self) -> Result<Token, ProviderError> {
        self.tokens.get_or_acquire(|| self.exchange_credentials())
    }

    fn exchange_credentials(&self) -> Result<(Token, Option<Duration>), ProviderError> {
        let url = self.config.url(&self.config.endpoints.auth);
        let mut payload = serde_json::Map::new();
        payload.insert(
            self.config.credential_field.clone(),
            Value::String(self.api_key.clone()),
        );
        let payload = Value::Object(payload);

        log::info!("exchanging credentials at {url}");
        match self.send_with_retry(|http| http.post(&url).json(&payload)) {
            Ok(body) => auth::parse_auth_response(&body),
            Err(CallError::TokenRejected(reason)) => {
                Err(ProviderError::Auth(format!("credentials rejected ({reason})")))
            }
            Err(CallError::Failed(e)) if e.is_fatal() => Err(e),
            Err(CallError::Failed(e)) => {
                Err(ProviderError::Auth(format!("credential exchange failed: {e}")))
            }
        }
    }

    // ── Listing ─────────────────────────────────────────────────────

    /// List orders matching `filter`.
    ///
    /// A failing page stops its query and keeps what earlier pages returned;
    /// a failing identifier query affects only that identifier. Only fatal
    /// errors (auth, cancellation) abort.
    pub fn list_orders(&self, filter: &OrderFilter) -> Result<OrderListing, ProviderError> {
        let p = &self.config.params;
        let mut base: Vec<(String, String)> = Vec::new();
        if let Some((from, to)) = filter.date_range {
            base.push((p.date_from.clone(), format!("{} 00:00:00", from.format("%Y-%m-%d"))));
            base.push((p.date_to.clone(), format!("{} 23:59:59", to.format("%Y-%m-%d"))));
        }

        let Some(identifiers) = &filter.identifiers else {
            return self.list_pages(&base, "orders");
        };

        let mut seen = HashSet::new();
        let unique: Vec<String> = identifiers
            .iter()
            .map(|id| normalize(id))
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect();

        log::info!(
            "listing orders for {} identifiers on {} workers",
            unique.len(),
            self.config.worker_count()
        );

        let halted = AtomicBool::new(false);
        let results = run_bounded(&unique, self.config.worker_count(), |id| {
            if halted.load(Ordering::Relaxed) {
                return None;
            }
            let mut params = base.clone();
            params.push((p.identifier.clone(), id.clone()));
            let result = self.list_pages(&params, &format!("order {id}"));
            if result.is_err() {
                halted.store(true, Ordering::Relaxed);
            }
            Some(result)
        });

        let mut listing = OrderListing::default();
        let mut fatal = None;
        for (id, result) in unique.iter().zip(results) {
            match result {
                None => {}
                Some(Ok(mut part)) => {
                    if part.orders.is_empty() && !part.warnings.is_empty() {
                        part.failed_identifiers.push(id.clone());
                    }
                    listing.absorb(part);
                }
                Some(Err(e)) => {
                    fatal.get_or_insert(e);
                }
            }
        }
        match fatal {
            Some(e) => Err(e),
            None => Ok(listing),
        }
    }

    /// Page through one listing query. Non-fatal failures end the query and
    /// are recorded as warnings; fatal ones are returned.
    fn list_pages(&self, filter: &[(String, String)], label: &str) -> Result<OrderListing, ProviderError> {
        let url = self.config.url(&self.config.endpoints.list);
        let p = &self.config.params;
        let mut listing = OrderListing::default();

        for page in 1..=self.config.max_pages {
            let mut params = filter.to_vec();
            params.push((p.page.clone(), page.to_string()));
            params.push((p.page_size.clone(), self.config.page_size.to_string()));

            let (record_count, orders) = match self.fetch_page(&url, &params, label) {
                Ok(page_result) => page_result,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::warn!(
                        "{label}: page {page} failed, keeping {} orders from earlier pages: {e}",
                        listing.orders.len()
                    );
                    listing.warnings.push(format!("{label}: page {page}: {e}"));
                    return Ok(listing);
                }
            };

            if record_count == 0 {
                return Ok(listing);
            }
            log::debug!("{label}: page {page}: {record_count} records");
            listing.pages_fetched += 1;
            listing.orders.extend(orders);
        }

        log::warn!(
            "{label}: reached the {}-page ceiling, later orders were not fetched",
            self.config.max_pages
        );
        listing.warnings.push(format!(
            "{label}: stopped at the {}-page ceiling",
            self.config.max_pages
        ));
        Ok(listing)
    }

    fn fetch_page(
        &self,
        url: &str,
        params: &[(String, String)],
        label: &str,
    ) -> Result<(usize, Vec<ProviderOrder>), ProviderError> {
        let body = self.get_json(url, params)?;
        let records = wire::order_records(&body).map_err(ProviderError::Parse)?;
        let orders = records
            .iter()
            .filter_map(|rec| match wire::parse_order(rec) {
                Ok(order) => Some(order),
                Err(msg) => {
                    log::warn!("{label}: skipping malformed order record: {msg}");
                    None
                }
            })
            .collect();
        Ok((records.len(), orders))
    }

    // ── Detail ──────────────────────────────────────────────────────

    pub fn get_order_detail(&self, provider_order_id: &str) -> Result<OrderDetail, ProviderError> {
        let url = self.config.url(&self.config.endpoints.detail);
        let params = vec![(self.config.params.detail_id.clone(), provider_order_id.to_string())];

        let detail_error = |reason: String| ProviderError::DetailFetch {
            order_id: provider_order_id.to_string(),
            reason,
        };

        let body = match self.get_json(&url, &params) {
            Ok(body) => body,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => return Err(detail_error(e.to_string())),
        };
        wire::parse_detail(&body).map_err(detail_error)
    }

    /// Replace listing line items with detail line items according to
    /// `policy`. Orders whose detail fetch fails get `detail_error` set and
    /// keep their listing data.
    ///
    /// With `wanted`, only orders whose normalized merchant identifier is in
    /// the set are considered. Later records repeating an identifier are
    /// never fetched, since reconciliation keeps the first one.
    pub fn enrich_orders(
        &self,
        orders: &mut [ProviderOrder],
        policy: DetailPolicy,
        wanted: Option<&HashSet<String>>,
    ) -> Result<EnrichOutcome, ProviderError> {
        let mut seen = HashSet::new();
        let targets: Vec<(usize, String)> = orders
            .iter()
            .enumerate()
            .filter(|(_, o)| {
                let key = o.external_reference_id.as_deref().map(normalize).unwrap_or_default();
                if let Some(wanted) = wanted {
                    if !wanted.contains(&key) {
                        return false;
                    }
                }
                key.is_empty() || seen.insert(key)
            })
            .filter(|(_, o)| match policy {
                DetailPolicy::Never => false,
                DetailPolicy::Always => true,
                DetailPolicy::Auto => !wire::has_computable_quantities(o),
            })
            .map(|(i, o)| (i, o.provider_order_id.clone()))
            .collect();

        let mut outcome = EnrichOutcome {
            requested: targets.len(),
            ..EnrichOutcome::default()
        };
        if targets.is_empty() {
            return Ok(outcome);
        }
        log::info!("fetching detail for {} orders (policy {policy})", targets.len());

        let halted = AtomicBool::new(false);
        let results = run_bounded(&targets, self.config.worker_count(), |(_, id)| {
            if halted.load(Ordering::Relaxed) {
                return None;
            }
            let result = self.get_order_detail(id);
            if matches!(&result, Err(e) if e.is_fatal()) {
                halted.store(true, Ordering::Relaxed);
            }
            Some(result)
        });

        let mut fatal = None;
        for ((idx, id), result) in targets.iter().zip(results) {
            match result {
                None => {}
                Some(Ok(detail)) => {
                    let order = &mut orders[*idx];
                    if let Some(amount) = detail.order_amount {
                        if amount != order.order_amount {
                            log::debug!(
                                "order {id}: detail amount {amount} differs from listing {}, keeping listing",
                                order.order_amount
                            );
                        }
                    }
                    order.line_items = detail.line_items;
                    outcome.enriched += 1;
                }
                Some(Err(e)) if e.is_fatal() => {
                    fatal.get_or_insert(e);
                }
                Some(Err(e)) => {
                    log::warn!("{e}");
                    orders[*idx].detail_error = Some(e.to_string());
                    outcome.failed += 1;
                }
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(outcome),
        }
    }

    // ── HTTP plumbing ───────────────────────────────────────────────

    /// Authenticated GET. On a rejected token the cache is invalidated and
    /// the call is repeated exactly once with a fresh token.
    fn get_json(&self, url: &str, params: &[(String, String)]) -> Result<Value, ProviderError> {
        let token = self.authenticate()?;
        match self.call(url, params, &token) {
            Err(CallError::TokenRejected(reason)) => {
                log::info!("access token rejected ({reason}), re-authenticating");
                self.tokens.invalidate(&token);
                let fresh = self.authenticate()?;
                match self.call(url, params, &fresh) {
                    Ok(body) => Ok(body),
                    Err(CallError::TokenRejected(reason)) => Err(ProviderError::Auth(format!(
                        "token rejected again after re-authentication ({reason})"
                    ))),
                    Err(CallError::Failed(e)) => Err(e),
                }
            }
            Err(CallError::Failed(e)) => Err(e),
            Ok(body) => Ok(body),
        }
    }

    fn call(&self, url: &str, params: &[(String, String)], token: &Token) -> Result<Value, CallError> {
        log::debug!("GET {url} {params:?}");
        let body = self.send_with_retry(|http| {
            http.get(url)
                .header(self.config.token_header.as_str(), token.access_token.as_str())
                .query(params)
        })?;

        if let Some(code) = wire::payload_code(&body) {
            if self.config.invalid_token_codes.contains(&code) {
                return Err(CallError::TokenRejected(format!("payload code {code}")));
            }
        }
        if let Err((code, message)) = wire::check_envelope(&body) {
            return Err(CallError::Failed(ProviderError::Api { code, message }));
        }
        Ok(body)
    }

    fn check_cancelled(&self) -> Result<(), ProviderError> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(ProviderError::Cancelled);
        }
        Ok(())
    }

    /// Send with retry + exponential backoff.
    ///
    /// `build_request` is called once per attempt. Transport errors, 5xx and
    /// 429 are retried (429 honours `Retry-After`); 401/403 return
    /// `TokenRejected` immediately; other 4xx fail immediately.
    fn send_with_retry(
        &self,
        build_request: impl Fn(&reqwest::blocking::Client) -> reqwest::blocking::RequestBuilder,
    ) -> Result<Value, CallError> {
        let max_retries = self.config.max_retries;
        let mut backoff = self.config.retry_backoff();

        for attempt in 0..=max_retries {
            self.check_cancelled()?;
            self.pacer.wait();

            let resp = match build_request(&self.http).send() {
                Ok(resp) => resp,
                Err(e) => {
                    if attempt == max_retries {
                        return Err(ProviderError::Fetch(format!(
                            "network error after {} attempts: {e}",
                            attempt + 1
                        ))
                        .into());
                    }
                    log::warn!(
                        "retry {}/{} in {}ms ({e})",
                        attempt + 1,
                        max_retries,
                        backoff.as_millis()
                    );
                    thread::sleep(backoff);
                    backoff = backoff.saturating_mul(2);
                    continue;
                }
            };

            let status = resp.status().as_u16();

            if status == 401 || status == 403 {
                return Err(CallError::TokenRejected(format!("HTTP {status}")));
            }

            if status == 429 || status >= 500 {
                if attempt == max_retries {
                    return Err(ProviderError::Fetch(format!(
                        "HTTP {status} after {} attempts",
                        attempt + 1
                    ))
                    .into());
                }
                let wait = if status == 429 {
                    resp.headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .unwrap_or(backoff)
                } else {
                    backoff
                };
                log::warn!(
                    "retry {}/{} in {}ms (HTTP {status})",
                    attempt + 1,
                    max_retries,
                    wait.as_millis()
                );
                thread::sleep(wait);
                backoff = backoff.saturating_mul(2);
                continue;
            }

            // Read as text first: some gateways prefix a BOM
            let text = resp
                .text()
                .map_err(|e| ProviderError::Fetch(format!("failed to read response body: {e}")))?;
            let trimmed = text.trim_start_matches('\u{feff}');

            if status >= 400 {
                return Err(ProviderError::Http(status, error_message(trimmed)).into());
            }

            let body: Value = serde_json::from_str(trimmed).map_err(|e| {
                ProviderError::Parse(format!("invalid JSON response: {e} (body: {})", snippet(trimmed)))
            })?;
            return Ok(body);
        }

        Err(ProviderError::Fetch("retry budget exhausted".into()).into())
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}

fn error_message(text: &str) -> String {
    serde_json::from_str::<Value>(text)
        .ok()
        .and_then(|v| v["message"].as_str().map(String::from))
        .unwrap_or_else(|| snippet(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    const AUTH_PATH: &str = "/authentication/getAccessToken";
    const LIST_PATH: &str = "/shopping/order/list";
    const DETAIL_PATH: &str = "/shopping/order/getOrderDetail";

    fn test_config(server: &MockServer) -> ProviderConfig {
        ProviderConfig {
            base_url: server.base_url(),
            page_delay_ms: 0,
            retry_backoff_ms: 1,
            max_retries: 2,
            workers: 2,
            ..ProviderConfig::default()
        }
    }

    fn client(server: &MockServer) -> ProviderClient {
        ProviderClient::new(test_config(server), "secret-key").unwrap()
    }

    fn mock_auth<'a>(server: &'a MockServer, token: &str) -> httpmock::Mock<'a> {
        let token = token.to_string();
        server.mock(move |when, then| {
            when.method(POST)
                .path(AUTH_PATH)
                .json_body(json!({ "apiKey": "secret-key" }));
            then.status(200).json_body(json!({
                "code": 200,
                "result": true,
                "message": "Success",
                "data": { "accessToken": token }
            }));
        })
    }

    fn order_json(provider_id: &str, reference: &str, amount: &str, qty: u32) -> Value {
        json!({
            "orderId": provider_id,
            "orderNum": reference,
            "orderAmount": amount,
            "productList": [{ "productName": "Mug", "quantity": qty }]
        })
    }

    fn page(orders: Vec<Value>) -> Value {
        json!({ "code": 200, "result": true, "data": { "pageNum": 1, "list": orders } })
    }

    // ── Authentication ─────────────────────────────────────────────

    #[test]
    fn token_is_cached_across_calls() {
        let server = MockServer::start();
        let auth_mock = mock_auth(&server, "tok1");

        let c = client(&server);
        let t1 = c.authenticate().unwrap();
        let t2 = c.authenticate().unwrap();

        assert_eq!(t1.access_token, "tok1");
        assert_eq!(t1, t2);
        auth_mock.assert_calls(1);
    }

    #[test]
    fn payload_failure_on_http_200_is_auth_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path(AUTH_PATH);
            then.status(200).json_body(json!({
                "code": 1600100,
                "result": false,
                "message": "apiKey is invalid",
                "data": null
            }));
        });

        let err = client(&server).authenticate().unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)), "got {err}");
        assert!(err.to_string().contains("apiKey is invalid"));
    }

    #[test]
    fn http_401_on_auth_is_auth_error() {
        let server = MockServer::start();
        let auth_mock = server.mock(|when, then| {
            when.method(POST).path(AUTH_PATH);
            then.status(401).body("unauthorized");
        });

        let err = client(&server).authenticate().unwrap_err();
        assert!(matches!(err, ProviderError::Auth(_)));
        auth_mock.assert_calls(1);
    }

    #[test]
    fn invalid_token_code_triggers_single_reauth() {
        let server = MockServer::start();
        let mut first_auth = mock_auth(&server, "tok1");
        let c = client(&server);
        c.authenticate().unwrap();
        first_auth.delete();
        let second_auth = mock_auth(&server, "tok2");

        let stale = server.mock(|when, then| {
            when.method(GET).path(LIST_PATH).header("CJ-Access-Token", "tok1");
            then.status(200).json_body(json!({
                "code": 1600001,
                "result": false,
                "message": "Invalid token",
                "data": null
            }));
        });
        let fresh_page1 = server.mock(|when, then| {
            when.method(GET)
                .path(LIST_PATH)
                .header("CJ-Access-Token", "tok2")
                .query_param("pageNum", "1");
            then.status(200)
                .json_body(page(vec![order_json("CJ1", "#1001", "20.00", 2)]));
        });
        let fresh_page2 = server.mock(|when, then| {
            when.method(GET)
                .path(LIST_PATH)
                .header("CJ-Access-Token", "tok2")
                .query_param("pageNum", "2");
            then.status(200).json_body(page(vec![]));
        });

        let listing = c.list_orders(&OrderFilter::default()).unwrap();

        stale.assert_calls(1);
        second_auth.assert_calls(1);
        fresh_page1.assert_calls(1);
        fresh_page2.assert_calls(1);
        assert_eq!(listing.orders.len(), 1);
        assert!(listing.is_complete());
    }

    #[test]
    fn persistent_401_surfaces_auth_error_after_one_reauth() {
        let server = MockServer::start();
        let auth_mock = mock_auth(&server, "tok");
        let list_mock = server.mock(|when, then| {
            when.method(GET).path(LIST_PATH);
            then.status(401).body("expired");
        });

        let err = client(&server).list_orders(&OrderFilter::default()).unwrap_err();

        assert!(matches!(err, ProviderError::Auth(_)), "got {err}");
        auth_mock.assert_calls(2);
        list_mock.assert_calls(2);
    }

    // ── Listing ────────────────────────────────────────────────────

    #[test]
    fn paginates_until_empty_page() {
        let server = MockServer::start();
        mock_auth(&server, "tok");
        let p1 = server.mock(|when, then| {
            when.method(GET)
                .path(LIST_PATH)
                .query_param("pageNum", "1")
                .query_param("pageSize", "50");
            then.status(200).json_body(page(vec![
                order_json("CJ1", "#1001", "20.00", 2),
                order_json("CJ2", "#1002", "5.50", 1),
            ]));
        });
        let p2 = server.mock(|when, then| {
            when.method(GET).path(LIST_PATH).query_param("pageNum", "2");
            then.status(200)
                .json_body(page(vec![order_json("CJ3", "#1003", "7", 3)]));
        });
        let p3 = server.mock(|when, then| {
            when.method(GET).path(LIST_PATH).query_param("pageNum", "3");
            then.status(200).json_body(page(vec![]));
        });

        let listing = client(&server).list_orders(&OrderFilter::default()).unwrap();

        p1.assert();
        p2.assert();
        p3.assert();
        assert_eq!(listing.pages_fetched, 2);
        assert_eq!(listing.orders.len(), 3);
        assert_eq!(listing.orders[0].external_reference_id.as_deref(), Some("1001"));
        assert_eq!(listing.orders[2].order_amount, dec!(7));
        assert!(listing.is_complete());
    }

    #[test]
    fn failing_page_keeps_earlier_pages() {
        let server = MockServer::start();
        mock_auth(&server, "tok");
        server.mock(|when, then| {
            when.method(GET).path(LIST_PATH).query_param("pageNum", "1");
            then.status(200)
                .json_body(page(vec![order_json("CJ1", "1", "1", 1)]));
        });
        server.mock(|when, then| {
            when.method(GET).path(LIST_PATH).query_param("pageNum", "2");
            then.status(200)
                .json_body(page(vec![order_json("CJ2", "2", "1", 1)]));
        });
        let p3 = server.mock(|when, then| {
            when.method(GET).path(LIST_PATH).query_param("pageNum", "3");
            then.status(503).body("unavailable");
        });

        let listing = client(&server).list_orders(&OrderFilter::default()).unwrap();

        // max_retries = 2 → three attempts
        p3.assert_calls(3);
        assert_eq!(listing.orders.len(), 2);
        assert_eq!(listing.pages_fetched, 2);
        assert_eq!(listing.warnings.len(), 1);
        assert!(listing.warnings[0].contains("page 3"));
    }

    #[test]
    fn payload_failure_page_stops_without_retry() {
        let server = MockServer::start();
        mock_auth(&server, "tok");
        let p1 = server.mock(|when, then| {
            when.method(GET).path(LIST_PATH).query_param("pageNum", "1");
            then.status(200).json_body(json!({ "code": 1603000, "result": false, "message": "busy" }));
        });

        let listing = client(&server).list_orders(&OrderFilter::default()).unwrap();

        p1.assert_calls(1);
        assert!(listing.orders.is_empty());
        assert!(listing.warnings[0].contains("busy"));
    }

    #[test]
    fn malformed_json_is_a_page_failure() {
        let server = MockServer::start();
        mock_auth(&server, "tok");
        server.mock(|when, then| {
            when.method(GET).path(LIST_PATH);
            then.status(200).body("<html>gateway</html>");
        });

        let listing = client(&server).list_orders(&OrderFilter::default()).unwrap();
        assert!(listing.orders.is_empty());
        assert!(!listing.is_complete());
    }

    #[test]
    fn rate_limit_honours_retry_after_then_gives_up() {
        let server = MockServer::start();
        mock_auth(&server, "tok");
        let limited = server.mock(|when, then| {
            when.method(GET).path(LIST_PATH);
            then.status(429).header("Retry-After", "0").body("slow down");
        });

        let listing = client(&server).list_orders(&OrderFilter::default()).unwrap();
        limited.assert_calls(3);
        assert!(listing.warnings[0].contains("429"));
    }

    #[test]
    fn page_ceiling_stops_paging() {
        let server = MockServer::start();
        mock_auth(&server, "tok");
        let list_mock = server.mock(|when, then| {
            when.method(GET).path(LIST_PATH);
            then.status(200)
                .json_body(page(vec![order_json("CJ1", "1", "1", 1)]));
        });

        let config = ProviderConfig {
            max_pages: 2,
            ..test_config(&server)
        };
        let c = ProviderClient::new(config, "secret-key").unwrap();
        let listing = c.list_orders(&OrderFilter::default()).unwrap();

        list_mock.assert_calls(2);
        assert_eq!(listing.pages_fetched, 2);
        assert!(listing.warnings[0].contains("ceiling"));
    }

    #[test]
    fn date_range_is_sent() {
        let server = MockServer::start();
        mock_auth(&server, "tok");
        let list_mock = server.mock(|when, then| {
            when.method(GET)
                .path(LIST_PATH)
                .query_param("createTimeFrom", "2026-01-01 00:00:00")
                .query_param("createTimeTo", "2026-01-31 23:59:59");
            then.status(200).json_body(page(vec![]));
        });

        let filter = OrderFilter {
            date_range: Some((
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            )),
            identifiers: None,
        };
        client(&server).list_orders(&filter).unwrap();
        list_mock.assert_calls(1);
    }

    #[test]
    fn identifier_filter_fans_out_per_distinct_id() {
        let server = MockServer::start();
        mock_auth(&server, "tok");
        let q1001 = server.mock(|when, then| {
            when.method(GET)
                .path(LIST_PATH)
                .query_param("orderNum", "1001")
                .query_param("pageNum", "1");
            then.status(200)
                .json_body(page(vec![order_json("CJ1", "#1001", "20.00", 2)]));
        });
        let q1002 = server.mock(|when, then| {
            when.method(GET)
                .path(LIST_PATH)
                .query_param("orderNum", "1002")
                .query_param("pageNum", "1");
            then.status(200)
                .json_body(page(vec![order_json("CJ2", "1002", "3.00", 1)]));
        });
        let tail = server.mock(|when, then| {
            when.method(GET).path(LIST_PATH).query_param("pageNum", "2");
            then.status(200).json_body(page(vec![]));
        });

        let filter = OrderFilter {
            date_range: None,
            identifiers: Some(vec!["#1001".into(), "1002".into(), " 1001".into()]),
        };
        let listing = client(&server).list_orders(&filter).unwrap();

        q1001.assert_calls(1);
        q1002.assert_calls(1);
        tail.assert_calls(2);
        let ids: Vec<&str> = listing
            .orders
            .iter()
            .map(|o| o.provider_order_id.as_str())
            .collect();
        assert_eq!(ids, vec!["CJ1", "CJ2"]);
    }

    #[test]
    fn failing_identifier_degrades_only_itself() {
        let server = MockServer::start();
        mock_auth(&server, "tok");
        server.mock(|when, then| {
            when.method(GET)
                .path(LIST_PATH)
                .query_param("orderNum", "1001")
                .query_param("pageNum", "1");
            then.status(200)
                .json_body(page(vec![order_json("CJ1", "1001", "20.00", 2)]));
        });
        server.mock(|when, then| {
            when.method(GET)
                .path(LIST_PATH)
                .query_param("orderNum", "1001")
                .query_param("pageNum", "2");
            then.status(200).json_body(page(vec![]));
        });
        server.mock(|when, then| {
            when.method(GET).path(LIST_PATH).query_param("orderNum", "1002");
            then.status(500).body("boom");
        });

        let filter = OrderFilter {
            date_range: None,
            identifiers: Some(vec!["1001".into(), "1002".into()]),
        };
        let listing = client(&server).list_orders(&filter).unwrap();

        assert_eq!(listing.orders.len(), 1);
        assert_eq!(listing.warnings.len(), 1);
        assert!(listing.warnings[0].contains("order 1002"));
        assert_eq!(listing.failed_identifiers, vec!["1002".to_string()]);
    }

    #[test]
    fn consecutive_pages_respect_page_delay() {
        let server = MockServer::start();
        mock_auth(&server, "tok");
        server.mock(|when, then| {
            when.method(GET).path(LIST_PATH).query_param("pageNum", "1");
            then.status(200)
                .json_body(page(vec![order_json("CJ1", "1", "1", 1)]));
        });
        server.mock(|when, then| {
            when.method(GET).path(LIST_PATH).query_param("pageNum", "2");
            then.status(200).json_body(page(vec![]));
        });

        let config = ProviderConfig {
            page_delay_ms: 150,
            ..test_config(&server)
        };
        let c = ProviderClient::new(config, "secret-key").unwrap();
        c.authenticate().unwrap();

        let started = std::time::Instant::now();
        let listing = c.list_orders(&OrderFilter::default()).unwrap();

        assert_eq!(listing.pages_fetched, 1);
        assert!(
            started.elapsed() >= Duration::from_millis(150),
            "two page requests took {:?}",
            started.elapsed()
        );
    }

    // ── Detail enrichment ──────────────────────────────────────────

    fn bare_order(id: &str) -> ProviderOrder {
        ProviderOrder {
            provider_order_id: id.into(),
            external_reference_id: Some(id.into()),
            order_amount: dec!(10),
            line_items: Vec::new(),
            detail_error: None,
        }
    }

    #[test]
    fn auto_policy_fetches_only_incomplete_orders() {
        let server = MockServer::start();
        mock_auth(&server, "tok");
        let detail_a = server.mock(|when, then| {
            when.method(GET).path(DETAIL_PATH).query_param("orderId", "A");
            then.status(200).json_body(json!({
                "code": 200,
                "result": true,
                "data": {
                    "orderId": "A",
                    "orderAmount": "10",
                    "productList": [{
                        "productName": "Kit", "quantity": 1, "isGroup": true,
                        "subProducts": [
                            { "productName": "Brush", "quantity": 2 },
                            { "productName": "Paint", "quantity": 3 }
                        ]
                    }]
                }
            }));
        });
        let detail_b = server.mock(|when, then| {
            when.method(GET).path(DETAIL_PATH).query_param("orderId", "B");
            then.status(200).json_body(json!({}));
        });

        let mut complete = bare_order("B");
        complete.line_items = vec![ordercheck_recon::model::LineItem::new("Mug", dec!(1))];
        let mut orders = vec![bare_order("A"), complete];

        let outcome = client(&server)
            .enrich_orders(&mut orders, DetailPolicy::Auto, None)
            .unwrap();

        detail_a.assert_calls(1);
        detail_b.assert_calls(0);
        assert_eq!(outcome, EnrichOutcome { requested: 1, enriched: 1, failed: 0 });
        assert_eq!(orders[0].line_items[0].components.len(), 2);
        assert!(orders[0].detail_error.is_none());
    }

    #[test]
    fn failed_detail_marks_order() {
        let server = MockServer::start();
        mock_auth(&server, "tok");
        server.mock(|when, then| {
            when.method(GET).path(DETAIL_PATH).query_param("orderId", "A");
            then.status(404).json_body(json!({ "message": "order not found" }));
        });
        server.mock(|when, then| {
            when.method(GET).path(DETAIL_PATH).query_param("orderId", "B");
            then.status(200).json_body(json!({
                "code": 200,
                "data": { "orderId": "B", "productList": [{ "productName": "Mug", "quantity": 1 }] }
            }));
        });

        let mut orders = vec![bare_order("A"), bare_order("B")];
        let outcome = client(&server)
            .enrich_orders(&mut orders, DetailPolicy::Always, None)
            .unwrap();

        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.enriched, 1);
        let reason = orders[0].detail_error.as_deref().unwrap();
        assert!(reason.contains("order not found"), "got {reason}");
        assert!(orders[1].detail_error.is_none());
    }

    #[test]
    fn enrichment_limited_to_wanted_identifiers() {
        let server = MockServer::start();
        mock_auth(&server, "tok");
        let detail_mock = |id: &'static str| {
            server.mock(move |when, then| {
                when.method(GET).path(DETAIL_PATH).query_param("orderId", id);
                then.status(200).json_body(json!({
                    "code": 200,
                    "data": { "orderId": id, "productList": [{ "productName": "Mug", "quantity": 1 }] }
                }));
            })
        };
        let d1 = detail_mock("CJ1");
        let d9 = detail_mock("CJ9");
        let d1_dup = detail_mock("CJ1B");

        let order = |provider_id: &str, reference: &str| ProviderOrder {
            external_reference_id: Some(reference.into()),
            ..bare_order(provider_id)
        };
        let mut orders = vec![
            order("CJ1", "1001"),
            order("CJ9", "9999"),
            order("CJ1B", "#1001"),
        ];
        let wanted: HashSet<String> = ["1001".to_string()].into();

        let outcome = client(&server)
            .enrich_orders(&mut orders, DetailPolicy::Always, Some(&wanted))
            .unwrap();

        d1.assert_calls(1);
        d9.assert_calls(0);
        d1_dup.assert_calls(0);
        assert_eq!(outcome, EnrichOutcome { requested: 1, enriched: 1, failed: 0 });
        assert!(orders[1].line_items.is_empty());
    }

    #[test]
    fn never_policy_makes_no_requests() {
        let server = MockServer::start();
        let auth_mock = mock_auth(&server, "tok");
        let mut orders = vec![bare_order("A")];
        let outcome = client(&server)
            .enrich_orders(&mut orders, DetailPolicy::Never, None)
            .unwrap();
        assert_eq!(outcome.requested, 0);
        auth_mock.assert_calls(0);
    }

    // ── Cancellation ───────────────────────────────────────────────

    #[test]
    fn cancelled_client_sends_nothing() {
        let server = MockServer::start();
        let auth_mock = mock_auth(&server, "tok");
        let c = client(&server);
        c.cancel_handle().store(true, Ordering::SeqCst);

        let err = c.list_orders(&OrderFilter::default()).unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled));
        auth_mock.assert_calls(0);
        assert!(c.tokens.get().is_none());
    }

    #[test]
    fn empty_api_key_rejected() {
        let server = MockServer::start();
        let err = ProviderClient::new(test_config(&server), "  ").err().unwrap();
        assert!(matches!(err, ProviderError::Config(_)));
    }
}
