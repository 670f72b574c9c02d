//! HTTP client for the listing API
//!
//! Wraps one pooled `reqwest::Client` (cookies kept across requests) and the
//! shared [`RetryPolicy`]. Requests return `Ok(None)` when every attempt
//! failed transiently, and `Err` only for failures retrying cannot fix.

use crate::api::endpoints::{self, DEFAULT_NOTICE_ORDER};
use crate::api::retry::{classify_status, is_transient, retry_after, RetryPolicy, StatusClass};
use crate::error::{HarvestError, Result};
use crate::pacing::{Sleeper, TokioSleeper};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE, REFERER, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

// ============================================================================
// API Client Constants
// ============================================================================

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

const JSON_ACCEPT: &str = "application/json, text/javascript, */*; q=0.01";

const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Where listing pages and notice details come from
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Raw listing response for one 1-based page
    async fn fetch_list(&self, page: u32, page_size: u32, lookback_days: u32)
        -> Result<Option<Value>>;

    /// Raw detail response for one notice
    async fn fetch_detail(&self, notice_id: &str) -> Result<Option<Value>>;
}

/// API client for the procurement portal
pub struct ApiClient {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl ApiClient {
    /// Create a new API client that waits on the tokio timer
    pub fn new(base_url: impl Into<String>, policy: RetryPolicy) -> Result<Self> {
        policy.validate()?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(policy.request_timeout)
            .cookie_store(true)
            .default_headers(default_headers(&base_url)?)
            .build()?;

        Ok(Self {
            client,
            base_url,
            policy,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Replace the sleeper used for backoff and rate-limit waits
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch one listing page
    pub async fn fetch_list(
        &self,
        page: u32,
        page_size: u32,
        lookback_days: u32,
    ) -> Result<Option<Value>> {
        let url = endpoints::list_url(&self.base_url);
        let today = chrono::Local::now().date_naive();
        let payload = endpoints::list_payload(page, page_size, lookback_days, today)?;

        self.post_with_retry(&url, &payload, &format!("list page {page}"))
            .await
    }

    /// Fetch the detail of one notice at the default order
    pub async fn fetch_detail(&self, notice_id: &str) -> Result<Option<Value>> {
        self.fetch_detail_with_order(notice_id, DEFAULT_NOTICE_ORDER)
            .await
    }

    /// Fetch the detail of one notice at a specific order
    pub async fn fetch_detail_with_order(
        &self,
        notice_id: &str,
        notice_order: &str,
    ) -> Result<Option<Value>> {
        let url = endpoints::detail_url(&self.base_url);
        let payload = endpoints::detail_payload(notice_id, notice_order);

        self.post_with_retry(&url, &payload, &format!("detail {notice_id}"))
            .await
    }

    /// Release pooled connections
    pub fn close(self) {
        debug!(base_url = %self.base_url, "Closing API client");
        drop(self.client);
    }

    async fn post_with_retry(
        &self,
        url: &str,
        payload: &Value,
        context: &str,
    ) -> Result<Option<Value>> {
        let policy = &self.policy;
        let mut attempt: u32 = 1;
        let mut rate_limit_waits: u32 = 0;

        loop {
            debug!(context, attempt, max_attempts = policy.max_attempts, "Sending request");

            let failure = match self.client.post(url).json(payload).send().await {
                Ok(response) => {
                    let status = response.status();
                    match classify_status(status) {
                        StatusClass::Success => match response.bytes().await {
                            Ok(body) => {
                                return serde_json::from_slice::<Value>(&body)
                                    .map(Some)
                                    .map_err(|e| {
                                        HarvestError::unexpected(
                                            context,
                                            format!("invalid JSON body: {e}"),
                                        )
                                    });
                            },
                            // Timeouts and resets can also strike while the body streams in
                            Err(e) if is_transient(&e) || e.is_body() => {
                                format!("body read error: {e}")
                            },
                            Err(e) => return Err(HarvestError::unexpected(context, e)),
                        },
                        StatusClass::RateLimited => {
                            rate_limit_waits += 1;
                            if rate_limit_waits > policy.max_rate_limit_waits {
                                error!(
                                    context,
                                    waits = policy.max_rate_limit_waits,
                                    "Still rate limited, giving up"
                                );
                                return Ok(None);
                            }

                            let wait = retry_after(response.headers()).unwrap_or(policy.rate_limit_wait);
                            warn!(
                                context,
                                wait_secs = wait.as_secs(),
                                "Rate limited by upstream, waiting"
                            );
                            self.sleeper.sleep(wait).await;
                            continue;
                        },
                        StatusClass::ServerError => format!("HTTP {}", status.as_u16()),
                        StatusClass::ClientError => {
                            let body = response.text().await.unwrap_or_default();
                            error!(context, status = status.as_u16(), "Request rejected");
                            return Err(HarvestError::terminal(context, status.as_u16(), &body));
                        },
                        StatusClass::Unexpected => {
                            return Err(HarvestError::unexpected(
                                context,
                                format!("unexpected HTTP status {status}"),
                            ));
                        },
                    }
                },
                Err(e) if is_transient(&e) => format!("transport error: {e}"),
                Err(e) => return Err(HarvestError::unexpected(context, e)),
            };

            if attempt >= policy.max_attempts {
                error!(
                    context,
                    attempts = attempt,
                    last_error = %failure,
                    "Request failed after all retries"
                );
                return Ok(None);
            }

            let wait = policy.backoff_delay(attempt);
            warn!(
                context,
                attempt,
                max_attempts = policy.max_attempts,
                wait_secs = wait.as_secs(),
                error = %failure,
                "Request failed, retrying"
            );
            self.sleeper.sleep(wait).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl ListingSource for ApiClient {
    async fn fetch_list(
        &self,
        page: u32,
        page_size: u32,
        lookback_days: u32,
    ) -> Result<Option<Value>> {
        ApiClient::fetch_list(self, page, page_size, lookback_days).await
    }

    async fn fetch_detail(&self, notice_id: &str) -> Result<Option<Value>> {
        ApiClient::fetch_detail(self, notice_id).await
    }
}

fn default_headers(base_url: &str) -> Result<HeaderMap> {
    let referer = HeaderValue::from_str(&format!("{base_url}/"))
        .map_err(|e| HarvestError::config(format!("invalid base URL '{base_url}': {e}")))?;

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static(JSON_ACCEPT));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    headers.insert(
        HeaderName::from_static("x-requested-with"),
        HeaderValue::from_static("XMLHttpRequest"),
    );
    headers.insert(REFERER, referer);
    Ok(headers)
}
