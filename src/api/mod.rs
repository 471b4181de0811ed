pub mod auth;
pub mod dataverse;
pub mod directory;
pub mod query;

use crate::config::{RetrySettings, Settings};
use crate::error::{enhance_api_error, AgentMapError, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const JITTER_FACTOR: f64 = 0.3; // +/- 30% jitter

/// Exponential backoff capped at `max_backoff_ms`, with jitter
fn calculate_backoff_with_jitter(retry: &RetrySettings, attempt: u32) -> Duration {
    let base_backoff = retry
        .initial_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped_backoff = base_backoff.min(retry.max_backoff_ms);

    let jitter_range = (capped_backoff as f64 * JITTER_FACTOR) as u64;
    let jitter = if jitter_range > 0 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        std::time::SystemTime::now().hash(&mut hasher);
        (hasher.finish() % (jitter_range * 2)) as i64 - jitter_range as i64
    } else {
        0
    };

    Duration::from_millis((capped_backoff as i64 + jitter).max(0) as u64)
}

/// Bearer-token REST client with retry for transient failures.
///
/// Used for both Microsoft Graph and the Dataverse Web API; the two only
/// differ in base URL and default headers.
pub struct ApiClient {
    client: Client,
    base_url: String,
    access_token: String,
    retry: RetrySettings,
}

impl ApiClient {
    pub fn new(base_url: &str, access_token: String, settings: &Settings) -> Result<Self> {
        Self::with_headers(base_url, access_token, settings, HeaderMap::new())
    }

    pub fn with_headers(
        base_url: &str,
        access_token: String,
        settings: &Settings,
        headers: HeaderMap,
    ) -> Result<Self> {
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
            retry: settings.retry.clone(),
        })
    }

    /// Absolute URL for an endpoint relative to the base URL
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// GET an endpoint relative to the base URL
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.get_url(&self.url(endpoint)).await
    }

    /// GET an absolute URL (used to follow `@odata.nextLink`)
    pub async fn get_url<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.send_with_retry("GET", url, || self.client.get(url)).await?;
        Ok(resp.json::<T>().await?)
    }

    /// POST a JSON body to an endpoint relative to the base URL
    pub async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R> {
        let url = self.url(endpoint);
        let resp = self
            .send_with_retry("POST", &url, || self.client.post(&url).json(body))
            .await?;
        Ok(resp.json::<R>().await?)
    }

    /// Send a request, retrying on 429, 5xx and connection errors.
    ///
    /// `max_attempts` counts the first try. Non-success responses that are
    /// not retried become `ApiError` with the response body attached.
    async fn send_with_retry<F>(&self, method: &str, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let max_attempts = self.retry.max_attempts.max(1);

        for attempt in 0..max_attempts {
            let last_attempt = attempt + 1 == max_attempts;
            debug!("{} {} (attempt {}/{})", method, url, attempt + 1, max_attempts);

            let response = build().bearer_auth(&self.access_token).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status == StatusCode::TOO_MANY_REQUESTS && !last_attempt {
                        let retry_after = retry_after_wait(&self.retry, resp.headers());

                        warn!(
                            "Rate limited (429). Retrying in {:?}... (attempt {}/{})",
                            retry_after,
                            attempt + 1,
                            max_attempts
                        );
                        tokio::time::sleep(retry_after).await;
                        continue;
                    }

                    if status.is_server_error() && !last_attempt {
                        let wait_time = calculate_backoff_with_jitter(&self.retry, attempt);
                        warn!(
                            "Server error ({}). Retrying in {:?}... (attempt {}/{})",
                            status,
                            wait_time,
                            attempt + 1,
                            max_attempts
                        );
                        tokio::time::sleep(wait_time).await;
                        continue;
                    }

                    if !status.is_success() {
                        let error_text = resp.text().await.unwrap_or_default();
                        return Err(api_error(method, url, status, &error_text));
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    if !last_attempt && (e.is_connect() || e.is_timeout()) {
                        let wait_time = calculate_backoff_with_jitter(&self.retry, attempt);
                        warn!(
                            "Connection error: {}. Retrying in {:?}... (attempt {}/{})",
                            e,
                            wait_time,
                            attempt + 1,
                            max_attempts
                        );
                        tokio::time::sleep(wait_time).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(AgentMapError::ApiError(format!(
            "{} {} failed after {} attempts",
            method, url, max_attempts
        )))
    }
}

/// `Retry-After` seconds, capped at `max_backoff_ms`
fn retry_after_wait(retry: &RetrySettings, headers: &HeaderMap) -> Duration {
    let requested = headers
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_millis(retry.initial_backoff_ms));
    requested.min(Duration::from_millis(retry.max_backoff_ms))
}

fn api_error(method: &str, url: &str, status: StatusCode, body: &str) -> AgentMapError {
    let enhanced = enhance_api_error(body);
    if enhanced == body {
        AgentMapError::ApiError(format!("{} {} returned HTTP {}: {}", method, url, status, body))
    } else {
        AgentMapError::ApiError(format!(
            "{} {} returned HTTP {}: {}\nResponse: {}",
            method, url, status, enhanced, body
        ))
    }
}

// ============================================================================
// Pagination Helpers
// ============================================================================

/// Standard OData collection envelope
#[derive(Debug, Deserialize)]
pub struct PaginatedResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

impl ApiClient {
    /// Fetch a collection, following `@odata.nextLink`.
    ///
    /// `max_pages` of 0 follows every page. When the limit stops the walk
    /// early a warning is logged, since the result is then truncated.
    pub async fn get_all_pages<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        max_pages: usize,
    ) -> Result<Vec<T>> {
        let mut all_items: Vec<T> = Vec::new();
        let mut current_url = self.url(endpoint);
        let mut page_count = 0;

        loop {
            let response: PaginatedResponse<T> = self.get_url(&current_url).await?;
            all_items.extend(response.value);
            page_count += 1;

            match response.next_link {
                Some(next) if next == current_url => {
                    warn!("{} returned a nextLink to itself; stopping", endpoint);
                    break;
                }
                Some(next) if max_pages == 0 || page_count < max_pages => current_url = next,
                Some(_) => {
                    warn!(
                        "Stopped after {} page(s) of {}; results are truncated",
                        page_count, endpoint
                    );
                    break;
                }
                None => break,
            }
        }

        Ok(all_items)
    }
}
