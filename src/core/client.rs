//! Paged HTTP client with retry and exponential backoff.
//!
//! Transient failures (429, 500, 503, timeouts) are retried up to `max_retries` attempts.
//! Everything else is recorded as a page failure in [`RunStatistics`] and surfaces as `None`.

use crate::config::mask_secret;
use crate::core::stats::RunStatistics;
use crate::domain::model::PageResponse;
use crate::utils::error::{EtlError, Result};
use crate::utils::retry::{backoff_duration, calculate_backoff};
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;

/// Characters of an unexpected response body kept in the failure message.
const ERROR_BODY_LIMIT: usize = 100;

#[derive(Clone)]
pub struct ApiClientSettings {
    pub base_url: String,
    pub token: String,
    pub max_retries: u32,
    /// Seconds.
    pub initial_backoff: f64,
    pub request_timeout: Duration,
}

impl fmt::Debug for ApiClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClientSettings")
            .field("base_url", &self.base_url)
            .field("token", &mask_secret(&self.token))
            .field("max_retries", &self.max_retries)
            .field("initial_backoff", &self.initial_backoff)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

enum AttemptOutcome {
    Page(PageResponse),
    Retry { reason: String, rate_limited: bool },
    Fail(String),
}

pub struct PagedApiClient {
    client: Client,
    settings: ApiClientSettings,
    rng: StdRng,
}

impl PagedApiClient {
    pub fn new(settings: ApiClientSettings) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", settings.token)).map_err(|_| {
            EtlError::InvalidConfigValueError {
                field: "api_token".to_string(),
                value: "<redacted>".to_string(),
                reason: "Token contains characters not allowed in an HTTP header".to_string(),
            }
        })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.request_timeout)
            .build()?;

        Ok(Self {
            client,
            settings,
            rng: StdRng::from_entropy(),
        })
    }

    /// Replaces the jitter source, e.g. with a seeded generator for reproducible timing.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn settings(&self) -> &ApiClientSettings {
        &self.settings
    }

    /// 取得單頁資料（含重試）
    pub async fn fetch_page(
        &mut self,
        stats: &mut RunStatistics,
        endpoint: &str,
        page: u32,
        limit: u32,
    ) -> Option<PageResponse> {
        let url = format!("{}{}", self.settings.base_url, endpoint);
        let max_retries = self.settings.max_retries;

        for attempt in 0..max_retries {
            tracing::debug!("GET {} page={} limit={} (attempt {})", url, page, limit, attempt + 1);

            match self.attempt(&url, page, limit).await {
                AttemptOutcome::Page(response) => return Some(response),
                AttemptOutcome::Retry {
                    reason,
                    rate_limited,
                } => {
                    let wait = calculate_backoff(
                        attempt,
                        self.settings.initial_backoff,
                        rate_limited,
                        &mut self.rng,
                    );
                    tracing::warn!(
                        "⚠️ Page {}: {} - retry {}/{}, waiting {:.1}s",
                        page,
                        reason,
                        attempt + 1,
                        max_retries,
                        wait
                    );
                    tokio::time::sleep(backoff_duration(wait)).await;
                    stats.add_retry();
                }
                AttemptOutcome::Fail(message) => {
                    tracing::error!("❌ Page {} failed: {}", page, message);
                    stats.add_failure(page, message);
                    return None;
                }
            }
        }

        tracing::error!("❌ Page {} failed after {} retries", page, max_retries);
        stats.add_failure(page, "Max retries exceeded");
        None
    }

    async fn attempt(&self, url: &str, page: u32, limit: u32) -> AttemptOutcome {
        let response = match self
            .client
            .get(url)
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Self::transport_outcome(e),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return Self::transport_outcome(e),
        };

        match status {
            StatusCode::OK => match serde_json::from_str::<PageResponse>(&body) {
                Ok(page) => AttemptOutcome::Page(page),
                Err(e) => AttemptOutcome::Fail(format!("Invalid response body: {}", e)),
            },
            StatusCode::TOO_MANY_REQUESTS => AttemptOutcome::Retry {
                reason: "Rate limit (429)".to_string(),
                rate_limited: true,
            },
            StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => {
                AttemptOutcome::Retry {
                    reason: format!("Server error ({})", status.as_u16()),
                    rate_limited: false,
                }
            }
            other => AttemptOutcome::Fail(format!(
                "HTTP {}: {}",
                other.as_u16(),
                body.chars().take(ERROR_BODY_LIMIT).collect::<String>()
            )),
        }
    }

    fn transport_outcome(error: reqwest::Error) -> AttemptOutcome {
        if error.is_timeout() {
            AttemptOutcome::Retry {
                reason: "Request timeout".to_string(),
                rate_limited: false,
            }
        } else {
            AttemptOutcome::Fail(format!("Request exception: {}", error))
        }
    }
}
