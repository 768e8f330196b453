use std::time::{Duration, Instant};

use anyhow::Context;
use metrics::counter;
use reqwest::{header, StatusCode};
use serde::Serialize;
use tracing::{debug, warn};

use super::error::{Result, UpstreamError};
use super::retry::RetryPolicy;

const USER_AGENT: &str = "cast-frontpage/0.1";

/// Authenticated GET client for the social-graph API.
///
/// Owns its connection pool; nothing is retained between calls besides it.
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    policy: RetryPolicy,
}

/// Outcome of a single un-retried request, for the diagnostics route.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub success: bool,
    pub status: Option<u16>,
    pub outcome: &'static str,
    pub time_ms: u64,
}

impl UpstreamClient {
    /// `api_key` of `None` (or blank) makes every call fail with
    /// [`UpstreamError::MissingApiKey`].
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        policy: RetryPolicy,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building upstream http client")?;
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            policy,
        })
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `{base}{path}` with retry on rate limiting and transient failures.
    ///
    /// Exhausted retries return the last observed error; callers treat that as
    /// "no data from this call".
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let key = self.api_key.as_deref().ok_or(UpstreamError::MissingApiKey)?;

        let mut attempt = 0u32;
        loop {
            match self.send_once(key, path, query).await {
                Ok(body) => {
                    counter!("upstream_requests_total", "outcome" => "ok").increment(1);
                    return Ok(body);
                }
                Err(err) => {
                    counter!("upstream_requests_total", "outcome" => err.kind()).increment(1);
                    if !err.is_retryable() {
                        debug!(target: "upstream", path, error = %err, "non-retryable upstream outcome");
                        return Err(err);
                    }
                    let Some(delay) = self.policy.next_delay(attempt, err.retry_hint()) else {
                        warn!(target: "upstream", path, attempts = attempt + 1, error = %err, "retries exhausted");
                        return Err(err);
                    };
                    warn!(
                        target: "upstream",
                        path,
                        attempt = attempt + 1,
                        max_retries = self.policy.max_retries,
                        wait_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying upstream call"
                    );
                    counter!("upstream_retries_total").increment(1);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Single request without retries; reports what happened.
    pub async fn probe(&self, path: &str, query: &[(&str, String)]) -> ProbeReport {
        let started = Instant::now();
        let result = match self.api_key.as_deref() {
            Some(key) => self.send_once(key, path, query).await,
            None => Err(UpstreamError::MissingApiKey),
        };
        let time_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(_) => ProbeReport {
                success: true,
                status: Some(200),
                outcome: "ok",
                time_ms,
            },
            Err(err) => ProbeReport {
                success: false,
                status: match &err {
                    UpstreamError::Client { status } => Some(*status),
                    UpstreamError::RateLimited { .. } => Some(429),
                    _ => None,
                },
                outcome: err.kind(),
                time_ms,
            },
        }
    }

    async fn send_once(&self, key: &str, path: &str, query: &[(&str, String)]) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .header(header::ACCEPT, "application/json")
            .header("x-api-key", key)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp.text().await?);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(resp.headers().get(header::RETRY_AFTER));
            return Err(UpstreamError::RateLimited { retry_after });
        }
        if status.is_client_error() {
            return Err(UpstreamError::Client {
                status: status.as_u16(),
            });
        }
        Err(UpstreamError::Transient(format!("status {}", status.as_u16())))
    }
}

/// Integer-seconds form only; HTTP-date values fall back to backoff.
fn parse_retry_after(value: Option<&header::HeaderValue>) -> Option<Duration> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
