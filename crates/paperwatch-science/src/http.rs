use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

use crate::error::{Result, ScienceError};

pub const DEFAULT_USER_AGENT: &str = "paperwatch/0.1";

/// Connection settings shared by every outbound client.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub user_agent: String,
    pub timeout: Duration,
    pub proxy: Option<String>,
    /// Minimum spacing between two requests from the same client.
    pub min_interval: Duration,
    /// In-request retries before giving up until the next pass.
    pub max_retries: u32,
    /// Upper bound on a server-requested `Retry-After`.
    pub max_retry_wait: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            proxy: None,
            min_interval: Duration::from_secs(1),
            max_retries: 2,
            max_retry_wait: Duration::from_secs(10),
        }
    }
}

impl HttpOptions {
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            min_interval: Duration::from_millis(1),
            max_retries: 0,
            max_retry_wait: Duration::from_millis(10),
            ..Self::default()
        }
    }
}

// ─── RateLimitedClient ────────────────────────────────────────────────────────

pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
    max_retries: u32,
    max_retry_wait: Duration,
}

impl RateLimitedClient {
    pub fn new(options: &HttpOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(options.user_agent.as_str())
            .timeout(options.timeout)
            .gzip(true);
        if let Some(proxy) = options.proxy.as_deref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            min_interval: options.min_interval,
            last_request: Arc::new(Mutex::new(None)),
            max_retries: options.max_retries,
            max_retry_wait: options.max_retry_wait,
        })
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        self.get_with_headers(url, HeaderMap::new()).await
    }

    pub async fn get_with_headers(&self, url: &str, headers: HeaderMap) -> Result<String> {
        let resp = self.get_response(url, headers).await?;
        resp.text().await.map_err(|e| classify_transport(url, e))
    }

    /// Send a GET, retrying 429s and transport failures in place.
    ///
    /// Returns the response only for a success status so callers can stream
    /// the body. 404 maps to `NotFound`, other failures to `ApiError`.
    pub async fn get_response(&self, url: &str, headers: HeaderMap) -> Result<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            self.wait_for_rate_limit().await;
            let resp = self.client.get(url).headers(headers.clone()).send().await;
            match resp {
                Ok(r) if r.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let wait = r
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    if attempt >= self.max_retries {
                        return Err(ScienceError::RateLimit(host_of(url), wait));
                    }
                    let wait = Duration::from_secs(wait).min(self.max_retry_wait);
                    debug!(url, ?wait, "rate limited, backing off");
                    sleep(wait).await;
                    attempt += 1;
                }
                Ok(r) if r.status() == StatusCode::NOT_FOUND => {
                    return Err(ScienceError::NotFound(url.to_string()));
                }
                Ok(r) if !r.status().is_success() => {
                    let status = r.status().as_u16();
                    let body = r.text().await.unwrap_or_default();
                    return Err(ScienceError::ApiError(
                        url.to_string(),
                        format!("HTTP {status}: {}", truncate(&body, 200)),
                    ));
                }
                Ok(r) => return Ok(r),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(classify_transport(url, e));
                    }
                    let backoff = 2u64.pow(attempt);
                    sleep(Duration::from_secs(backoff)).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn classify_transport(url: &str, e: reqwest::Error) -> ScienceError {
    if e.is_timeout() {
        ScienceError::Timeout(url.to_string())
    } else {
        ScienceError::Http(e)
    }
}

fn host_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(ToOwned::to_owned))
        .unwrap_or_else(|| "server".to_string())
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
