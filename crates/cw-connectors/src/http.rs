//! HTTP client used by the catalog transport.
//!
//! Wraps `reqwest` with authentication, rate limiting, and retry with
//! exponential backoff. Only idempotent GETs are issued against the catalog,
//! so every request is safe to retry.

use crate::traits::{AuthConfig, ConnectorConfig, ConnectorError, ConnectorResult};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

type RateLimiterType = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Rate limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per period.
    pub max_requests: u32,
    /// Period length in seconds.
    pub period_secs: u64,
    /// Maximum burst size.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            period_secs: 1,
            burst_size: 20,
        }
    }
}

impl RateLimitConfig {
    fn quota(&self) -> ConnectorResult<Quota> {
        let requests = self.max_requests.max(1);
        let period = Duration::from_secs(self.period_secs.max(1)) / requests;
        let quota = Quota::with_period(period).ok_or_else(|| {
            ConnectorError::ConfigError(format!("invalid rate limit period: {:?}", period))
        })?;
        Ok(quota.allow_burst(NonZeroU32::new(self.burst_size).unwrap_or(NonZeroU32::MIN)))
    }
}

/// HTTP client with retry and rate limiting.
pub struct HttpClient {
    client: Client,
    config: ConnectorConfig,
    rate_limiter: Option<Arc<RateLimiterType>>,
}

impl HttpClient {
    /// Creates a new HTTP client from connector configuration.
    pub fn new(config: ConnectorConfig) -> ConnectorResult<Self> {
        Self::with_rate_limit(config, None)
    }

    /// Creates a new HTTP client with rate limiting.
    pub fn with_rate_limit(
        config: ConnectorConfig,
        rate_limit: Option<RateLimitConfig>,
    ) -> ConnectorResult<Self> {
        if !config.verify_tls {
            warn!(
                base_url = %config.base_url,
                connector_name = %config.name,
                "TLS certificate verification disabled"
            );
        }

        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &config.headers {
            match (
                reqwest::header::HeaderName::try_from(key.as_str()),
                reqwest::header::HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(val)) => {
                    headers.insert(name, val);
                }
                _ => warn!(header = %key, "Ignoring invalid default header"),
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_tls)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .default_headers(headers)
            .build()
            .map_err(|e| ConnectorError::ConfigError(e.to_string()))?;

        let rate_limiter = match rate_limit {
            Some(rl) => Some(Arc::new(GovernorRateLimiter::direct(rl.quota()?))),
            None => None,
        };

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Returns the connection name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Builds a URL from path segments, percent-encoding each one.
    ///
    /// Catalog ids are opaque and may contain `/` or spaces.
    pub fn segments_url(&self, segments: &[&str]) -> ConnectorResult<String> {
        let mut url = reqwest::Url::parse(&self.config.base_url)
            .map_err(|e| ConnectorError::ConfigError(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ConnectorError::ConfigError("base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url.to_string())
    }

    /// Executes a GET against the resource named by `segments` and
    /// deserializes the JSON body.
    pub async fn get_json_segments<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> ConnectorResult<T> {
        let url = self.segments_url(segments)?;
        let request = self.client.get(url).query(query);
        let response = self.execute_with_retry(request).await?;
        parse_json_response(response).await
    }

    async fn execute_with_retry(&self, request: RequestBuilder) -> ConnectorResult<Response> {
        let request = self.add_auth(request);

        let mut last_error = None;
        let mut delay = Duration::from_millis(100);

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!("Retry attempt {} after {:?}", attempt, delay);
                sleep(delay).await;
                delay = std::cmp::min(delay * 2 + rand_jitter(), MAX_BACKOFF);
            }

            if let Some(limiter) = &self.rate_limiter {
                limiter.until_ready().await;
            }

            let attempt_request = request
                .try_clone()
                .ok_or_else(|| ConnectorError::Internal("Failed to clone request".to_string()))?;

            let response = match attempt_request.send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = Some(classify_send_error(&e));
                    continue;
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = retry_after_secs(&response);
                if attempt < self.config.max_retries {
                    warn!("Rate limited by catalog, waiting {} seconds", retry_after);
                    sleep(Duration::from_secs(retry_after)).await;
                    last_error = Some(ConnectorError::RateLimited(retry_after));
                    continue;
                }
                return Err(ConnectorError::RateLimited(retry_after));
            }

            if status.is_server_error() {
                warn!("Server error {}, retrying", status);
                last_error = Some(ConnectorError::RequestFailed(format!(
                    "Server error: {}",
                    status
                )));
                continue;
            }

            if status.is_client_error() {
                return Err(client_error(status, response).await);
            }

            return Ok(response);
        }

        Err(last_error.unwrap_or_else(|| ConnectorError::Internal("Unknown error".to_string())))
    }

    fn add_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth {
            AuthConfig::None => request,
            AuthConfig::ApiKey { key, header_name } => {
                request.header(header_name.as_str(), key.expose_secret())
            }
            AuthConfig::BearerToken { token } => request.bearer_auth(token.expose_secret()),
            AuthConfig::Basic { username, password } => {
                request.basic_auth(username, Some(password.expose_secret()))
            }
        }
    }
}

async fn parse_json_response<T: DeserializeOwned>(response: Response) -> ConnectorResult<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ConnectorError::InvalidResponse(e.to_string()))?;

    serde_json::from_str(&text).map_err(|e| {
        ConnectorError::InvalidResponse(format!(
            "Failed to parse response (status {}): {} - Body: {}",
            status,
            e,
            text.chars().take(500).collect::<String>()
        ))
    })
}

fn classify_send_error(e: &reqwest::Error) -> ConnectorError {
    if e.is_timeout() {
        ConnectorError::Timeout(e.to_string())
    } else if e.is_connect() {
        ConnectorError::ConnectionFailed(e.to_string())
    } else {
        ConnectorError::RequestFailed(e.to_string())
    }
}

async fn client_error(status: StatusCode, response: Response) -> ConnectorError {
    let path = response.url().path().to_string();
    match status {
        StatusCode::UNAUTHORIZED => ConnectorError::AuthenticationFailed("Unauthorized".into()),
        StatusCode::FORBIDDEN => ConnectorError::AuthorizationDenied("Forbidden".into()),
        StatusCode::NOT_FOUND => ConnectorError::NotFound(path),
        _ => {
            let body = response.text().await.unwrap_or_default();
            ConnectorError::RequestFailed(format!("Client error {}: {}", status, body))
        }
    }
}

fn retry_after_secs(response: &Response) -> u64 {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(1)
}

/// Small pseudo-random jitter for backoff.
fn rand_jitter() -> Duration {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    std::time::Instant::now().hash(&mut hasher);
    Duration::from_millis(hasher.finish() % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_url_joins_base_path() {
        for base in ["https://catalog.example.com/api/", "https://catalog.example.com/api"] {
            let client = HttpClient::new(ConnectorConfig::new("test", base)).unwrap();
            assert_eq!(
                client.segments_url(&["types", "table"]).unwrap(),
                "https://catalog.example.com/api/types/table"
            );
        }
    }

    #[test]
    fn test_segments_url_encodes_ids() {
        let client =
            HttpClient::new(ConnectorConfig::new("test", "https://catalog.example.com/api/"))
                .unwrap();

        let url = client.segments_url(&["objects", "db/schema one"]).unwrap();
        assert_eq!(
            url,
            "https://catalog.example.com/api/objects/db%2Fschema%20one"
        );
    }

    #[test]
    fn test_rate_limit_quota() {
        let config = RateLimitConfig::default();
        assert!(config.quota().is_ok());

        let degenerate = RateLimitConfig {
            max_requests: 0,
            period_secs: 0,
            burst_size: 0,
        };
        assert!(degenerate.quota().is_ok());
    }

    #[test]
    fn test_jitter_bounded() {
        assert!(rand_jitter() < Duration::from_millis(100));
    }
}
