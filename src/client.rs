//! Client side of the report API: bounded, fixed-backoff retries over a
//! pluggable transport.

use crate::error::ReportError;
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const HEALTHCHECK_ENDPOINT: &str = "/healthcheck";

/// Failure of a single request attempt.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("server answered with HTTP {status}")]
    Http { status: u16 },

    #[error("response body is not valid JSON: {0}")]
    Decode(String),

    #[error("request could not be sent: {0}")]
    Request(String),
}

impl FetchError {
    /// Only network-level failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Timeout | FetchError::Connect(_))
    }
}

#[derive(Error, Debug)]
pub enum ClientError {
    /// Retries exhausted; always `ReportError::TransientNetwork`.
    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("{endpoint}: {source}")]
    Fetch {
        endpoint: String,
        #[source]
        source: FetchError,
    },
}

/// Performs one GET and returns the raw body.
pub trait Transport {
    fn get(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

/// Blocking HTTP transport over `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }
        response.text().map_err(classify)
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_connect() {
        FetchError::Connect(e.to_string())
    } else if let Some(status) = e.status() {
        FetchError::Http {
            status: status.as_u16(),
        }
    } else if e.is_decode() || e.is_body() {
        FetchError::Decode(e.to_string())
    } else {
        FetchError::Request(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub backoff: Duration,
    /// Per-attempt timeout handed to the transport.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            timeout,
        }
    }
}

pub struct ReportClient<T: Transport> {
    base_url: String,
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> ReportClient<T> {
    pub fn new(base_url: impl Into<String>, transport: T) -> Self {
        Self::with_policy(base_url, transport, RetryPolicy::default())
    }

    pub fn with_policy(base_url: impl Into<String>, transport: T, policy: RetryPolicy) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
            policy,
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// GET `endpoint` and decode its JSON body, retrying transient failures.
    pub fn fetch_json<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R, ClientError> {
        let url = self.url(endpoint);
        let attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=attempts {
            debug!(%url, attempt, "fetching");
            match self.transport.get(&url, self.policy.timeout) {
                Ok(body) => return decode(endpoint, &body),
                Err(e) if e.is_transient() => {
                    warn!(%url, attempt, max = attempts, error = %e, "transient fetch failure");
                    if attempt < attempts {
                        std::thread::sleep(self.policy.backoff);
                    }
                }
                Err(e) => {
                    return Err(ClientError::Fetch {
                        endpoint: endpoint.to_string(),
                        source: e,
                    })
                }
            }
        }
        Err(ReportError::TransientNetwork {
            endpoint: endpoint.to_string(),
            attempts,
        }
        .into())
    }

    /// Single un-retried call to the health endpoint.
    pub fn health(&self) -> Result<serde_json::Value, ClientError> {
        let url = self.url(HEALTHCHECK_ENDPOINT);
        let body = self
            .transport
            .get(&url, self.policy.timeout)
            .map_err(|e| ClientError::Fetch {
                endpoint: HEALTHCHECK_ENDPOINT.to_string(),
                source: e,
            })?;
        info!(%url, "health check ok");
        decode(HEALTHCHECK_ENDPOINT, &body)
    }
}

fn decode<R: DeserializeOwned>(endpoint: &str, body: &str) -> Result<R, ClientError> {
    serde_json::from_str(body).map_err(|e| ClientError::Fetch {
        endpoint: endpoint.to_string(),
        source: FetchError::Decode(e.to_string()),
    })
}
