//! HTTP fetching with rate-limit backoff
//!
//! The crash-stats search endpoint rate limits anonymous clients with
//! HTTP 429 and no Retry-After header, so the fetcher retries with
//! exponential backoff: wait the current delay, double it, try again,
//! up to a fixed attempt count. Any other error status fails the fetch
//! immediately.
//!
//! The transport is a trait so tests can run the retry loop against a
//! scripted sequence of responses without a network.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::FetchError;
use crate::render::StatusSink;

const HTTP_TOO_MANY_REQUESTS: u16 = 429;

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// One GET request, body read to completion. Connection-level failures
/// map to [`FetchError::Transport`].
pub trait Transport: Send + Sync {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<TransportResponse, FetchError>>;
}

/// [`Transport`] over a shared reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<TransportResponse, FetchError>> {
        async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            Ok(TransportResponse { status, body })
        }
        .boxed()
    }
}

/// Fetches JSON documents, backing off and retrying on HTTP 429.
pub struct BackoffFetcher {
    transport: Arc<dyn Transport>,
    status: Arc<dyn StatusSink>,
}

impl BackoffFetcher {
    pub fn new(transport: Arc<dyn Transport>, status: Arc<dyn StatusSink>) -> Self {
        Self { transport, status }
    }

    /// GET `url` and parse the body as JSON.
    ///
    /// On 429 the fetcher waits `initial_delay`, doubles the delay and
    /// retries, for at most `max_attempts` total attempts; a 429 on the
    /// final attempt fails with [`FetchError::TooManyAttempts`] without
    /// waiting again. Non-429 error statuses fail immediately.
    pub async fn fetch_json(
        &self,
        url: &str,
        initial_delay: Duration,
        max_attempts: u32,
    ) -> Result<serde_json::Value, FetchError> {
        let mut delay = initial_delay;
        for attempt in 1..=max_attempts.max(1) {
            tracing::debug!(url, attempt, "fetching");
            let response = self.transport.get(url).await?;

            if response.status == HTTP_TOO_MANY_REQUESTS {
                if attempt >= max_attempts {
                    return Err(FetchError::TooManyAttempts { attempts: attempt });
                }
                self.status
                    .publish(&format!("Waiting {} ms to avoid rate limiting", delay.as_millis()));
                tokio::time::sleep(delay).await;
                delay *= 2;
                continue;
            }

            if response.status >= 400 {
                return Err(FetchError::HttpStatus {
                    status: response.status,
                    body: response.body,
                });
            }

            return serde_json::from_str(&response.body).map_err(|_| {
                FetchError::MalformedResponse {
                    body: response.body,
                }
            });
        }
        Err(FetchError::TooManyAttempts {
            attempts: max_attempts,
        })
    }
}
