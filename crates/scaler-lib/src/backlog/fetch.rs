//! Retrying HTTP fetch against the job platform
//!
//! One authenticated GET per logical query. Gateway timeouts are the only
//! transient class: they are retried on a fixed backoff up to a fixed
//! attempt ceiling. Every other non-success status is terminal.

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;
use url::Url;

use crate::error::FetchError;

/// Retry policy for job-platform requests
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Per-attempt request timeout
    pub request_timeout: Duration,
    /// Fixed wait between retryable attempts
    pub retry_backoff: Duration,
    /// Total attempt ceiling (first try included)
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            retry_backoff: Duration::from_secs(2),
            max_attempts: 5,
        }
    }
}

/// HTTP fetcher with bounded retry on gateway timeouts
pub struct RetryingFetcher {
    client: Client,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(policy: RetryPolicy) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(policy.request_timeout).build()?;
        Ok(Self { client, policy })
    }

    /// Perform one authenticated GET, retrying gateway timeouts
    ///
    /// Returns the raw response body for the caller to decode.
    pub async fn get(&self, url: Url, token: &str) -> Result<String, FetchError> {
        for attempt in 1..=self.policy.max_attempts {
            let response = self
                .client
                .get(url.clone())
                .header(AUTHORIZATION, format!("Bearer {}", token))
                .send()
                .await?;

            let status = response.status();
            if status.is_success() {
                return Ok(response.text().await?);
            }

            if status == StatusCode::GATEWAY_TIMEOUT {
                warn!(
                    attempt,
                    max_attempts = self.policy.max_attempts,
                    url = %url,
                    "Gateway timeout from job platform; retrying"
                );
                if attempt < self.policy.max_attempts {
                    sleep(self.policy.retry_backoff).await;
                }
                continue;
            }

            return Err(FetchError::Terminal { status });
        }

        Err(FetchError::RetriesExhausted {
            attempts: self.policy.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn test_policy() -> RetryPolicy {
        RetryPolicy {
            request_timeout: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(20),
            max_attempts: 5,
        }
    }

    #[tokio::test]
    async fn test_success_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/jobs")
            .match_header("authorization", "Bearer sekret")
            .with_status(200)
            .with_body(r#"{"count": 7}"#)
            .create_async()
            .await;

        let fetcher = RetryingFetcher::new(test_policy()).unwrap();
        let url = Url::parse(&format!("{}/jobs", server.url())).unwrap();
        let body = fetcher.get(url, "sekret").await.unwrap();

        assert_eq!(body, r#"{"count": 7}"#);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_gateway_timeout_exhausts_exactly_five_attempts() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/jobs")
            .with_status(504)
            .expect(5)
            .create_async()
            .await;

        let policy = test_policy();
        let backoff = policy.retry_backoff;
        let fetcher = RetryingFetcher::new(policy).unwrap();
        let url = Url::parse(&format!("{}/jobs", server.url())).unwrap();

        let start = Instant::now();
        let err = fetcher.get(url, "sekret").await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, FetchError::RetriesExhausted { attempts: 5 }));
        // 4 backoff sleeps between the 5 attempts
        assert!(elapsed >= backoff * 4, "elapsed {:?}", elapsed);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_timeout_failure_is_terminal_after_one_attempt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/jobs")
            .with_status(403)
            .expect(1)
            .create_async()
            .await;

        let fetcher = RetryingFetcher::new(test_policy()).unwrap();
        let url = Url::parse(&format!("{}/jobs", server.url())).unwrap();
        let err = fetcher.get(url, "sekret").await.unwrap_err();

        assert!(
            matches!(err, FetchError::Terminal { status } if status == StatusCode::FORBIDDEN)
        );
        mock.assert_async().await;
    }
}
