//! HTTP retry with exponential backoff, shared by the fetchers and the model client.
//!
//! - 429: backoff 2s, 4s, 8s
//! - 5xx, timeouts and connect errors: backoff 1s, 2s, 4s
//! - other statuses and request errors: returned immediately
//!
//! Delays are capped at [`MAX_BACKOFF_SECS`].

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::warn;

/// Why a request did not produce a successful response.
#[derive(Debug)]
pub enum RetryFailure {
    /// The last response had a non-success status.
    Status { status: StatusCode, body: String },
    /// The last attempt timed out.
    Timeout,
    /// Any other transport problem.
    Transport(String),
}

impl std::fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryFailure::Status { status, .. } => write!(f, "HTTP {status}"),
            RetryFailure::Timeout => f.write_str("request timed out"),
            RetryFailure::Transport(message) => f.write_str(message),
        }
    }
}

pub const MAX_BACKOFF_SECS: u64 = 60;

fn backoff(exponent: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(exponent).min(MAX_BACKOFF_SECS))
}

/// Sends a request up to `max_attempts` times (at least once).
///
/// `build_request` is called once per attempt. No backoff follows the last attempt.
pub async fn send_with_retry<F>(
    client: &Client,
    build_request: F,
    max_attempts: u32,
    context: &str,
) -> Result<Response, RetryFailure>
where
    F: Fn(&Client) -> RequestBuilder,
{
    let attempts = max_attempts.max(1);
    let mut last_failure = RetryFailure::Transport("no attempt made".to_string());

    for attempt in 0..attempts {
        let is_last = attempt + 1 == attempts;
        let delay = match build_request(client).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(resp),
            Ok(resp) => {
                let status = resp.status();
                let retriable =
                    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
                let body = resp.text().await.unwrap_or_default();
                last_failure = RetryFailure::Status { status, body };
                if !retriable {
                    warn!(context, status = status.as_u16(), "Non-retriable HTTP status");
                    return Err(last_failure);
                }
                if status == StatusCode::TOO_MANY_REQUESTS {
                    backoff(attempt.saturating_add(1))
                } else {
                    backoff(attempt)
                }
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                last_failure = if e.is_timeout() {
                    RetryFailure::Timeout
                } else {
                    RetryFailure::Transport(e.to_string())
                };
                backoff(attempt)
            }
            Err(e) => {
                warn!(context, error = %e, "Request failed");
                return Err(RetryFailure::Transport(e.to_string()));
            }
        };

        if is_last {
            break;
        }
        warn!(
            context,
            attempt = attempt + 1,
            failure = %last_failure,
            delay_secs = delay.as_secs(),
            "Retrying request"
        );
        tokio::time::sleep(delay).await;
    }

    warn!(context, attempts, failure = %last_failure, "Giving up after retries");
    Err(last_failure)
}
