//! HTTP retry with exponential backoff.

use std::time::Duration;

use crate::GeocodeError;

/// Sends the request built by `build_request`, making up to `max_attempts`
/// attempts in total. Timeouts, connection failures, `429`, and `5xx`
/// responses are retried after 2s, 4s, ... Any other `4xx` is returned
/// immediately.
#[allow(clippy::future_not_send)]
pub async fn send_with_retry<F>(
    build_request: &F,
    max_attempts: u32,
) -> Result<reqwest::Response, GeocodeError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let max_attempts = max_attempts.max(1);
    let mut last_error = None;

    for attempt in 0..max_attempts {
        if attempt > 0 {
            let delay = backoff(attempt);
            log::warn!("  retry {attempt}/{} in {delay:?}...", max_attempts - 1);
            tokio::time::sleep(delay).await;
        }
        let last_attempt = attempt + 1 == max_attempts;

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && !last_attempt {
                    log::warn!("  transient error: {e}");
                    last_error = Some(GeocodeError::Http(e));
                    continue;
                }
                return Err(GeocodeError::Http(e));
            }
            Ok(response) => {
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    if !last_attempt {
                        log::warn!("  HTTP 429 (rate limited)");
                        last_error = Some(GeocodeError::RateLimited);
                        continue;
                    }
                    return Err(GeocodeError::RateLimited);
                }

                if status.is_server_error() {
                    if !last_attempt {
                        log::warn!("  HTTP {status} (server error)");
                        last_error = Some(GeocodeError::Status { status });
                        continue;
                    }
                    return Err(GeocodeError::Status { status });
                }

                if status.is_client_error() {
                    return Err(GeocodeError::Status { status });
                }

                return Ok(response);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| GeocodeError::Parse {
        message: "request failed after all retries".to_string(),
    }))
}

/// Delay before retry number `attempt` (1-based).
const fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt)
}

fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect()
}
