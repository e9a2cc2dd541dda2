//! Fixed-delay retry for idempotent requests.

use std::time::Duration;

use log::{debug, warn};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::error::TransportError;
use super::request::RequestDescriptor;
use super::response::RawResponse;
use super::transport::Transport;

/// Retries after the first attempt.
pub const MAX_RETRIES: u32 = 3;

/// Delay between attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub enabled: bool,
    /// Retries beyond the first attempt.
    pub max_retries: u32,
    #[serde(rename = "delay_ms", with = "millis")]
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: MAX_RETRIES,
            delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }
}

/// Server errors are the only retryable outcome.
pub fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error()
}

/// Sends `request`, repeating it while the response is a 5xx.
///
/// Once the retries run out the last 5xx response is returned like any other.
/// A transport error ends the loop immediately and is not retried.
pub async fn send_with_retry<T>(
    transport: &T,
    request: &RequestDescriptor,
    policy: &RetryPolicy,
) -> Result<RawResponse, TransportError>
where
    T: Transport + ?Sized,
{
    let mut retries = 0;

    loop {
        let response = transport.send(request).await?;

        if !is_retryable(response.status) {
            return Ok(response);
        }

        if retries >= policy.max_retries {
            warn!(
                "{}: still {} after {} retries, returning it as is",
                request.target, response.status, retries
            );
            return Ok(response);
        }

        retries += 1;
        warn!(
            "{}: got {}, retry {}/{} in {}ms...",
            request.target,
            response.status,
            retries,
            policy.max_retries,
            policy.delay.as_millis()
        );
        tokio::time::sleep(policy.delay).await;
        debug!("{}: retrying", request.target);
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
