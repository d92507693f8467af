use crate::errors::SurfaceError;
use crate::surface::SurfaceOp;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 10;
pub const DEFAULT_BASE_DELAY_MS: u64 = 100;

/// Bounded retry with linear back-off.
///
/// After the n-th busy failure the wrapper waits `n * base_delay` before the
/// next attempt, so a call is tried at most `max_retries + 1` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    #[serde(with = "millis")]
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// No retries at all; the first busy signal propagates.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(retry)
    }
}

/// Runs `call` until it succeeds, fails with a non-transient error, or the
/// retry budget is spent. Exhaustion returns the last busy error.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: SurfaceOp,
    mut call: F,
) -> Result<T, SurfaceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SurfaceError>>,
{
    let mut retry = 0u32;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && retry < policy.max_retries => {
                retry += 1;
                let delay = policy.delay_for(retry);
                tracing::debug!(
                    operation = %operation,
                    attempt = retry,
                    delay_ms = delay.as_millis() as u64,
                    "surface busy, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::warn!(
                        operation = %operation,
                        attempts = policy.max_attempts(),
                        "retry budget exhausted"
                    );
                }
                return Err(err);
            }
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
