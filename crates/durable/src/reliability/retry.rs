//! Retry policy and governor

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// `initial_interval × retry_number` (1x, 2x, 3x, ...)
    Linear,
    /// `initial_interval × coefficient^(retry_number - 1)` (1x, 2x, 4x, ... for 2.0)
    Exponential { coefficient: f64 },
}

/// Configuration for retries
///
/// # Example
///
/// ```
/// use scrivener_durable::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::linear(Duration::from_secs(2))
///     .with_max_attempts(3);
///
/// // Wait 2s after the first failure, 4s after the second
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
/// assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including initial)
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(with = "duration_millis")]
    pub initial_interval: Duration,

    /// Maximum delay between retries
    #[serde(with = "duration_millis")]
    pub max_interval: Duration,

    /// Delay growth between retries
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(Duration::from_secs(2))
    }
}

impl RetryPolicy {
    /// Linear backoff: 3 attempts, delay grows by `base` per failed attempt
    pub fn linear(base: Duration) -> Self {
        Self {
            max_attempts: 3,
            initial_interval: base,
            max_interval: Duration::from_secs(300),
            backoff: Backoff::Linear,
        }
    }

    /// Set the maximum number of attempts (at least 1)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the backoff strategy
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Calculate delay for a given attempt number (1-based)
    ///
    /// Returns the duration to wait before that attempt starts.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let retry_num = attempt - 1; // First retry is after attempt 1
        let base = match self.backoff {
            Backoff::Linear => self.initial_interval.as_secs_f64() * retry_num as f64,
            Backoff::Exponential { coefficient } => {
                self.initial_interval.as_secs_f64() * coefficient.powi(retry_num as i32 - 1)
            }
        };
        Duration::from_secs_f64(base.min(self.max_interval.as_secs_f64()))
    }
}

/// Terminal failure of a governed operation
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Every allowed attempt failed
    #[error("exhausted {attempts} attempts: {source}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The classifier declared the failure non-retryable
    #[error("non-retryable failure on attempt {attempt}: {source}")]
    Permanent {
        attempt: u32,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::ExhaustedRetries { attempts, .. } => *attempts,
            RetryError::Permanent { attempt, .. } => *attempt,
        }
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up
///
/// `op` receives the 1-based attempt number. Every error triggers the next
/// attempt after [`RetryPolicy::delay_for_attempt`]. A returned `Ok` value is
/// never inspected; judging its quality is the caller's business.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, label: &str, op: F) -> Result<T, RetryError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_if(policy, label, op, |_| true).await
}

/// Like [`retry`], but stops early when `is_retryable` rejects an error
pub async fn retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
    is_retryable: P,
) -> Result<T, RetryError<E>>
where
    E: std::error::Error + 'static,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(task = %label, attempt, "Attempt succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if !is_retryable(&e) => {
                warn!(task = %label, attempt, error = %e, "Non-retryable failure");
                return Err(RetryError::Permanent { attempt, source: e });
            }
            Err(e) if attempt >= max_attempts => {
                warn!(task = %label, attempt, max_attempts, error = %e, "Retries exhausted");
                return Err(RetryError::ExhaustedRetries {
                    attempts: attempt,
                    source: e,
                });
            }
            Err(e) => {
                attempt += 1;
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    task = %label,
                    attempt = attempt - 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_defaults() {
        let policy = RetryPolicy::linear(Duration::from_secs(2));
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Backoff::Linear);
    }

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::linear(Duration::from_millis(500));

        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(1000));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(1500));
    }

    #[test]
    fn test_exponential_delays() {
        let policy = RetryPolicy::linear(Duration::from_secs(1))
            .with_backoff(Backoff::Exponential { coefficient: 2.0 });

        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_secs(4));
    }

    #[test]
    fn test_max_interval_cap() {
        let mut policy = RetryPolicy::linear(Duration::from_secs(1))
            .with_backoff(Backoff::Exponential { coefficient: 2.0 });
        policy.max_interval = Duration::from_secs(5);

        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(5));
    }

    #[test]
    fn test_max_attempts_floor() {
        let policy = RetryPolicy::default().with_max_attempts(0);
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn test_delays_strictly_increase() {
        for backoff in [Backoff::Linear, Backoff::Exponential { coefficient: 2.0 }] {
            let policy = RetryPolicy::linear(Duration::from_millis(250)).with_backoff(backoff);
            let delays: Vec<_> = (2..=5).map(|n| policy.delay_for_attempt(n)).collect();
            assert!(delays.windows(2).all(|w| w[0] < w[1]), "{backoff:?}: {delays:?}");
        }
    }

    #[test]
    fn test_serialization() {
        let policy = RetryPolicy::linear(Duration::from_millis(1500))
            .with_backoff(Backoff::Exponential { coefficient: 1.5 })
            .with_max_attempts(10);

        let json = serde_json::to_string(&policy).unwrap();
        let parsed: RetryPolicy = serde_json::from_str(&json).unwrap();

        assert_eq!(policy, parsed);
    }
}
