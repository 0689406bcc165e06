//! Rate limiting and retry for remote calls.
//!
//! Every call to either collaborator goes through [`Throttle::call`]:
//!
//! 1. Wait until `min_interval` has passed since the previous call.
//! 2. Issue the call.
//! 3. On a transient failure, back off (`initial_backoff * 2^n`, capped at
//!    `max_backoff`, never shorter than a retry-after hint) and retry, up to
//!    `max_attempts` calls in total.
//! 4. Permanent failures return immediately.

use std::thread;
use std::time::{Duration, Instant};

use tabsync_core::config::RetryConfig;
use tabsync_core::{RemoteError, SyncConfig};

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// A single attempt, no retry.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Paces and retries remote calls for one sync run.
#[derive(Debug)]
pub struct Throttle {
    min_interval: Duration,
    policy: RetryPolicy,
    last_call: Option<Instant>,
    calls: u64,
    retries: u64,
}

impl Throttle {
    pub fn new(min_interval: Duration, policy: RetryPolicy) -> Self {
        Self {
            min_interval,
            policy,
            last_call: None,
            calls: 0,
            retries: 0,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.rate_limit_delay(),
            RetryPolicy::from_config(&config.retry),
        )
    }

    /// Remote calls issued so far, retries included.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn retries(&self) -> u64 {
        self.retries
    }

    /// Run `op` under the rate limit and retry policy.
    pub fn call<T, F>(&mut self, what: &str, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Result<T, RemoteError>,
    {
        let mut attempt = 1;
        loop {
            self.pace();
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < self.policy.max_attempts => {
                    let mut delay = self.policy.backoff(attempt);
                    if let Some(hint) = err.retry_after() {
                        delay = delay.max(hint);
                    }
                    tracing::warn!(
                        "{what}: {err}; retry {attempt}/{} in {}ms",
                        self.policy.max_attempts - 1,
                        delay.as_millis()
                    );
                    self.retries += 1;
                    attempt += 1;
                    thread::sleep(delay);
                }
                Err(err) => {
                    tracing::debug!("{what}: giving up after {attempt} attempt(s): {err}");
                    return Err(err);
                }
            }
        }
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last_call = Some(Instant::now());
        self.calls += 1;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn fast(max_attempts: u32) -> Throttle {
        Throttle::new(
            Duration::ZERO,
            RetryPolicy {
                max_attempts,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
            },
        )
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(1_500),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(1_500));
        assert_eq!(policy.backoff(30), Duration::from_millis(1_500));
    }

    #[test]
    fn transient_failures_are_retried_until_success() {
        let mut throttle = fast(3);
        let attempts = Cell::new(0);
        let result = throttle.call("op", || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 3 {
                Err(RemoteError::from_status(503, "unavailable"))
            } else {
                Ok("done")
            }
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.get(), 3);
        assert_eq!(throttle.retries(), 2);
        assert_eq!(throttle.calls(), 3);
    }

    #[test]
    fn retries_are_bounded() {
        let mut throttle = fast(2);
        let attempts = Cell::new(0);
        let result: Result<(), _> = throttle.call("op", || {
            attempts.set(attempts.get() + 1);
            Err(RemoteError::transient("timeout"))
        });
        assert!(result.unwrap_err().is_transient());
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn permanent_failures_are_not_retried() {
        let mut throttle = fast(3);
        let attempts = Cell::new(0);
        let result: Result<(), _> = throttle.call("op", || {
            attempts.set(attempts.get() + 1);
            Err(RemoteError::from_status(404, "not found"))
        });
        assert!(!result.unwrap_err().is_transient());
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn retry_after_hint_extends_the_delay() {
        let mut throttle = fast(2);
        let attempts = Cell::new(0);
        let started = Instant::now();
        let _ = throttle.call("op", || {
            attempts.set(attempts.get() + 1);
            if attempts.get() == 1 {
                Err(RemoteError::Transient {
                    status: Some(429),
                    message: "slow down".into(),
                    retry_after: Some(Duration::from_millis(30)),
                })
            } else {
                Ok(())
            }
        });
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn calls_are_spaced_by_min_interval() {
        let mut throttle = Throttle::new(Duration::from_millis(20), RetryPolicy::none());
        let started = Instant::now();
        for _ in 0..3 {
            throttle.call("op", || Ok::<_, RemoteError>(())).unwrap();
        }
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
