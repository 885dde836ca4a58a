// ===============================
// src/retry.rs
// ===============================
//
// One retry policy for every outbound call: bounded attempts, exponential
// backoff capped at max_delay, small jitter to avoid thundering herds.
//
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Backoff before retry number `attempt` (1-based): base * 2^(attempt-1),
    /// capped, plus up to 250ms jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(6);
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0..=250);
        backoff + Duration::from_millis(jitter)
    }

    /// Run `op` until it succeeds or the attempt budget is spent. Returns the
    /// successful value together with the attempt count, or the last error.
    pub async fn run<T, E, Fut, F>(&self, label: &str, mut op: F) -> Result<(T, u32), (E, u32)>
    where
        E: std::fmt::Debug,
        Fut: Future<Output = Result<T, E>>,
        F: FnMut() -> Fut,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(v) => return Ok((v, attempt)),
                Err(e) if attempt >= self.max_attempts => return Err((e, attempt)),
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(?e, %label, attempt, delay_ms = delay.as_millis() as u64, "retrying");
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn stops_after_budget_is_spent() {
        let policy = fast_policy(3);
        let calls = AtomicU32::new(0);
        let res: Result<((), u32), (&str, u32)> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("boom") }
            })
            .await;
        let (_, attempts) = res.unwrap_err();
        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3, "no attempts past the budget");
    }

    #[tokio::test]
    async fn success_halts_further_attempts() {
        let policy = fast_policy(5);
        let calls = AtomicU32::new(0);
        let res: Result<(u32, u32), ((), u32)> = policy
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n >= 2 { Ok(n) } else { Err(()) }
                }
            })
            .await;
        let (value, attempts) = res.unwrap();
        assert_eq!(value, 2);
        assert_eq!(attempts, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(400),
        };
        // jitter adds at most 250ms on top
        assert!(policy.delay_for(1) >= Duration::from_millis(100));
        assert!(policy.delay_for(1) <= Duration::from_millis(350));
        assert!(policy.delay_for(2) >= Duration::from_millis(200));
        assert!(policy.delay_for(9) <= Duration::from_millis(650), "capped at max_delay + jitter");
    }
}
