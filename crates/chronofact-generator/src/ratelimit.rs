// SPDX-FileCopyrightText: 2026 Chronofact Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide token-bucket limiter for LLM calls.
//!
//! The bucket holds one minute's worth of calls and refills continuously.
//! Callers block until a token is available or their deadline passes, at
//! which point they fail with `RateLimited`.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use chronofact_core::error::ChronofactError;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket shared across every generator call in the process.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<BucketState>,
    capacity: f64,
    tokens_per_sec: f64,
}

impl RateLimiter {
    /// Create a limiter allowing `rate_per_min` calls per minute.
    pub fn new(rate_per_min: u32) -> Self {
        let capacity = f64::from(rate_per_min.max(1));
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            tokens_per_sec: capacity / 60.0,
        }
    }

    /// Take one token, waiting until one accrues or the deadline passes.
    pub async fn acquire(&self, deadline: Instant) -> Result<(), ChronofactError> {
        loop {
            let wait = {
                let mut state = self
                    .state
                    .lock()
                    .map_err(|e| ChronofactError::Internal(format!("rate limiter poisoned: {e}")))?;

                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.tokens_per_sec).min(self.capacity);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - state.tokens) / self.tokens_per_sec)
            };

            let now = Instant::now();
            if now + wait > deadline {
                return Err(ChronofactError::RateLimited);
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Tokens currently in the bucket (for diagnostics).
    pub fn available(&self) -> f64 {
        self.state.lock().map(|s| s.tokens).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_bucket_grants_immediately() {
        let limiter = RateLimiter::new(60);
        let deadline = Instant::now() + Duration::from_millis(10);
        limiter.acquire(deadline).await.unwrap();
    }

    #[tokio::test]
    async fn exhausted_bucket_fails_past_deadline() {
        let limiter = RateLimiter::new(1);
        let deadline = Instant::now() + Duration::from_millis(50);
        limiter.acquire(deadline).await.unwrap();
        // Next token accrues in ~60s, far past the deadline.
        let err = limiter.acquire(deadline).await.unwrap_err();
        assert!(matches!(err, ChronofactError::RateLimited));
    }

    #[tokio::test(start_paused = true)]
    async fn bucket_refills_over_time() {
        let limiter = RateLimiter::new(60); // one token per second
        for _ in 0..60 {
            limiter
                .acquire(Instant::now() + Duration::from_millis(1))
                .await
                .unwrap();
        }
        assert!(limiter.available() < 1.0);

        tokio::time::advance(Duration::from_secs(2)).await;
        limiter
            .acquire(Instant::now() + Duration::from_millis(1))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn waiter_succeeds_when_token_accrues_before_deadline() {
        let limiter = RateLimiter::new(60); // one token per second
        for _ in 0..60 {
            limiter
                .acquire(Instant::now() + Duration::from_millis(1))
                .await
                .unwrap();
        }
        // Deadline is 5 simulated seconds out; the next token arrives in ~1.
        limiter
            .acquire(Instant::now() + Duration::from_secs(5))
            .await
            .unwrap();
    }
}
