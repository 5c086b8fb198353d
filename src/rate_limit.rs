// src/rate_limit.rs
//! Token-bucket admission control for outbound API calls.
//!
//! Refill is computed lazily from elapsed time at acquire, never from a
//! background tick. Acquisitions serialize on the bucket; the work a caller
//! performs after acquiring does not.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Token bucket with continuous refill and burst support.
#[derive(Debug)]
pub struct TokenBucketRateLimiter {
    rate: f64,
    burst: u32,
    inner: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucketRateLimiter {
    /// `rate_per_second` requests sustained, up to `burst` at once.
    pub fn new(rate_per_second: f64, burst: u32) -> Self {
        Self {
            rate: rate_per_second,
            burst,
            inner: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Acquire a single token, waiting if the bucket is empty.
    pub async fn acquire(&self) {
        self.acquire_many(1).await;
    }

    /// Acquire `n` tokens, waiting if necessary. Invariant: the bucket never
    /// holds more than `burst` tokens at any observation point.
    pub async fn acquire_many(&self, n: u32) {
        let mut bucket = self.inner.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(f64::from(self.burst));
        bucket.last_refill = now;

        let need = f64::from(n);
        if bucket.tokens >= need {
            bucket.tokens -= need;
            return;
        }

        // Not enough tokens: wait out the deficit, then start from empty.
        let wait = (need - bucket.tokens) / self.rate;
        tokio::time::sleep(Duration::from_secs_f64(wait)).await;
        bucket.tokens = 0.0;
        bucket.last_refill = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_is_admitted_immediately() {
        let rl = TokenBucketRateLimiter::new(1.0, 10);
        let start = Instant::now();
        for _ in 0..10 {
            rl.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn throughput_converges_to_rate() {
        // 12 immediate acquires against rate=1, burst=10 must take >= 2s.
        let rl = TokenBucketRateLimiter::new(1.0, 10);
        let start = Instant::now();
        for _ in 0..12 {
            rl.acquire().await;
        }
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn refill_is_capped_at_burst() {
        let rl = TokenBucketRateLimiter::new(10.0, 3);
        // Drain, then idle long enough to refill far past the cap.
        for _ in 0..3 {
            rl.acquire().await;
        }
        tokio::time::sleep(Duration::from_secs(60)).await;

        let start = Instant::now();
        for _ in 0..3 {
            rl.acquire().await;
        }
        // Only `burst` tokens are available despite the long idle period.
        assert_eq!(start.elapsed(), Duration::ZERO);
        rl.acquire().await;
        assert!(start.elapsed() > Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquirers_serialize_on_the_bucket() {
        use std::sync::Arc;

        let rl = Arc::new(TokenBucketRateLimiter::new(1.0, 1));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let rl = rl.clone();
            handles.push(tokio::spawn(async move { rl.acquire().await }));
        }
        for h in handles {
            h.await.expect("acquire task");
        }
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
