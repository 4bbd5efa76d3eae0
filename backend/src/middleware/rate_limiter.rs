//! Per-key token bucket rate limiting
//!
//! The issuance endpoint keys buckets by agent id.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy)]
struct Refill {
    per_second: f64,
    capacity: f64,
}

#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    touched_at: Instant,
}

impl Bucket {
    fn full(refill: Refill, now: Instant) -> Self {
        Self {
            tokens: refill.capacity,
            touched_at: now,
        }
    }

    fn take(&mut self, refill: Refill, now: Instant) -> bool {
        let idle = now.saturating_duration_since(self.touched_at).as_secs_f64();
        self.tokens = (self.tokens + idle * refill.per_second).min(refill.capacity);
        self.touched_at = now;

        if self.tokens < 1.0 {
            return false;
        }
        self.tokens -= 1.0;
        true
    }
}

/// Rate limiter with one bucket per key
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, Bucket>>>,
    refill: Refill,
}

impl RateLimiter {
    /// `requests_per_minute` sustained, with bursts up to the same amount.
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let per_minute = f64::from(requests_per_minute.max(1));
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            refill: Refill {
                per_second: per_minute / 60.0,
                capacity: per_minute,
            },
        }
    }

    /// Take one token for `key`; `false` means the caller is over the limit.
    pub async fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> bool {
        let refill = self.refill;
        let mut buckets = self.buckets.write().await;
        buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::full(refill, now))
            .take(refill, now)
    }

    /// Drop buckets idle for longer than `max_age`.
    pub async fn cleanup(&self, max_age: Duration) {
        let now = Instant::now();
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.touched_at) < max_age);

        let dropped = before - buckets.len();
        if dropped > 0 {
            tracing::debug!(dropped, remaining = buckets.len(), "Rate limiter buckets pruned");
        }
    }

    pub async fn tracked_keys(&self) -> usize {
        self.buckets.read().await.len()
    }
}
