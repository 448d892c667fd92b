//! Per-API-key token bucket rate limiting (§5): 100 requests / 60 s, hand
//! rolled since no ecosystem rate-limiting crate appears anywhere in the
//! retrieval corpus.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::{RATE_LIMIT_CAPACITY, RATE_LIMIT_WINDOW_SECS};

struct TokenBucket {
    tokens: f64,
    last_refill_secs: u64,
}

impl TokenBucket {
    fn new(now_secs: u64) -> Self {
        Self {
            tokens: RATE_LIMIT_CAPACITY as f64,
            last_refill_secs: now_secs,
        }
    }

    fn refill(&mut self, now_secs: u64) {
        let elapsed = now_secs.saturating_sub(self.last_refill_secs) as f64;
        if elapsed <= 0.0 {
            return;
        }
        let rate = RATE_LIMIT_CAPACITY as f64 / RATE_LIMIT_WINDOW_SECS as f64;
        self.tokens = (self.tokens + elapsed * rate).min(RATE_LIMIT_CAPACITY as f64);
        self.last_refill_secs = now_secs;
    }

    fn try_consume(&mut self, now_secs: u64) -> bool {
        self.refill(now_secs);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub struct RateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if the request is admitted, `false` if the caller's
    /// bucket is empty.
    pub fn check(&self, api_key: &str) -> bool {
        let now_secs = crate::time::now_secs();
        let mut buckets = self.buckets.lock().expect("rate limiter lock poisoned");
        let bucket = buckets
            .entry(api_key.to_string())
            .or_insert_with(|| TokenBucket::new(now_secs));
        bucket.try_consume(now_secs)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
