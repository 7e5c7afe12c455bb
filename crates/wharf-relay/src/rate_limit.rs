//! Token-bucket rate limiting, keyed by source address.
//!
//! A fractional refill over elapsed wall-clock time, rather than a fixed
//! per-second reset, so a burst up to `burst` is allowed immediately and
//! the bucket then drains at `refill_per_sec`.

use std::net::IpAddr;
use std::time::Instant;

use dashmap::DashMap;

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

/// Per-IP token-bucket rate limiter.
pub struct RateLimiter {
    burst: f64,
    refill_per_sec: f64,
    buckets: DashMap<IpAddr, TokenBucket>,
}

impl RateLimiter {
    /// Create a limiter with the given burst size and refill rate.
    pub fn new(burst: u32, refill_per_sec: f64) -> Self {
        Self {
            burst: burst as f64,
            refill_per_sec,
            buckets: DashMap::new(),
        }
    }

    /// Consume one token for `ip`. Returns `false` if the bucket is empty.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut bucket = self.buckets.entry(ip).or_insert_with(|| TokenBucket {
            tokens: self.burst,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_per_sec).min(self.burst);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
