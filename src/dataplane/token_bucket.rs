//! Token-bucket byte-rate limiter
//!
//! Continuous refill, integer byte arithmetic. All operations take an
//! explicit `now` so the shaper and its tests drive the clock.

use std::time::Instant;

/// Minimum burst capacity in bytes, regardless of rate.
const CAPACITY_FLOOR: u64 = 15_000;

/// Burst window: the bucket holds about 20 ms worth of the configured rate.
const BURST_DIVISOR: u64 = 50;

/// Byte-rate limiter with burst capacity.
#[derive(Debug)]
pub struct TokenBucket {
    tokens: u64,
    capacity: u64,
    rate_bytes_per_sec: u64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a bucket limiting to `rate_mbps` megabits per second,
    /// starting full.
    pub fn new(rate_mbps: f64, now: Instant) -> Self {
        let rate_bytes_per_sec = (rate_mbps * 1e6 / 8.0) as u64;
        let capacity = (rate_bytes_per_sec / BURST_DIVISOR).max(CAPACITY_FLOOR);

        Self {
            tokens: capacity,
            capacity,
            rate_bytes_per_sec,
            last_refill: now,
        }
    }

    /// Add tokens for the time elapsed since the last refill, saturating
    /// at capacity. `last_refill` only advances when at least one token
    /// accrued, so sub-token intervals are not lost to quantization.
    pub fn refill(&mut self, now: Instant) {
        let dt = now.saturating_duration_since(self.last_refill);
        let new_tokens = (dt.as_secs_f64() * self.rate_bytes_per_sec as f64) as u64;

        if new_tokens > 0 {
            self.tokens = (self.tokens + new_tokens).min(self.capacity);
            self.last_refill = now;
        }
    }

    /// Refill, then take `bytes` tokens if available.
    pub fn try_consume(&mut self, bytes: u64, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= bytes {
            self.tokens -= bytes;
            true
        } else {
            false
        }
    }

    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}
