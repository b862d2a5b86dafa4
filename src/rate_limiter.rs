// =============================================================================
// Rate Limiter — lazy-refill token bucket for outbound API calls
// =============================================================================
//
// Capacity tokens, refilled lazily by elapsed wall-clock time on each
// `allow()` call rather than by a background timer. `allow()` is a boolean
// admission check: callers treat `false` as "skip this tick, do not queue."
// =============================================================================

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

pub struct RateLimiter {
    capacity: u32,
    interval: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(capacity: u32, interval: Duration) -> Self {
        Self {
            capacity,
            interval,
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Refill to `min(capacity, current + floor(elapsed / interval))`, then
    /// consume one token if available.
    pub fn allow(&self) -> bool {
        let mut bucket = self.bucket.lock().unwrap();
        self.refill(&mut bucket);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        if self.interval.is_zero() {
            bucket.tokens = self.capacity;
            return;
        }
        let elapsed = bucket.last_refill.elapsed();
        let intervals_elapsed = (elapsed.as_nanos() / self.interval.as_nanos().max(1)) as u32;
        if intervals_elapsed > 0 {
            bucket.tokens = self.capacity.min(bucket.tokens.saturating_add(intervals_elapsed));
            bucket.last_refill += self.interval * intervals_elapsed;
        }
    }

    pub fn available(&self) -> u32 {
        let mut bucket = self.bucket.lock().unwrap();
        self.refill(&mut bucket);
        bucket.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn allows_up_to_capacity_then_denies() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[test]
    fn refills_after_interval_elapses() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.allow());
        assert!(!limiter.allow());
        sleep(Duration::from_millis(30));
        assert!(limiter.allow());
    }

    #[test]
    fn never_exceeds_capacity_even_after_long_idle() {
        let limiter = RateLimiter::new(2, Duration::from_millis(1));
        sleep(Duration::from_millis(50));
        assert_eq!(limiter.available(), 2);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[test]
    fn capacity_one_interval_one_second_allows_one_per_second() {
        let limiter = RateLimiter::new(1, Duration::from_millis(50));
        let mut allowed = 0;
        for _ in 0..5 {
            if limiter.allow() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 1);
    }
}
