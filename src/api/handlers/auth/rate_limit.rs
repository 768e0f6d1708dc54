//! Rate limiting primitives for credential submissions.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Register,
    Login,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: Option<&str>, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

/// Fixed-window limiter: at most `max` requests per client IP and action
/// within each `window`. Requests without a client IP share one bucket.
#[derive(Debug)]
pub struct WindowRateLimiter {
    max: u32,
    window: Duration,
    buckets: Mutex<HashMap<(String, RateLimitAction), (Instant, u32)>>,
}

impl WindowRateLimiter {
    #[must_use]
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for WindowRateLimiter {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        buckets.retain(|_, (started, _)| now.duration_since(*started) < self.window);

        let key = (ip.unwrap_or("unknown").to_string(), action);
        let (_, count) = buckets.entry(key).or_insert((now, 0));
        if *count >= self.max {
            return RateLimitDecision::Limited;
        }
        *count += 1;
        RateLimitDecision::Allowed
    }
}
