//! Sliding-window request accounting for one model bucket.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Static description of a bucket: which model it fronts and its per-window cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Stable identifier, unique across all roles.
    pub key: String,
    /// Model name handed to the request task.
    pub model: String,
    /// Requests allowed per window.
    pub rpm: u32,
}

impl BucketConfig {
    pub fn new(key: &str, model: &str, rpm: u32) -> Self {
        Self {
            key: key.to_string(),
            model: model.to_string(),
            rpm,
        }
    }
}

/// Usage timestamps for one bucket within the trailing window.
///
/// Timestamps are kept in insertion order, so pruning only pops from the front.
#[derive(Debug, Clone)]
pub struct RateLimitBucket {
    pub config: BucketConfig,
    window: Duration,
    usage: VecDeque<Instant>,
}

impl RateLimitBucket {
    pub fn new(config: BucketConfig, window: Duration) -> Self {
        Self {
            config,
            window,
            usage: VecDeque::new(),
        }
    }

    /// Drop timestamps that fell out of the window ending at `now`.
    pub fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.usage.front() {
            if now.saturating_duration_since(*oldest) < self.window {
                break;
            }
            self.usage.pop_front();
        }
    }

    /// Prune, then report whether another request fits under the cap.
    pub fn has_capacity(&mut self, now: Instant) -> bool {
        self.prune(now);
        self.usage.len() < self.config.rpm as usize
    }

    /// Reserve a slot at `now` if one is free. Returns whether it was reserved.
    pub fn try_reserve(&mut self, now: Instant) -> bool {
        if !self.has_capacity(now) {
            return false;
        }
        self.usage.push_back(now);
        true
    }

    /// Requests counted in the current window (after pruning at `now`).
    pub fn in_window(&mut self, now: Instant) -> usize {
        self.prune(now);
        self.usage.len()
    }

    pub fn clear(&mut self) {
        self.usage.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    fn bucket(rpm: u32) -> RateLimitBucket {
        RateLimitBucket::new(BucketConfig::new("primary", "model-a", rpm), WINDOW)
    }

    #[test]
    fn reserves_until_cap() {
        let now = Instant::now();
        let mut bucket = bucket(2);
        assert!(bucket.try_reserve(now));
        assert!(bucket.try_reserve(now));
        assert!(!bucket.try_reserve(now));
        assert_eq!(bucket.in_window(now), 2);
    }

    #[test]
    fn window_slides_after_sixty_seconds() {
        let start = Instant::now();
        let mut bucket = bucket(1);
        assert!(bucket.try_reserve(start));
        assert!(!bucket.has_capacity(start + Duration::from_millis(59_999)));
        assert!(bucket.has_capacity(start + WINDOW));
        assert_eq!(bucket.in_window(start + WINDOW), 0);
    }

    #[test]
    fn prune_keeps_recent_entries() {
        let start = Instant::now();
        let mut bucket = bucket(5);
        bucket.try_reserve(start);
        bucket.try_reserve(start + Duration::from_secs(30));
        assert_eq!(bucket.in_window(start + Duration::from_secs(61)), 1);
    }

    #[test]
    fn clear_resets_usage() {
        let now = Instant::now();
        let mut bucket = bucket(1);
        bucket.try_reserve(now);
        bucket.clear();
        assert!(bucket.has_capacity(now));
    }
}
