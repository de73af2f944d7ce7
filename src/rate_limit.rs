use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Every N calls, drop map entries for clients with no attempts left in the
/// current window.
const SWEEP_INTERVAL: u64 = 64;

/// In-memory sliding-window rate limiter keyed by (bucket, client hash).
/// Applied to comment and question submission.
pub struct RateLimiter {
    entries: Mutex<HashMap<String, Vec<Instant>>>,
    calls: AtomicU64,
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            entries: Mutex::new(HashMap::new()),
            calls: AtomicU64::new(0),
        }
    }

    /// Record an attempt and return true if it is allowed (under the limit).
    /// `key` should be something like "comment:<ip_hash>".
    pub fn check_and_record(&self, key: &str, max_attempts: u64, window: Duration) -> bool {
        let mut map = self.entries.lock().unwrap();
        let now = Instant::now();
        let cutoff = now - window;

        // Periodic sweep, inline since there is no background worker to
        // expire clients that have gone quiet
        if self.calls.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == 0 {
            map.retain(|_, attempts| {
                attempts.retain(|t| *t > cutoff);
                !attempts.is_empty()
            });
        }

        let attempts = map.entry(key.to_string()).or_default();
        attempts.retain(|t| *t > cutoff);

        if (attempts.len() as u64) < max_attempts {
            attempts.push(now);
            true
        } else {
            false
        }
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
