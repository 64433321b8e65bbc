use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Sliding-window request counter keyed by client address.
#[derive(Debug, Clone)]
pub struct IpRateLimiter {
    inner: Arc<Mutex<LimiterState>>,
    window: Duration,
    max_requests: usize,
}

#[derive(Debug)]
struct LimiterState {
    buckets: HashMap<String, VecDeque<Instant>>,
    last_sweep: Instant,
}

impl IpRateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LimiterState {
                buckets: HashMap::new(),
                last_sweep: Instant::now(),
            })),
            window,
            max_requests,
        }
    }

    pub fn allow(&self, key: &str) -> bool {
        self.allow_at(key, Instant::now())
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.inner.lock().buckets.len()
    }

    fn allow_at(&self, key: &str, now: Instant) -> bool {
        let mut state = self.inner.lock();

        // At most one full sweep per window keeps the map bounded by the
        // number of clients seen in the last window.
        if now.saturating_duration_since(state.last_sweep) > self.window {
            let window = self.window;
            state.buckets.retain(|_, queue| {
                prune(queue, now, window);
                !queue.is_empty()
            });
            state.last_sweep = now;
        }

        let queue = state.buckets.entry(key.to_string()).or_default();
        prune(queue, now, self.window);

        if queue.len() >= self.max_requests {
            return false;
        }

        queue.push_back(now);
        true
    }
}

fn prune(queue: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(front) = queue.front() {
        if now.saturating_duration_since(*front) > window {
            queue.pop_front();
        } else {
            break;
        }
    }
}
