//! Per-pipeline rate limiting and evaluation serialization.
//!
//! Both are single-process state: they do not survive a restart and do not
//! coordinate across instances. A multi-instance deployment must supply a
//! `RateLimiter` backed by a shared store with atomic check-and-set, and an
//! equivalent distributed lock in place of `PipelineLocks`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Check-and-set rate limiter keyed by pipeline id.
pub trait RateLimiter: Send + Sync {
    /// Atomically verify that `key` last acted at least `cooldown` ago and
    /// mark it as acting now. On denial, returns the remaining wait.
    fn try_acquire(&self, key: &str, cooldown: Duration) -> Result<(), Duration>;
}

#[derive(Debug, Default)]
pub struct InMemoryRateLimiter {
    last_action: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter for InMemoryRateLimiter {
    fn try_acquire(&self, key: &str, cooldown: Duration) -> Result<(), Duration> {
        let mut last_action = self.last_action.lock().unwrap();
        let now = Instant::now();

        if let Some(last) = last_action.get(key) {
            let elapsed = now.duration_since(*last);
            if elapsed < cooldown {
                return Err(cooldown - elapsed);
            }
        }
        last_action.insert(key.to_string(), now);
        Ok(())
    }
}

/// Hands out one async mutex per pipeline, so that a cooldown
/// check-then-act sequence cannot race with a concurrent evaluation of the
/// same pipeline.
#[derive(Debug, Default)]
pub struct PipelineLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PipelineLocks {
    pub fn lock_for(&self, pipeline_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks
            .entry(pipeline_id.to_string())
            .or_default()
            .clone()
    }
}
