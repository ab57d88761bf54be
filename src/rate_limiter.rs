//! Per-client sliding window rate limiting.
//!
//! Each client key owns the instants of its admitted requests that still fall
//! inside the trailing window. Entries are purged lazily on every check, and
//! once the table grows past its sweep trigger every key is purged and the
//! empty ones are evicted. The trigger starts at `sweep_threshold` and is moved
//! to twice the surviving key count after each sweep, so a table full of active
//! keys is swept once per doubling rather than on every request.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use validator::{Validate, ValidationError};

/// Limits applied to every client key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RateLimitSettings {
    #[validate(range(min = 1))]
    pub max_requests: u32,
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_window"))]
    pub window: Duration,
    #[validate(range(min = 1))]
    pub sweep_threshold: usize,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
            sweep_threshold: 1000,
        }
    }
}

fn non_zero_window(window: &Duration) -> Result<(), ValidationError> {
    if window.is_zero() {
        return Err(ValidationError::new("window must be greater than zero"));
    }
    Ok(())
}

#[derive(Debug)]
struct WindowTable {
    windows: HashMap<String, VecDeque<Instant>>,
    /// Key count above which the next admission sweeps the table.
    sweep_trigger: usize,
}

impl WindowTable {
    fn new(sweep_threshold: usize) -> Self {
        Self {
            windows: HashMap::new(),
            sweep_trigger: sweep_threshold,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    settings: RateLimitSettings,
    windows: Arc<Mutex<WindowTable>>,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> PipelineResult<Self> {
        settings
            .validate()
            .map_err(|e| PipelineError::Configuration(format!("invalid rate limit settings: {}", e)))?;

        Ok(Self {
            windows: Arc::new(Mutex::new(WindowTable::new(settings.sweep_threshold))),
            settings,
        })
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    /// Check and record a request for `key` at the current instant.
    pub fn admit(&self, key: &str) -> PipelineResult<bool> {
        self.admit_at(key, Instant::now())
    }

    /// Check and record a request for `key` at `now`.
    ///
    /// A rejected request is not recorded, so a client hammering the limit does
    /// not extend its own lockout.
    pub fn admit_at(&self, key: &str, now: Instant) -> PipelineResult<bool> {
        let mut table = self.lock()?;

        let timestamps = table.windows.entry(key.to_string()).or_default();
        purge(timestamps, now, self.settings.window);

        let admitted = if timestamps.len() >= self.settings.max_requests as usize {
            false
        } else {
            timestamps.push_back(now);
            true
        };

        if table.windows.len() > table.sweep_trigger {
            let evicted = sweep(&mut table.windows, now, self.settings.window);
            let remaining = table.windows.len();
            table.sweep_trigger = self.settings.sweep_threshold.max(remaining.saturating_mul(2));
            tracing::debug!(
                target: "event_gate::rate_limiter",
                evicted,
                remaining,
                next_sweep_above = table.sweep_trigger,
                "Swept idle rate limit keys"
            );
        }

        Ok(admitted)
    }

    /// Purge every key at `now` and evict those left empty. Returns the number
    /// of evicted keys.
    pub fn sweep_at(&self, now: Instant) -> PipelineResult<usize> {
        let mut table = self.lock()?;
        Ok(sweep(&mut table.windows, now, self.settings.window))
    }

    /// Requests currently counted against `key` (without purging).
    pub fn requests_in_window(&self, key: &str) -> PipelineResult<usize> {
        let table = self.lock()?;
        Ok(table.windows.get(key).map_or(0, VecDeque::len))
    }

    pub fn tracked_keys(&self) -> PipelineResult<usize> {
        Ok(self.lock()?.windows.len())
    }

    /// Key count above which the next admission triggers a sweep.
    pub fn sweep_trigger(&self) -> PipelineResult<usize> {
        Ok(self.lock()?.sweep_trigger)
    }

    /// Forget everything recorded for `key`.
    pub fn reset(&self, key: &str) -> PipelineResult<()> {
        self.lock()?.windows.remove(key);
        Ok(())
    }

    fn lock(&self) -> PipelineResult<MutexGuard<'_, WindowTable>> {
        self.windows
            .lock()
            .map_err(|_| PipelineError::Internal("Failed to acquire lock on rate limit table".to_string()))
    }
}

/// Drop timestamps that are `window` old or older. Timestamps are appended in
/// arrival order, so expired ones are always at the front.
fn purge(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = timestamps.front() {
        if now.saturating_duration_since(*oldest) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

fn sweep(windows: &mut HashMap<String, VecDeque<Instant>>, now: Instant, window: Duration) -> usize {
    let before = windows.len();
    windows.retain(|_, timestamps| {
        purge(timestamps, now, window);
        !timestamps.is_empty()
    });
    before - windows.len()
}
