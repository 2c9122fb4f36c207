//! Fixed-window rate limiter

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Configuration for a rate-limit window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: i64,

    /// Admitted operations per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

fn default_window_ms() -> i64 {
    10 * 60 * 1000
}

fn default_max_requests() -> u32 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
        }
    }
}

impl RateLimitConfig {
    /// Override defaults from `RATE_LIMIT_WINDOW_MS` / `RATE_LIMIT_MAX_REQUESTS`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_parse("RATE_LIMIT_WINDOW_MS") {
            config.window_ms = ms;
        }
        if let Some(max) = env_parse("RATE_LIMIT_MAX_REQUESTS") {
            config.max_requests = max;
        }
        config
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Outcome of a rate-limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Admissions left in the current window
    pub remaining: u32,
    /// Milliseconds until the window resets
    pub reset_in_ms: i64,
}

#[derive(Debug)]
struct WindowEntry {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Fixed-window counter map.
///
/// When a window expires the entry is replaced outright; stale counts are
/// never carried into the next window. Entries past their reset time are
/// garbage-collected by [`RateLimiter::sweep_at`], which the host schedules
/// periodically.
pub struct RateLimiter {
    config: RateLimitConfig,
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Check and count one operation for `key`
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_at(key, Utc::now())
    }

    /// Clock-injected variant of [`check`](Self::check)
    pub fn check_at(&self, key: &str, now: DateTime<Utc>) -> RateLimitDecision {
        let mut entries = self.lock();

        match entries.get_mut(key) {
            // Live window: count against it
            Some(entry) if now < entry.reset_at => {
                let reset_in_ms = (entry.reset_at - now).num_milliseconds();
                if entry.count >= self.config.max_requests {
                    tracing::debug!(key, reset_in_ms, "rate limit exceeded");
                    RateLimitDecision {
                        allowed: false,
                        remaining: 0,
                        reset_in_ms,
                    }
                } else {
                    entry.count += 1;
                    RateLimitDecision {
                        allowed: true,
                        remaining: self.config.max_requests - entry.count,
                        reset_in_ms,
                    }
                }
            }
            // No entry, or the window has passed: start fresh
            _ => {
                entries.insert(
                    key.to_string(),
                    WindowEntry {
                        count: 1,
                        reset_at: now + Duration::milliseconds(self.config.window_ms),
                    },
                );
                RateLimitDecision {
                    allowed: true,
                    remaining: self.config.max_requests.saturating_sub(1),
                    reset_in_ms: self.config.window_ms,
                }
            }
        }
    }

    /// Drop entries whose window has passed. Returns the number removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| now < e.reset_at);
        before - entries.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, WindowEntry>> {
        // A poisoned lock only means another thread panicked mid-update;
        // the counter state is still usable for throttling.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
