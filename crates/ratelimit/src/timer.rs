//! Task-start timing - minimum-duration validation for completions

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Default minimum time between start and completion (ms)
pub const DEFAULT_MIN_DURATION_MS: i64 = 3_000;

/// Start records older than this are treated as absent
const MAX_AGE_MINUTES: i64 = 30;

/// Result of validating a completion against its recorded start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionTiming {
    /// True when the elapsed time met the minimum duration
    pub valid: bool,
    /// Elapsed milliseconds since the recorded start (0 when unknown)
    pub duration_ms: i64,
}

/// In-memory start timestamps, consumed exactly once per task.
///
/// A validation always removes the record, so replaying a completion cannot
/// reuse a favorable timing. Unknown and expired (> 30 min) task ids are
/// invalid.
pub struct TaskTimer {
    starts: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl TaskTimer {
    pub fn new() -> Self {
        Self {
            starts: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_start(&self, task_id: &str) {
        self.record_start_at(task_id, Utc::now());
    }

    pub fn record_start_at(&self, task_id: &str, now: DateTime<Utc>) {
        self.lock().insert(task_id.to_string(), now);
    }

    /// Validate and consume the start record for a task
    pub fn validate_completion(&self, task_id: &str, min_duration_ms: i64) -> CompletionTiming {
        self.validate_completion_at(task_id, min_duration_ms, Utc::now())
    }

    pub fn validate_completion_at(
        &self,
        task_id: &str,
        min_duration_ms: i64,
        now: DateTime<Utc>,
    ) -> CompletionTiming {
        let started = self.lock().remove(task_id);

        let Some(started) = started else {
            return CompletionTiming {
                valid: false,
                duration_ms: 0,
            };
        };

        let duration_ms = (now - started).num_milliseconds();
        if duration_ms > MAX_AGE_MINUTES * 60 * 1000 {
            return CompletionTiming {
                valid: false,
                duration_ms,
            };
        }

        CompletionTiming {
            valid: duration_ms >= min_duration_ms,
            duration_ms,
        }
    }

    /// Drop start records older than 30 minutes. Returns the number removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let max_age = Duration::minutes(MAX_AGE_MINUTES);
        let mut starts = self.lock();
        let before = starts.len();
        starts.retain(|_, started| now - *started <= max_age);
        before - starts.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        self.starts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for TaskTimer {
    fn default() -> Self {
        Self::new()
    }
}
