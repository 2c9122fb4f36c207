//! TaskPay rate limiting - process-local abuse dampening
//!
//! Two in-memory primitives guard the task-start path:
//!
//! - [`RateLimiter`]: fixed-window counters keyed by user id (and, in a
//!   second instance, by source IP).
//! - [`TaskTimer`]: start timestamps consumed exactly once to judge whether
//!   a completion took at least a minimum duration.
//!
//! Both are best-effort and process-local by design: their job is throttling
//! abuse, not correctness-critical accounting, so exact consistency across
//! horizontally scaled instances is explicitly not provided. Financial
//! correctness lives in the store's conditional updates instead.
//!
//! Every time-dependent call has an `*_at(..., now)` variant so tests can
//! fix the clock.

pub mod limiter;
pub mod timer;

pub use limiter::{RateLimitConfig, RateLimitDecision, RateLimiter};
pub use timer::{CompletionTiming, TaskTimer};
