//! Fraud scoring - behavioral signals over completions and devices
//!
//! Scoring is additive over independent signals, clamped to 0..=100.
//! The pure scoring function lives in `score`; `scorer` gathers the
//! signals from the store and applies the configured threshold. Scores
//! flag tasks for human review, they never auto-reject.

pub mod config;
pub mod score;
pub mod scorer;

pub use config::FraudConfig;
pub use score::{compute_fraud_score, FraudSignals};
pub use scorer::{CapStatus, FraudScorer};
