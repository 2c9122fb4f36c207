//! TaskPay RPC - CLI orchestration
//!
//! Wires the store, the rate limiter, the fraud scorer, the ledgers, and
//! postback ingestion behind a single application context and exposes them
//! as commands.

pub mod commands;
pub mod config;
pub mod context;

pub use config::AppConfig;
pub use context::AppContext;
