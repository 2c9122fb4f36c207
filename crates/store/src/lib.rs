//! TaskPay persistent state
//!
//! All financial state (user balances, task lifecycle, withdrawals) lives in
//! SQLite behind this crate. Two rules hold for every mutation exposed here:
//!
//! - Balance changes are single atomic SQL increments, never a read followed
//!   by a write of the full value.
//! - State transitions are conditional `UPDATE ... WHERE status = ...`
//!   statements whose `rows_affected()` tells the caller whether the
//!   transition actually happened. Losing the race is an observable outcome,
//!   not a silent overwrite.
//!
//! The unique partial index on `user_tasks.external_transaction_id` is the
//! idempotency guarantee for postback ingestion; any pre-check in application
//! code is an optimization only.

pub mod devices;
pub mod error;
pub mod models;
pub mod monitoring;
pub mod store;
pub mod tasks;
pub mod users;
pub mod withdrawals;

pub use error::StoreError;
pub use models::{
    DeviceRecord, MonitoringEvent, Offer, OfferCategory, OfferStatus, Severity, Task, TaskStatus,
    User, Withdrawal, WithdrawalStatus,
};
pub use store::Store;
