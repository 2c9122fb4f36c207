//! TaskPay Core - Domain types
//!
//! This crate contains the fundamental types used across TaskPay:
//! - `Amount`: Non-negative decimal wrapper for reward currency

pub mod amount;

pub use amount::{Amount, AmountError};
