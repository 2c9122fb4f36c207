//! Reward and withdrawal ledgers
//!
//! Business rules over the store's atomic primitives. The task ledger drives
//! the pending → completed → approved/rejected lifecycle and is the only
//! place earnings are credited; the withdrawal ledger debits at request time
//! and refunds the exact debited amount on rejection, so a user's balance
//! can never double-spend a payout in flight.

pub mod error;
pub mod task;
pub mod withdrawal;

pub use error::LedgerError;
pub use task::{CompletionVerdict, TaskLedger};
pub use withdrawal::{WithdrawalConfig, WithdrawalLedger};
