//! Ledger error taxonomy

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("store error: {0}")]
    Store(#[from] taskpay_store::StoreError),

    #[error("offer is not active: {0}")]
    OfferInactive(String),

    #[error("user already has an open task for this offer: {task_id}")]
    TaskAlreadyStarted { task_id: String },

    #[error("already processed: {0}")]
    AlreadyProcessed(String),

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("amount below minimum withdrawal of {0}")]
    BelowMinimum(rust_decimal::Decimal),

    #[error("validation failed: {0}")]
    Validation(String),
}
