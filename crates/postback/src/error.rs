//! Postback error taxonomy
//!
//! The first four variants are caller faults and map to 4xx responses;
//! everything else is internal and must surface to the network as an opaque
//! failure so a probing caller learns nothing.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PostbackError {
    #[error("missing or empty field: {0}")]
    MissingField(&'static str),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("unknown user: {0}")]
    UserNotFound(String),

    #[error("audit log error: {0}")]
    AuditLog(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(#[from] taskpay_store::StoreError),
}

impl PostbackError {
    /// True for errors caused by the caller's request rather than by us
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            PostbackError::MissingField(_)
                | PostbackError::InvalidAmount(_)
                | PostbackError::InvalidSignature
                | PostbackError::UserNotFound(_)
        )
    }
}
