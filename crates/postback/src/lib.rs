//! Server-to-server postback ingestion
//!
//! Affiliate networks report conversions by calling back with a transaction
//! id, an amount, and an HMAC signature. Ingestion is idempotent on the
//! transaction id: the database's unique index decides who wins a replay
//! race, and the loser reports "already processed" instead of crediting
//! twice. Every raw payload is appended to a JSONL audit log before any
//! validation runs.

pub mod config;
pub mod error;
pub mod ingest;
pub mod log;
pub mod signature;

pub use config::PostbackConfig;
pub use error::PostbackError;
pub use ingest::{PostbackOutcome, PostbackPayload, PostbackProcessor, PostbackStatus};
pub use log::PostbackLog;
pub use signature::{compute_signature, verify_signature};
