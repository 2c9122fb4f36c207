//! Postback processing pipeline

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use taskpay_core::Amount;
use taskpay_store::{Severity, Store, StoreError, Task, TaskStatus};
use tracing::{info, warn};

use crate::config::PostbackConfig;
use crate::error::PostbackError;
use crate::log::PostbackLog;
use crate::signature::verify_signature;

/// Fields a network sends on a conversion. Everything arrives as strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostbackPayload {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub offer_name: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostbackStatus {
    /// This transaction id was seen before; nothing changed
    AlreadyProcessed,
    /// Credited immediately
    Approved,
    /// Recorded and queued for manual review
    PendingReview,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostbackOutcome {
    pub status: PostbackStatus,
    pub task_id: String,
    pub earned_amount: Amount,
    pub new_balance: Amount,
}

/// Runs the ingestion pipeline: audit, validate, verify, dedupe, record,
/// optionally credit. Holds no mutable state of its own; all writes go
/// through the store and the audit log.
#[derive(Clone)]
pub struct PostbackProcessor {
    store: Store,
    log: Arc<PostbackLog>,
    config: PostbackConfig,
}

impl PostbackProcessor {
    pub fn new(store: Store, log: Arc<PostbackLog>, config: PostbackConfig) -> Self {
        Self { store, log, config }
    }

    /// Process one postback. Internal failures are recorded as a critical
    /// monitoring event before propagating, so the caller can answer the
    /// network with an opaque error.
    pub async fn process(
        &self,
        payload: &PostbackPayload,
        now: DateTime<Utc>,
    ) -> Result<PostbackOutcome, PostbackError> {
        let started = Instant::now();
        match self.process_inner(payload, started, now).await {
            Ok(outcome) => Ok(outcome),
            Err(e) if e.is_client_fault() => Err(e),
            Err(e) => {
                // Best effort: the original error wins even if logging fails
                let _ = self
                    .store
                    .log_event(
                        "postback_error",
                        Severity::Critical,
                        json!({
                            "transaction_id": payload.transaction_id,
                            "error": e.to_string(),
                        }),
                        now,
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn process_inner(
        &self,
        payload: &PostbackPayload,
        started: Instant,
        now: DateTime<Utc>,
    ) -> Result<PostbackOutcome, PostbackError> {
        // 1. Audit the raw payload before anything can reject it
        self.log.append(&serde_json::to_value(payload)?, now)?;

        // 2. Required fields and a sane amount
        let amount = match self.validate(payload) {
            Ok(amount) => amount,
            Err(e) => {
                self.store
                    .log_event(
                        "postback_invalid_params",
                        Severity::Warning,
                        json!({
                            "transaction_id": payload.transaction_id,
                            "error": e.to_string(),
                        }),
                        now,
                    )
                    .await?;
                return Err(e);
            }
        };

        // 3. Signature, when both a secret and a signature are present
        self.verify(payload, now).await?;

        // 4. Fast-path dedupe; the unique index below is the real guard
        if let Some(existing) = self
            .store
            .find_task_by_external_tx(&payload.transaction_id)
            .await?
        {
            return self.already_processed(existing).await;
        }

        // 5. The user must exist before we record money against them
        let user = match self.store.get_user(&payload.user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => {
                self.store
                    .log_event(
                        "postback_user_not_found",
                        Severity::Warning,
                        json!({
                            "transaction_id": payload.transaction_id,
                            "user_id": payload.user_id,
                        }),
                        now,
                    )
                    .await?;
                return Err(PostbackError::UserNotFound(payload.user_id.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        // 6. Record the task; a concurrent duplicate loses here
        let (status, task_status, earned) = if self.config.auto_approve {
            (PostbackStatus::Approved, TaskStatus::Approved, amount)
        } else {
            (
                PostbackStatus::PendingReview,
                TaskStatus::Completed,
                Amount::ZERO,
            )
        };

        let mut task = Task::from_postback(
            &user.user_id,
            payload.provider.clone().unwrap_or_else(|| "unknown".into()),
            &payload.transaction_id,
            amount,
            payload.offer_name.clone(),
            payload.currency.clone(),
            task_status,
            earned,
            now,
        );
        // Unapproved external conversions go to the review queue
        task.flagged = status == PostbackStatus::PendingReview;

        match self.store.insert_task(&task).await {
            Ok(()) => {}
            Err(StoreError::DuplicateTransaction(tx)) => {
                let existing = self
                    .store
                    .find_task_by_external_tx(&tx)
                    .await?
                    .ok_or(StoreError::DuplicateTransaction(tx))?;
                return self.already_processed(existing).await;
            }
            Err(e) => return Err(e.into()),
        }

        // 7. Credit and bump activity on the auto-approve path
        if status == PostbackStatus::Approved {
            self.store.credit_earnings(&user.user_id, earned, now).await?;
        }
        self.store.increment_activity(&user.user_id, now).await?;

        // 8. Success event with end-to-end latency
        let latency_ms = started.elapsed().as_millis() as u64;
        self.store
            .log_event(
                "postback_success",
                Severity::Info,
                json!({
                    "transaction_id": payload.transaction_id,
                    "user_id": user.user_id,
                    "task_id": task.task_id,
                    "status": status,
                    "amount": amount.to_string(),
                    "latency_ms": latency_ms,
                }),
                now,
            )
            .await?;
        info!(
            transaction_id = %payload.transaction_id,
            task_id = %task.task_id,
            ?status,
            latency_ms,
            "postback processed"
        );

        let balance = self.store.get_user(&user.user_id).await?.balance;
        Ok(PostbackOutcome {
            status,
            task_id: task.task_id,
            earned_amount: earned,
            new_balance: balance,
        })
    }

    fn validate(&self, payload: &PostbackPayload) -> Result<Amount, PostbackError> {
        if payload.user_id.trim().is_empty() {
            return Err(PostbackError::MissingField("user_id"));
        }
        if payload.transaction_id.trim().is_empty() {
            return Err(PostbackError::MissingField("transaction_id"));
        }
        if payload.amount.trim().is_empty() {
            return Err(PostbackError::MissingField("amount"));
        }

        let value: Decimal = payload
            .amount
            .parse()
            .map_err(|_| PostbackError::InvalidAmount(payload.amount.clone()))?;
        Amount::new(value).map_err(|_| PostbackError::InvalidAmount(payload.amount.clone()))
    }

    /// Verification runs only when both a secret is configured and the
    /// payload carries a signature; otherwise the postback is accepted
    /// unverified, but loudly.
    async fn verify(
        &self,
        payload: &PostbackPayload,
        now: DateTime<Utc>,
    ) -> Result<(), PostbackError> {
        let (secret, signature) = match (&self.config.secret, payload.signature.as_deref()) {
            (Some(secret), Some(signature)) => (secret, signature),
            _ => {
                // Operators should notice a missing secret or signature
                warn!(
                    transaction_id = %payload.transaction_id,
                    "postback accepted without signature verification"
                );
                self.store
                    .log_event(
                        "postback_unverified",
                        Severity::Warning,
                        json!({"transaction_id": payload.transaction_id}),
                        now,
                    )
                    .await?;
                return Ok(());
            }
        };

        let valid = verify_signature(
            secret,
            &payload.user_id,
            &payload.transaction_id,
            &payload.amount,
            signature,
        );
        if !valid {
            self.store
                .log_event(
                    "postback_invalid_signature",
                    Severity::Error,
                    json!({
                        "transaction_id": payload.transaction_id,
                        "user_id": payload.user_id,
                    }),
                    now,
                )
                .await?;
            return Err(PostbackError::InvalidSignature);
        }
        Ok(())
    }

    async fn already_processed(&self, existing: Task) -> Result<PostbackOutcome, PostbackError> {
        let balance = self.store.get_user(&existing.user_id).await?.balance;
        Ok(PostbackOutcome {
            status: PostbackStatus::AlreadyProcessed,
            task_id: existing.task_id,
            earned_amount: existing.earned_amount,
            new_balance: balance,
        })
    }
}
