//! Task lifecycle: open, complete, approve, reject

use chrono::{DateTime, Utc};
use taskpay_core::Amount;
use taskpay_store::{Offer, OfferCategory, Store, Task, TaskStatus};
use tracing::info;

use crate::error::LedgerError;

/// Fraud verdict attached to a completion, computed by the caller
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionVerdict {
    pub fraud_score: u8,
    pub flagged: bool,
}

/// Drives the task state machine. Every transition goes through a
/// conditional store update, so a lost race surfaces as an error here
/// instead of a double credit.
#[derive(Clone)]
pub struct TaskLedger {
    store: Store,
}

impl TaskLedger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Open a pending task for an active offer. A user can hold at most one
    /// open (pending or completed) task per offer.
    pub async fn create_task(
        &self,
        user_id: &str,
        offer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Task, LedgerError> {
        // Existence checks up front so the error names the missing thing
        self.store.get_user(user_id).await?;
        let offer = self.store.get_offer(offer_id).await?;
        if offer.status != taskpay_store::OfferStatus::Active {
            return Err(LedgerError::OfferInactive(offer_id.to_string()));
        }

        if let Some(existing) = self.store.find_open_task(user_id, offer_id).await? {
            return Err(LedgerError::TaskAlreadyStarted {
                task_id: existing.task_id,
            });
        }

        let task = Task::opened(user_id, offer_id, now);
        self.store.insert_task(&task).await?;
        info!(task_id = %task.task_id, user_id, offer_id, "task opened");
        Ok(task)
    }

    /// Complete a pending task with its fraud verdict.
    ///
    /// View-only offers go straight to `approved` with zero earnings; all
    /// other categories land in `completed` and wait for approval. Activity
    /// counters bump on every accepted completion, flagged or not.
    pub async fn complete_task(
        &self,
        task_id: &str,
        proof_ref: Option<&str>,
        verdict: CompletionVerdict,
        now: DateTime<Utc>,
    ) -> Result<Task, LedgerError> {
        let task = self.store.get_task(task_id).await?;
        let offer = match &task.offer_id {
            Some(offer_id) => Some(self.store.get_offer(offer_id).await?),
            None => None,
        };

        let target = match offer.as_ref().map(|o| o.category) {
            Some(OfferCategory::ViewOnly) => TaskStatus::Approved,
            _ => TaskStatus::Completed,
        };

        let transitioned = self
            .store
            .mark_task_completed(
                task_id,
                target,
                proof_ref,
                verdict.fraud_score,
                verdict.flagged,
                now,
            )
            .await?;
        if !transitioned {
            return Err(LedgerError::AlreadyProcessed(format!("task {task_id}")));
        }

        self.store.increment_activity(&task.user_id, now).await?;
        info!(
            task_id,
            status = target.as_str(),
            fraud_score = verdict.fraud_score,
            flagged = verdict.flagged,
            "task completed"
        );

        self.store.get_task(task_id).await.map_err(Into::into)
    }

    /// Approve a task and credit its payout exactly once.
    ///
    /// The payout comes from the internal offer when there is one, otherwise
    /// from the amount the external network reported. The conditional
    /// transition is the double-credit guard: only the caller that wins it
    /// credits the balance.
    pub async fn approve_task(
        &self,
        task_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Task, LedgerError> {
        let task = self.store.get_task(task_id).await?;
        let payout = self.payout_for(&task).await?;

        let transitioned = self.store.mark_task_approved(task_id, payout).await?;
        if !transitioned {
            return Err(LedgerError::AlreadyProcessed(format!("task {task_id}")));
        }

        if !payout.is_zero() {
            self.store
                .credit_earnings(&task.user_id, payout, now)
                .await?;
        }
        info!(task_id, user_id = %task.user_id, payout = %payout, "task approved");

        self.store.get_task(task_id).await.map_err(Into::into)
    }

    /// Reject a task, zeroing its recorded earnings. Never touches the
    /// balance: an earlier approval's credit stays until an operator
    /// reverses it out of band.
    pub async fn reject_task(&self, task_id: &str, reason: &str) -> Result<Task, LedgerError> {
        self.store.get_task(task_id).await?;

        let transitioned = self.store.mark_task_rejected(task_id, reason).await?;
        if !transitioned {
            return Err(LedgerError::AlreadyProcessed(format!("task {task_id}")));
        }
        info!(task_id, reason, "task rejected");

        self.store.get_task(task_id).await.map_err(Into::into)
    }

    async fn payout_for(&self, task: &Task) -> Result<Amount, LedgerError> {
        if let Some(offer_id) = &task.offer_id {
            let offer: Offer = self.store.get_offer(offer_id).await?;
            return Ok(offer.payout);
        }
        Ok(task.external_amount.unwrap_or(Amount::ZERO))
    }
}
