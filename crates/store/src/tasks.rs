//! Offer and task records - inserts, conditional transitions, fraud aggregates

use crate::error::StoreError;
use crate::models::{Offer, OfferCategory, OfferStatus, Task, TaskStatus};
use crate::store::{fmt_ts, parse_opt_ts, parse_ts, Store};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use taskpay_core::Amount;

fn offer_from_row(row: &SqliteRow) -> Result<Offer, StoreError> {
    let payout: String = row.get("payout");
    let category: String = row.get("category");
    let status: String = row.get("status");

    Ok(Offer {
        offer_id: row.get("offer_id"),
        title: row.get("title"),
        payout: Amount::parse_lossy(&payout),
        category: OfferCategory::from_str(&category)
            .ok_or_else(|| StoreError::Corrupt(format!("offer category: {category}")))?,
        duration_seconds: row.get("duration_seconds"),
        status: OfferStatus::from_str(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("offer status: {status}")))?,
    })
}

fn task_from_row(row: &SqliteRow) -> Result<Task, StoreError> {
    let status: String = row.get("status");
    let earned_amount: String = row.get("earned_amount");
    let external_amount: Option<String> = row.get("external_amount");
    let fraud_score: i64 = row.get("fraud_score");
    let flagged: i64 = row.get("flagged");
    let opened_at: String = row.get("opened_at");
    let completed_at: Option<String> = row.get("completed_at");

    Ok(Task {
        task_id: row.get("task_id"),
        user_id: row.get("user_id"),
        offer_id: row.get("offer_id"),
        status: TaskStatus::from_str(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("task status: {status}")))?,
        earned_amount: Amount::parse_lossy(&earned_amount),
        external_amount: external_amount.map(|s| Amount::parse_lossy(&s)),
        external_transaction_id: row.get("external_transaction_id"),
        provider: row.get("provider"),
        offer_name: row.get("offer_name"),
        currency: row.get("currency"),
        fraud_score: fraud_score.clamp(0, 100) as u8,
        flagged: flagged != 0,
        proof_ref: row.get("proof_ref"),
        rejection_reason: row.get("rejection_reason"),
        opened_at: parse_ts(&opened_at)?,
        completed_at: parse_opt_ts(completed_at)?,
    })
}

impl Store {
    pub async fn insert_offer(&self, offer: &Offer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO offers (offer_id, title, payout, category, duration_seconds, status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&offer.offer_id)
        .bind(&offer.title)
        .bind(offer.payout.to_string())
        .bind(offer.category.as_str())
        .bind(offer.duration_seconds)
        .bind(offer.status.as_str())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn get_offer(&self, offer_id: &str) -> Result<Offer, StoreError> {
        let row = sqlx::query("SELECT * FROM offers WHERE offer_id = ?")
            .bind(offer_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("offer {offer_id}")))?;

        offer_from_row(&row)
    }

    /// Insert a task row.
    ///
    /// A unique-violation on the external transaction index is surfaced as
    /// [`StoreError::DuplicateTransaction`]; this is the correctness
    /// mechanism that resolves concurrent duplicate postbacks, and callers
    /// must treat it as "already processed", not as a failure.
    pub async fn insert_task(&self, task: &Task) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO user_tasks (task_id, user_id, offer_id, status, earned_amount,
                                    external_amount, external_transaction_id, provider,
                                    offer_name, currency, fraud_score, flagged, proof_ref,
                                    rejection_reason, opened_at, completed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.task_id)
        .bind(&task.user_id)
        .bind(&task.offer_id)
        .bind(task.status.as_str())
        .bind(task.earned_amount.to_string())
        .bind(task.external_amount.map(|a| a.to_string()))
        .bind(&task.external_transaction_id)
        .bind(&task.provider)
        .bind(&task.offer_name)
        .bind(&task.currency)
        .bind(task.fraud_score as i64)
        .bind(task.flagged as i64)
        .bind(&task.proof_ref)
        .bind(&task.rejection_reason)
        .bind(fmt_ts(task.opened_at))
        .bind(task.completed_at.map(fmt_ts))
        .execute(self.pool())
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateTransaction(
                    task.external_transaction_id.clone().unwrap_or_default(),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Task, StoreError> {
        let row = sqlx::query("SELECT * FROM user_tasks WHERE task_id = ?")
            .bind(task_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("task {task_id}")))?;

        task_from_row(&row)
    }

    /// Idempotency pre-check: look up a task by external transaction id.
    /// The unique index remains the real guarantee.
    pub async fn find_task_by_external_tx(
        &self,
        transaction_id: &str,
    ) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query("SELECT * FROM user_tasks WHERE external_transaction_id = ?")
            .bind(transaction_id)
            .fetch_optional(self.pool())
            .await?;

        row.as_ref().map(task_from_row).transpose()
    }

    /// Find a non-terminal task for a (user, offer) pair
    pub async fn find_open_task(
        &self,
        user_id: &str,
        offer_id: &str,
    ) -> Result<Option<Task>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT * FROM user_tasks
            WHERE user_id = ? AND offer_id = ? AND status IN ('pending', 'completed')
            "#,
        )
        .bind(user_id)
        .bind(offer_id)
        .fetch_optional(self.pool())
        .await?;

        row.as_ref().map(task_from_row).transpose()
    }

    /// Transition a task out of `pending` on completion. Returns `false` when
    /// the task was not in `pending` (already completed, or terminal).
    pub async fn mark_task_completed(
        &self,
        task_id: &str,
        status: TaskStatus,
        proof_ref: Option<&str>,
        fraud_score: u8,
        flagged: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE user_tasks SET
                status = ?, proof_ref = ?, fraud_score = ?, flagged = ?, completed_at = ?
            WHERE task_id = ? AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(proof_ref)
        .bind(fraud_score as i64)
        .bind(flagged as i64)
        .bind(fmt_ts(now))
        .bind(task_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Conditionally approve: the already-approved guard and the transition
    /// commit indivisibly. Returns `false` when the task was already
    /// approved, in which case the caller must NOT credit the balance.
    pub async fn mark_task_approved(
        &self,
        task_id: &str,
        payout: Amount,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE user_tasks SET status = 'approved', earned_amount = ?
            WHERE task_id = ? AND status <> 'approved'
            "#,
        )
        .bind(payout.to_string())
        .bind(task_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Conditionally reject. Returns `false` when already rejected.
    pub async fn mark_task_rejected(
        &self,
        task_id: &str,
        reason: &str,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE user_tasks SET status = 'rejected', earned_amount = '0', rejection_reason = ?
            WHERE task_id = ? AND status <> 'rejected'
            "#,
        )
        .bind(reason)
        .bind(task_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sum of approved earnings completed at or after `since`.
    /// Input to the new-user daily cap.
    pub async fn approved_earnings_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Decimal, StoreError> {
        let total: f64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(CAST(earned_amount AS REAL)), 0.0)
            FROM user_tasks
            WHERE user_id = ? AND status = 'approved' AND completed_at >= ?
            "#,
        )
        .bind(user_id)
        .bind(fmt_ts(since))
        .fetch_one(self.pool())
        .await?;

        Ok(Decimal::try_from(total).unwrap_or_default())
    }

    /// Count of a user's approved tasks (the trusted-account signal)
    pub async fn count_approved_tasks(&self, user_id: &str) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_tasks WHERE user_id = ? AND status = 'approved'",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }

    /// Mean persisted fraud score across a user's tasks (0 when none)
    pub async fn avg_fraud_score(&self, user_id: &str) -> Result<f64, StoreError> {
        let avg: Option<f64> =
            sqlx::query_scalar("SELECT AVG(fraud_score) FROM user_tasks WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(self.pool())
                .await?;

        Ok(avg.unwrap_or(0.0))
    }

    /// Manual-review queue: flagged submissions awaiting a decision, riskiest
    /// first, most recent first within a score.
    pub async fn review_queue(&self, limit: u32) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM user_tasks
            WHERE flagged = 1 AND status = 'completed'
            ORDER BY fraud_score DESC, completed_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(task_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use rust_decimal_macros::dec;

    fn amount(d: Decimal) -> Amount {
        Amount::new(d).unwrap()
    }

    async fn seeded_store() -> (Store, Offer) {
        let store = Store::in_memory().await.unwrap();
        let now = Utc::now();
        store.insert_user(&User::new("USER-1", now)).await.unwrap();
        let offer = Offer::new("Watch promo", amount(dec!(5)), OfferCategory::Earnable, 30);
        store.insert_offer(&offer).await.unwrap();
        (store, offer)
    }

    #[tokio::test]
    async fn test_insert_and_get_task() {
        let (store, offer) = seeded_store().await;
        let task = Task::opened("USER-1", &offer.offer_id, Utc::now());
        store.insert_task(&task).await.unwrap();

        let fetched = store.get_task(&task.task_id).await.unwrap();
        assert_eq!(fetched.status, TaskStatus::Pending);
        assert_eq!(fetched.offer_id.as_deref(), Some(offer.offer_id.as_str()));
        assert!(fetched.external_transaction_id.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_external_tx_rejected_by_index() {
        let (store, _) = seeded_store().await;
        let now = Utc::now();

        let first = Task::from_postback(
            "USER-1",
            "cpalead",
            "tx-1",
            amount(dec!(10)),
            None,
            None,
            TaskStatus::Approved,
            amount(dec!(10)),
            now,
        );
        store.insert_task(&first).await.unwrap();

        let second = Task::from_postback(
            "USER-1",
            "cpalead",
            "tx-1",
            amount(dec!(10)),
            None,
            None,
            TaskStatus::Approved,
            amount(dec!(10)),
            now,
        );
        let result = store.insert_task(&second).await;
        assert!(matches!(
            result,
            Err(StoreError::DuplicateTransaction(tx)) if tx == "tx-1"
        ));
    }

    #[tokio::test]
    async fn test_internal_tasks_not_constrained_by_index() {
        let (store, offer) = seeded_store().await;
        let now = Utc::now();

        // Two internal tasks with NULL external ids coexist
        let mut a = Task::opened("USER-1", &offer.offer_id, now);
        a.status = TaskStatus::Rejected;
        store.insert_task(&a).await.unwrap();
        store
            .insert_task(&Task::opened("USER-1", &offer.offer_id, now))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_find_open_task_ignores_terminal() {
        let (store, offer) = seeded_store().await;
        let now = Utc::now();

        let mut done = Task::opened("USER-1", &offer.offer_id, now);
        done.status = TaskStatus::Rejected;
        store.insert_task(&done).await.unwrap();
        assert!(store
            .find_open_task("USER-1", &offer.offer_id)
            .await
            .unwrap()
            .is_none());

        let open = Task::opened("USER-1", &offer.offer_id, now);
        store.insert_task(&open).await.unwrap();
        let found = store
            .find_open_task("USER-1", &offer.offer_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.task_id, open.task_id);
    }

    #[tokio::test]
    async fn test_mark_completed_only_from_pending() {
        let (store, offer) = seeded_store().await;
        let now = Utc::now();
        let task = Task::opened("USER-1", &offer.offer_id, now);
        store.insert_task(&task).await.unwrap();

        assert!(store
            .mark_task_completed(&task.task_id, TaskStatus::Completed, None, 0, false, now)
            .await
            .unwrap());
        // Second completion loses the conditional update
        assert!(!store
            .mark_task_completed(&task.task_id, TaskStatus::Completed, None, 0, false, now)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_approve_is_single_shot() {
        let (store, offer) = seeded_store().await;
        let now = Utc::now();
        let task = Task::opened("USER-1", &offer.offer_id, now);
        store.insert_task(&task).await.unwrap();

        assert!(store
            .mark_task_approved(&task.task_id, amount(dec!(5)))
            .await
            .unwrap());
        assert!(!store
            .mark_task_approved(&task.task_id, amount(dec!(5)))
            .await
            .unwrap());

        let fetched = store.get_task(&task.task_id).await.unwrap();
        assert_eq!(fetched.earned_amount.value(), dec!(5));
    }

    #[tokio::test]
    async fn test_reject_zeroes_earned_amount() {
        let (store, offer) = seeded_store().await;
        let now = Utc::now();
        let task = Task::opened("USER-1", &offer.offer_id, now);
        store.insert_task(&task).await.unwrap();

        assert!(store
            .mark_task_rejected(&task.task_id, "low quality proof")
            .await
            .unwrap());
        assert!(!store
            .mark_task_rejected(&task.task_id, "again")
            .await
            .unwrap());

        let fetched = store.get_task(&task.task_id).await.unwrap();
        assert_eq!(fetched.status, TaskStatus::Rejected);
        assert!(fetched.earned_amount.is_zero());
        assert_eq!(fetched.rejection_reason.as_deref(), Some("low quality proof"));
    }

    #[tokio::test]
    async fn test_approved_earnings_since_scopes_by_status_and_time() {
        let (store, offer) = seeded_store().await;
        let now = Utc::now();
        let day_start = now - chrono::Duration::hours(2);

        // Approved today: counted
        let mut t1 = Task::opened("USER-1", &offer.offer_id, now);
        t1.status = TaskStatus::Approved;
        t1.earned_amount = amount(dec!(120));
        t1.completed_at = Some(now - chrono::Duration::hours(1));
        store.insert_task(&t1).await.unwrap();

        // Approved yesterday: out of range
        let mut t2 = Task::opened("USER-1", &offer.offer_id, now);
        t2.status = TaskStatus::Approved;
        t2.earned_amount = amount(dec!(999));
        t2.completed_at = Some(now - chrono::Duration::days(1));
        store.insert_task(&t2).await.unwrap();

        // Completed but not approved: excluded
        let mut t3 = Task::opened("USER-1", &offer.offer_id, now);
        t3.status = TaskStatus::Completed;
        t3.earned_amount = amount(dec!(50));
        t3.completed_at = Some(now);
        store.insert_task(&t3).await.unwrap();

        let total = store
            .approved_earnings_since("USER-1", day_start)
            .await
            .unwrap();
        assert_eq!(total, dec!(120));
    }

    #[tokio::test]
    async fn test_approved_earnings_zero_when_no_rows() {
        // The empty SUM must decode as a real zero, not an integer
        let (store, _offer) = seeded_store().await;
        let total = store
            .approved_earnings_since("USER-1", Utc::now() - chrono::Duration::hours(24))
            .await
            .unwrap();
        assert_eq!(total, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_review_queue_ordering() {
        let (store, offer) = seeded_store().await;
        let now = Utc::now();

        for (score, minutes_ago) in [(70u8, 10i64), (90, 30), (70, 5)] {
            let mut t = Task::opened("USER-1", &offer.offer_id, now);
            t.status = TaskStatus::Completed;
            t.fraud_score = score;
            t.flagged = true;
            t.completed_at = Some(now - chrono::Duration::minutes(minutes_ago));
            store.insert_task(&t).await.unwrap();
        }
        // Unflagged task never surfaces
        let mut clean = Task::opened("USER-1", &offer.offer_id, now);
        clean.status = TaskStatus::Completed;
        clean.completed_at = Some(now);
        store.insert_task(&clean).await.unwrap();

        let queue = store.review_queue(50).await.unwrap();
        assert_eq!(queue.len(), 3);
        assert_eq!(queue[0].fraud_score, 90);
        // Equal scores rank most recent first
        assert!(queue[1].completed_at.unwrap() > queue[2].completed_at.unwrap());
    }

    #[tokio::test]
    async fn test_avg_fraud_score() {
        let (store, offer) = seeded_store().await;
        let now = Utc::now();
        assert_eq!(store.avg_fraud_score("USER-1").await.unwrap(), 0.0);

        for score in [20u8, 60] {
            let mut t = Task::opened("USER-1", &offer.offer_id, now);
            t.fraud_score = score;
            store.insert_task(&t).await.unwrap();
        }
        assert_eq!(store.avg_fraud_score("USER-1").await.unwrap(), 40.0);
    }
}
