//! Withdrawal records and conditional status transitions

use crate::error::StoreError;
use crate::models::{Withdrawal, WithdrawalStatus};
use crate::store::{fmt_ts, parse_opt_ts, parse_ts, Store};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use taskpay_core::Amount;

fn withdrawal_from_row(row: &SqliteRow) -> Result<Withdrawal, StoreError> {
    let amount: String = row.get("amount");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let processed_at: Option<String> = row.get("processed_at");

    Ok(Withdrawal {
        withdrawal_id: row.get("withdrawal_id"),
        user_id: row.get("user_id"),
        amount: Amount::parse_lossy(&amount),
        upi_id: row.get("upi_id"),
        status: WithdrawalStatus::from_str(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("withdrawal status: {status}")))?,
        created_at: parse_ts(&created_at)?,
        processed_at: parse_opt_ts(processed_at)?,
        external_ref: row.get("external_ref"),
        rejection_reason: row.get("rejection_reason"),
    })
}

impl Store {
    pub async fn insert_withdrawal(&self, withdrawal: &Withdrawal) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO withdrawals (withdrawal_id, user_id, amount, upi_id, status,
                                     created_at, processed_at, external_ref, rejection_reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&withdrawal.withdrawal_id)
        .bind(&withdrawal.user_id)
        .bind(withdrawal.amount.to_string())
        .bind(&withdrawal.upi_id)
        .bind(withdrawal.status.as_str())
        .bind(fmt_ts(withdrawal.created_at))
        .bind(withdrawal.processed_at.map(fmt_ts))
        .bind(&withdrawal.external_ref)
        .bind(&withdrawal.rejection_reason)
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn get_withdrawal(&self, withdrawal_id: &str) -> Result<Withdrawal, StoreError> {
        let row = sqlx::query("SELECT * FROM withdrawals WHERE withdrawal_id = ?")
            .bind(withdrawal_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("withdrawal {withdrawal_id}")))?;

        withdrawal_from_row(&row)
    }

    /// pending → completed, stamping processed time and the payment rail's
    /// reference. Returns `false` when the withdrawal was not pending.
    pub async fn mark_withdrawal_completed(
        &self,
        withdrawal_id: &str,
        external_ref: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawals SET status = 'completed', processed_at = ?, external_ref = ?
            WHERE withdrawal_id = ? AND status = 'pending'
            "#,
        )
        .bind(fmt_ts(now))
        .bind(external_ref)
        .bind(withdrawal_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// pending → rejected. Returns `false` when the withdrawal was not
    /// pending; the caller refunds only on `true`.
    pub async fn mark_withdrawal_rejected(
        &self,
        withdrawal_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawals SET status = 'rejected', processed_at = ?, rejection_reason = ?
            WHERE withdrawal_id = ? AND status = 'pending'
            "#,
        )
        .bind(fmt_ts(now))
        .bind(reason)
        .bind(withdrawal_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Pending withdrawals, oldest first (the processing queue)
    pub async fn pending_withdrawals(&self) -> Result<Vec<Withdrawal>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM withdrawals WHERE status = 'pending' ORDER BY created_at ASC",
        )
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(withdrawal_from_row).collect()
    }
}
