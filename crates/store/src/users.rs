//! User records and atomic balance mutations

use crate::error::StoreError;
use crate::models::User;
use crate::store::{fmt_ts, parse_ts, Store};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use taskpay_core::Amount;

fn user_from_row(row: &SqliteRow) -> Result<User, StoreError> {
    let balance: String = row.get("balance");
    let total_earnings: String = row.get("total_earnings");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(User {
        user_id: row.get("user_id"),
        balance: Amount::parse_lossy(&balance),
        total_earnings: Amount::parse_lossy(&total_earnings),
        ads_watched: row.get("ads_watched"),
        tasks_completed: row.get("tasks_completed"),
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

impl Store {
    /// Insert a new user with zero balances
    pub async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (user_id, balance, total_earnings, ads_watched,
                               tasks_completed, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.user_id)
        .bind(user.balance.to_string())
        .bind(user.total_earnings.to_string())
        .bind(user.ads_watched)
        .bind(user.tasks_completed)
        .bind(fmt_ts(user.created_at))
        .bind(fmt_ts(user.updated_at))
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Fetch a user by id
    pub async fn get_user(&self, user_id: &str) -> Result<User, StoreError> {
        let row = sqlx::query("SELECT * FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))?;

        user_from_row(&row)
    }

    /// Credit approved earnings: one atomic increment of both `balance` and
    /// `total_earnings`. Never read-modify-write.
    pub async fn credit_earnings(
        &self,
        user_id: &str,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                balance = CAST((CAST(balance AS REAL) + CAST(? AS REAL)) AS TEXT),
                total_earnings = CAST((CAST(total_earnings AS REAL) + CAST(? AS REAL)) AS TEXT),
                updated_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(amount.to_string())
        .bind(amount.to_string())
        .bind(fmt_ts(now))
        .bind(user_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }

        Ok(())
    }

    /// Conditionally debit the balance. The sufficiency check and the debit
    /// are one statement, so concurrent debits cannot overdraw.
    ///
    /// Returns `false` when the balance is insufficient (no change applied).
    pub async fn debit_balance_if_sufficient(
        &self,
        user_id: &str,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                balance = CAST((CAST(balance AS REAL) - CAST(? AS REAL)) AS TEXT),
                updated_at = ?
            WHERE user_id = ? AND CAST(balance AS REAL) >= CAST(? AS REAL)
            "#,
        )
        .bind(amount.to_string())
        .bind(fmt_ts(now))
        .bind(user_id)
        .bind(amount.to_string())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Refund a previously debited amount back to the balance.
    /// Does not touch `total_earnings`: a refund is not an earning.
    pub async fn refund_balance(
        &self,
        user_id: &str,
        amount: Amount,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                balance = CAST((CAST(balance AS REAL) + CAST(? AS REAL)) AS TEXT),
                updated_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(amount.to_string())
        .bind(fmt_ts(now))
        .bind(user_id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {user_id}")));
        }

        Ok(())
    }

    /// Bump the "attempted" activity counters. Happens on every completion,
    /// independent of the later approve/reject decision.
    pub async fn increment_activity(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE users SET
                ads_watched = ads_watched + 1,
                tasks_completed = tasks_completed + 1,
                updated_at = ?
            WHERE user_id = ?
            "#,
        )
        .bind(fmt_ts(now))
        .bind(user_id)
        .execute(self.pool())
        .await?;

        Ok(())
    }
}
