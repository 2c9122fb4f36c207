//! Withdrawal lifecycle: request (debit), approve, reject (refund)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use taskpay_core::Amount;
use taskpay_store::{Store, Withdrawal};
use tracing::info;

use crate::error::LedgerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalConfig {
    /// Smallest amount a user may cash out
    #[serde(default = "default_min_amount")]
    pub min_amount: Decimal,
}

fn default_min_amount() -> Decimal {
    Decimal::from(200)
}

impl Default for WithdrawalConfig {
    fn default() -> Self {
        Self {
            min_amount: default_min_amount(),
        }
    }
}

impl WithdrawalConfig {
    /// Read `MIN_WITHDRAWAL_AMOUNT`; unset or unparsable keeps the default.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = std::env::var("MIN_WITHDRAWAL_AMOUNT")
            .ok()
            .and_then(|v| v.parse::<Decimal>().ok())
        {
            if v > Decimal::ZERO {
                config.min_amount = v;
            }
        }
        config
    }
}

/// Requests debit the balance immediately, so pending withdrawals can never
/// spend the same rupee twice. A rejection refunds exactly the debited
/// amount; an approval only stamps the payment reference.
#[derive(Clone)]
pub struct WithdrawalLedger {
    store: Store,
    config: WithdrawalConfig,
}

impl WithdrawalLedger {
    pub fn new(store: Store, config: WithdrawalConfig) -> Self {
        Self { store, config }
    }

    pub async fn request(
        &self,
        user_id: &str,
        amount: Amount,
        upi_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal, LedgerError> {
        if upi_id.trim().is_empty() {
            return Err(LedgerError::Validation("destination UPI id required".into()));
        }
        if amount.value() < self.config.min_amount {
            return Err(LedgerError::BelowMinimum(self.config.min_amount));
        }

        self.store.get_user(user_id).await?;

        // Debit first. If the insert after it fails the refund is manual,
        // but the balance can never go negative or double-spend.
        let debited = self
            .store
            .debit_balance_if_sufficient(user_id, amount, now)
            .await?;
        if !debited {
            return Err(LedgerError::InsufficientBalance);
        }

        let withdrawal = Withdrawal::pending(user_id, amount, upi_id, now);
        self.store.insert_withdrawal(&withdrawal).await?;
        info!(
            withdrawal_id = %withdrawal.withdrawal_id,
            user_id,
            amount = %amount,
            "withdrawal requested"
        );
        Ok(withdrawal)
    }

    /// Mark a pending withdrawal paid out. The money already left the
    /// balance at request time.
    pub async fn approve(
        &self,
        withdrawal_id: &str,
        external_ref: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal, LedgerError> {
        self.store.get_withdrawal(withdrawal_id).await?;

        let transitioned = self
            .store
            .mark_withdrawal_completed(withdrawal_id, external_ref, now)
            .await?;
        if !transitioned {
            return Err(LedgerError::AlreadyProcessed(format!(
                "withdrawal {withdrawal_id}"
            )));
        }
        info!(withdrawal_id, "withdrawal completed");

        self.store
            .get_withdrawal(withdrawal_id)
            .await
            .map_err(Into::into)
    }

    /// Reject a pending withdrawal and refund the exact debited amount.
    pub async fn reject(
        &self,
        withdrawal_id: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Withdrawal, LedgerError> {
        let withdrawal = self.store.get_withdrawal(withdrawal_id).await?;

        let transitioned = self
            .store
            .mark_withdrawal_rejected(withdrawal_id, reason, now)
            .await?;
        if !transitioned {
            return Err(LedgerError::AlreadyProcessed(format!(
                "withdrawal {withdrawal_id}"
            )));
        }

        self.store
            .refund_balance(&withdrawal.user_id, withdrawal.amount, now)
            .await?;
        info!(
            withdrawal_id,
            user_id = %withdrawal.user_id,
            amount = %withdrawal.amount,
            reason,
            "withdrawal rejected and refunded"
        );

        self.store
            .get_withdrawal(withdrawal_id)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use taskpay_store::{User, WithdrawalStatus};

    async fn funded_store(balance: Decimal) -> Store {
        let store = Store::in_memory().await.unwrap();
        let now = Utc::now();
        store.insert_user(&User::new("alice", now)).await.unwrap();
        if balance > Decimal::ZERO {
            store
                .credit_earnings("alice", Amount::new_unchecked(balance), now)
                .await
                .unwrap();
        }
        store
    }

    fn ledger(store: Store) -> WithdrawalLedger {
        WithdrawalLedger::new(store, WithdrawalConfig::default())
    }

    #[tokio::test]
    async fn test_request_debits_immediately() {
        let store = funded_store(dec!(500)).await;
        let ledger = ledger(store.clone());
        let now = Utc::now();

        let withdrawal = ledger
            .request("alice", Amount::new_unchecked(dec!(200)), "alice@upi", now)
            .await
            .unwrap();
        assert_eq!(withdrawal.status, WithdrawalStatus::Pending);

        let user = store.get_user("alice").await.unwrap();
        assert_eq!(user.balance.value(), dec!(300));
        // Lifetime earnings are untouched by a withdrawal
        assert_eq!(user.total_earnings.value(), dec!(500));
    }

    #[tokio::test]
    async fn test_below_minimum_rejected() {
        let store = funded_store(dec!(500)).await;
        let err = ledger(store)
            .request("alice", Amount::new_unchecked(dec!(199)), "alice@upi", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::BelowMinimum(_)));
    }

    #[tokio::test]
    async fn test_insufficient_balance_leaves_state() {
        let store = funded_store(dec!(100)).await;
        let err = ledger(store.clone())
            .request("alice", Amount::new_unchecked(dec!(200)), "alice@upi", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance));

        let user = store.get_user("alice").await.unwrap();
        assert_eq!(user.balance.value(), dec!(100));
    }

    #[tokio::test]
    async fn test_missing_destination_rejected() {
        let store = funded_store(dec!(500)).await;
        let err = ledger(store)
            .request("alice", Amount::new_unchecked(dec!(200)), "  ", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reject_refunds_exact_amount() {
        let store = funded_store(dec!(500)).await;
        let ledger = ledger(store.clone());
        let now = Utc::now();

        let withdrawal = ledger
            .request("alice", Amount::new_unchecked(dec!(250)), "alice@upi", now)
            .await
            .unwrap();
        assert_eq!(
            store.get_user("alice").await.unwrap().balance.value(),
            dec!(250)
        );

        let withdrawal = ledger
            .reject(&withdrawal.withdrawal_id, "name mismatch", now)
            .await
            .unwrap();
        assert_eq!(withdrawal.status, WithdrawalStatus::Rejected);

        let user = store.get_user("alice").await.unwrap();
        assert_eq!(user.balance.value(), dec!(500));
        assert_eq!(user.total_earnings.value(), dec!(500));
    }

    #[tokio::test]
    async fn test_approve_is_final() {
        let store = funded_store(dec!(500)).await;
        let ledger = ledger(store.clone());
        let now = Utc::now();

        let withdrawal = ledger
            .request("alice", Amount::new_unchecked(dec!(200)), "alice@upi", now)
            .await
            .unwrap();
        let withdrawal = ledger
            .approve(&withdrawal.withdrawal_id, Some("UTR-123"), now)
            .await
            .unwrap();
        assert_eq!(withdrawal.status, WithdrawalStatus::Completed);
        assert_eq!(withdrawal.external_ref.as_deref(), Some("UTR-123"));

        // Neither a second approval nor a late rejection can fire
        let err = ledger
            .approve(&withdrawal.withdrawal_id, None, now)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyProcessed(_)));
        let err = ledger
            .reject(&withdrawal.withdrawal_id, "too late", now)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyProcessed(_)));

        // No refund happened
        let user = store.get_user("alice").await.unwrap();
        assert_eq!(user.balance.value(), dec!(300));
    }

    #[tokio::test]
    async fn test_double_reject_refunds_once() {
        let store = funded_store(dec!(500)).await;
        let ledger = ledger(store.clone());
        let now = Utc::now();

        let withdrawal = ledger
            .request("alice", Amount::new_unchecked(dec!(200)), "alice@upi", now)
            .await
            .unwrap();

        ledger
            .reject(&withdrawal.withdrawal_id, "first", now)
            .await
            .unwrap();
        let err = ledger
            .reject(&withdrawal.withdrawal_id, "second", now)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyProcessed(_)));

        let user = store.get_user("alice").await.unwrap();
        assert_eq!(user.balance.value(), dec!(500));
    }
}
