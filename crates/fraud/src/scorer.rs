//! Signal gathering against the store and cap checks

use chrono::{DateTime, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use taskpay_store::{Store, StoreError, User};
use tracing::debug;

use crate::config::FraudConfig;
use crate::score::{compute_fraud_score, FraudSignals};

/// Daily-cap verdict for a new account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapStatus {
    pub exceeded: bool,
    pub current_total: Decimal,
    pub limit: Decimal,
}

/// Gathers store-backed signals for a completion, applies the configured
/// flag threshold, and answers daily-cap questions.
#[derive(Clone)]
pub struct FraudScorer {
    store: Store,
    config: FraudConfig,
}

impl FraudScorer {
    pub fn new(store: Store, config: FraudConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &FraudConfig {
        &self.config
    }

    /// Score a completion from its timing, device context, and account
    /// history. `device_hash` and `ip` are optional; absent context simply
    /// contributes nothing.
    pub async fn score_completion(
        &self,
        user: &User,
        elapsed_ms: i64,
        expected_duration_ms: i64,
        missing_proof: bool,
        device_hash: Option<&str>,
        ip: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<u8, StoreError> {
        let devices_on_ip_24h = match ip {
            Some(ip) => {
                self.store
                    .count_devices_by_ip_since(ip, now - Duration::hours(24))
                    .await?
            }
            None => 0,
        };

        let device_seen_7d = match device_hash {
            Some(hash) => {
                self.store
                    .count_device_seen_since(hash, now - Duration::days(7))
                    .await?
            }
            None => 0,
        };

        let approved_tasks = self.store.count_approved_tasks(&user.user_id).await?;

        let signals = FraudSignals {
            elapsed_ms,
            expected_duration_ms,
            devices_on_ip_24h,
            device_seen_7d,
            missing_proof,
            account_age_days: user.age_days(now),
            approved_tasks,
        };

        let score = compute_fraud_score(&signals);
        debug!(
            user_id = %user.user_id,
            score,
            devices_on_ip_24h,
            device_seen_7d,
            "scored completion"
        );
        Ok(score)
    }

    /// Whether a score crosses the review threshold
    pub fn should_flag(&self, score: u8) -> bool {
        score >= self.config.flag_threshold
    }

    /// Daily approved-earnings cap for accounts younger than two days.
    /// Older accounts are never capped. The day starts at UTC midnight.
    pub async fn check_new_user_daily_cap(
        &self,
        user: &User,
        now: DateTime<Utc>,
    ) -> Result<CapStatus, StoreError> {
        let limit = self.config.new_user_daily_cap;

        if user.age_days(now) >= 2 {
            return Ok(CapStatus {
                exceeded: false,
                current_total: Decimal::ZERO,
                limit,
            });
        }

        let start_of_day = now.date_naive().and_time(NaiveTime::MIN).and_utc();
        let current_total = self
            .store
            .approved_earnings_since(&user.user_id, start_of_day)
            .await?;

        Ok(CapStatus {
            exceeded: current_total >= limit,
            current_total,
            limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use taskpay_core::Amount;
    use taskpay_store::{Offer, OfferCategory, Task, TaskStatus};

    async fn store() -> Store {
        let store = Store::in_memory().await.unwrap();
        store
    }

    fn scorer(store: Store) -> FraudScorer {
        FraudScorer::new(store, FraudConfig::default())
    }

    #[tokio::test]
    async fn test_shared_ip_signal_from_store() {
        let store = store().await;
        let now = Utc::now();

        // Six distinct devices behind one IP within 24h
        for i in 0..6 {
            let uid = format!("user-{i}");
            store.insert_user(&User::new(&uid, now)).await.unwrap();
            store
                .upsert_device(&uid, &format!("hash-{i}"), "10.0.0.1", "ua", now)
                .await
                .unwrap();
        }

        let user = store.get_user("user-0").await.unwrap();
        let score = scorer(store)
            .score_completion(&user, 60_000, 60_000, false, None, Some("10.0.0.1"), now)
            .await
            .unwrap();
        assert_eq!(score, 30);
    }

    #[tokio::test]
    async fn test_flag_threshold() {
        let store = store().await;
        let s = scorer(store);
        assert!(!s.should_flag(59));
        assert!(s.should_flag(60));
        assert!(s.should_flag(100));
    }

    #[tokio::test]
    async fn test_daily_cap_new_account() {
        let store = store().await;
        let now = Utc::now();
        let user = User::new("alice", now);
        store.insert_user(&user).await.unwrap();

        let offer = Offer::new(
            "Survey",
            Amount::new_unchecked(dec!(150)),
            OfferCategory::Earnable,
            60,
        );
        store.insert_offer(&offer).await.unwrap();

        // 150 approved today: under the 200 cap
        let mut task = Task::opened(&user.user_id, &offer.offer_id, now);
        task.status = TaskStatus::Approved;
        task.earned_amount = Amount::new_unchecked(dec!(150));
        task.completed_at = Some(now);
        store.insert_task(&task).await.unwrap();

        let s = scorer(store.clone());
        let status = s.check_new_user_daily_cap(&user, now).await.unwrap();
        assert!(!status.exceeded);
        assert_eq!(status.current_total, dec!(150));

        // A second approval pushes past the cap
        let mut task2 = Task::opened(&user.user_id, &offer.offer_id, now);
        task2.status = TaskStatus::Approved;
        task2.earned_amount = Amount::new_unchecked(dec!(60));
        task2.completed_at = Some(now);
        store.insert_task(&task2).await.unwrap();

        let status = s.check_new_user_daily_cap(&user, now).await.unwrap();
        assert!(status.exceeded);
        assert_eq!(status.current_total, dec!(210));
    }

    #[tokio::test]
    async fn test_daily_cap_ignores_established_accounts() {
        let store = store().await;
        let now = Utc::now();
        let user = User::new("bob", now - Duration::days(30));
        store.insert_user(&user).await.unwrap();

        let status = scorer(store)
            .check_new_user_daily_cap(&user, now)
            .await
            .unwrap();
        assert!(!status.exceeded);
        assert_eq!(status.current_total, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_daily_cap_resets_at_utc_midnight() {
        let store = store().await;
        let now = Utc::now();
        let user = User::new("carol", now);
        store.insert_user(&user).await.unwrap();

        let offer = Offer::new(
            "Survey",
            Amount::new_unchecked(dec!(300)),
            OfferCategory::Earnable,
            60,
        );
        store.insert_offer(&offer).await.unwrap();

        // Yesterday's earnings do not count toward today
        let yesterday = now - Duration::days(1);
        let mut task = Task::opened(&user.user_id, &offer.offer_id, yesterday);
        task.status = TaskStatus::Approved;
        task.earned_amount = Amount::new_unchecked(dec!(300));
        task.completed_at = Some(yesterday);
        store.insert_task(&task).await.unwrap();

        let status = scorer(store)
            .check_new_user_daily_cap(&user, now)
            .await
            .unwrap();
        assert!(!status.exceeded);
        assert_eq!(status.current_total, Decimal::ZERO);
    }
}
