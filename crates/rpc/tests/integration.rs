//! Integration tests for TaskPay
//!
//! These tests drive the application context end to end: task lifecycle,
//! postback ingestion, fraud flagging, withdrawals, and durability across
//! a restart of the context.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use taskpay_core::Amount;
use taskpay_ledger::CompletionVerdict;
use taskpay_postback::{compute_signature, PostbackConfig, PostbackPayload, PostbackStatus};
use taskpay_rpc::{AppConfig, AppContext};
use taskpay_store::{Offer, OfferCategory, TaskStatus, User, WithdrawalStatus};
use tempfile::TempDir;

fn amount(val: i64) -> Amount {
    Amount::new(Decimal::new(val, 0)).unwrap()
}

fn signed_config() -> AppConfig {
    AppConfig {
        postback: PostbackConfig {
            secret: Some("integration-secret".into()),
            auto_approve: true,
        },
        ..Default::default()
    }
}

async fn context(dir: &TempDir, config: AppConfig) -> AppContext {
    AppContext::with_config(dir.path(), config).await.unwrap()
}

/// Test: user earns through a task, then cashes out
#[tokio::test]
async fn test_full_earn_and_withdraw_workflow() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, AppConfig::default()).await;
    let now = Utc::now();

    ctx.store.insert_user(&User::new("alice", now)).await.unwrap();
    let offer = Offer::new("Big survey", amount(250), OfferCategory::Earnable, 300);
    ctx.store.insert_offer(&offer).await.unwrap();

    // 1. Start and complete a clean task
    let task = ctx.tasks.create_task("alice", &offer.offer_id, now).await.unwrap();
    ctx.timer.record_start(&task.task_id);

    let task = ctx
        .tasks
        .complete_task(&task.task_id, None, CompletionVerdict::default(), now)
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Completed);

    // 2. Approval credits the offer payout
    let task = ctx.tasks.approve_task(&task.task_id, now).await.unwrap();
    assert_eq!(task.earned_amount.value(), dec!(250));
    assert_eq!(
        ctx.store.get_user("alice").await.unwrap().balance.value(),
        dec!(250)
    );

    // 3. Withdrawal debits at request time
    let withdrawal = ctx
        .withdrawals
        .request("alice", amount(200), "alice@upi", now)
        .await
        .unwrap();
    assert_eq!(
        ctx.store.get_user("alice").await.unwrap().balance.value(),
        dec!(50)
    );

    // 4. Approval pays out, balance unchanged
    let withdrawal = ctx
        .withdrawals
        .approve(&withdrawal.withdrawal_id, Some("UTR-9"), now)
        .await
        .unwrap();
    assert_eq!(withdrawal.status, WithdrawalStatus::Completed);
    let user = ctx.store.get_user("alice").await.unwrap();
    assert_eq!(user.balance.value(), dec!(50));
    assert_eq!(user.total_earnings.value(), dec!(250));
}

/// Test: a replayed postback is credited exactly once, even across restart
#[tokio::test]
async fn test_postback_idempotent_across_restart() {
    let dir = TempDir::new().unwrap();
    let payload = PostbackPayload {
        user_id: "alice".into(),
        transaction_id: "NET-TX-777".into(),
        amount: "99.50".into(),
        provider: Some("adnet".into()),
        signature: Some(compute_signature(
            "integration-secret",
            "alice",
            "NET-TX-777",
            "99.50",
        )),
        ..Default::default()
    };

    {
        let ctx = context(&dir, signed_config()).await;
        ctx.store
            .insert_user(&User::new("alice", Utc::now()))
            .await
            .unwrap();

        let outcome = ctx.postbacks.process(&payload, Utc::now()).await.unwrap();
        assert_eq!(outcome.status, PostbackStatus::Approved);
        assert_eq!(outcome.new_balance.value(), dec!(99.50));
    }

    // Same payload against a fresh context over the same data directory
    let ctx = context(&dir, signed_config()).await;
    let outcome = ctx.postbacks.process(&payload, Utc::now()).await.unwrap();
    assert_eq!(outcome.status, PostbackStatus::AlreadyProcessed);
    assert_eq!(
        ctx.store.get_user("alice").await.unwrap().balance.value(),
        dec!(99.50)
    );

    // Both deliveries are on the audit trail
    let raw = std::fs::read_to_string(dir.path().join("postbacks.jsonl")).unwrap();
    assert_eq!(raw.lines().count(), 2);
}

/// Test: without auto-approval a postback queues for review, and the
/// reviewer's approval credits the reported amount
#[tokio::test]
async fn test_postback_review_flow_credits_reported_amount() {
    let dir = TempDir::new().unwrap();
    let mut config = signed_config();
    config.postback.auto_approve = false;
    let ctx = context(&dir, config).await;
    let now = Utc::now();

    ctx.store.insert_user(&User::new("bob", now)).await.unwrap();

    let payload = PostbackPayload {
        user_id: "bob".into(),
        transaction_id: "NET-TX-1".into(),
        amount: "42".into(),
        signature: Some(compute_signature("integration-secret", "bob", "NET-TX-1", "42")),
        ..Default::default()
    };
    let outcome = ctx.postbacks.process(&payload, now).await.unwrap();
    assert_eq!(outcome.status, PostbackStatus::PendingReview);
    assert!(ctx.store.get_user("bob").await.unwrap().balance.is_zero());

    let queue = ctx.store.review_queue(50).await.unwrap();
    assert_eq!(queue.len(), 1);

    // No internal offer backs this task, so approval pays the network amount
    let task = ctx.tasks.approve_task(&outcome.task_id, now).await.unwrap();
    assert_eq!(task.earned_amount.value(), dec!(42));
    assert_eq!(
        ctx.store.get_user("bob").await.unwrap().balance.value(),
        dec!(42)
    );
}

/// Test: the review queue orders by score, and rejection pays nothing
#[tokio::test]
async fn test_review_queue_ordering_and_rejection() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, AppConfig::default()).await;
    let now = Utc::now();

    ctx.store.insert_user(&User::new("carol", now)).await.unwrap();
    let offer = Offer::new("Install", amount(30), OfferCategory::Conditional, 120);
    ctx.store.insert_offer(&offer).await.unwrap();

    let task = ctx.tasks.create_task("carol", &offer.offer_id, now).await.unwrap();
    let verdict = CompletionVerdict {
        fraud_score: 70,
        flagged: true,
    };
    ctx.tasks
        .complete_task(&task.task_id, None, verdict, now)
        .await
        .unwrap();

    let queue = ctx.store.review_queue(50).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].fraud_score, 70);

    let task = ctx.tasks.reject_task(&task.task_id, "no proof").await.unwrap();
    assert_eq!(task.status, TaskStatus::Rejected);
    assert!(task.earned_amount.is_zero());
    assert!(ctx.store.get_user("carol").await.unwrap().balance.is_zero());

    // Rejected tasks leave the queue
    assert!(ctx.store.review_queue(50).await.unwrap().is_empty());
}

/// Test: the shared limiter enforces the fixed window per key
#[tokio::test]
async fn test_rate_limit_through_context() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, AppConfig::default()).await;
    let now = Utc::now();

    for _ in 0..10 {
        assert!(ctx.limiter.check_at("dave", now).allowed);
    }
    let decision = ctx.limiter.check_at("dave", now);
    assert!(!decision.allowed);

    // Another key has its own budget
    assert!(ctx.limiter.check_at("erin", now).allowed);
}

/// Test: rejecting a withdrawal restores the exact balance
#[tokio::test]
async fn test_withdrawal_rejection_conserves_balance() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, AppConfig::default()).await;
    let now = Utc::now();

    ctx.store.insert_user(&User::new("frank", now)).await.unwrap();
    ctx.store
        .credit_earnings("frank", amount(500), now)
        .await
        .unwrap();

    let withdrawal = ctx
        .withdrawals
        .request("frank", amount(300), "frank@upi", now)
        .await
        .unwrap();
    assert_eq!(
        ctx.store.get_user("frank").await.unwrap().balance.value(),
        dec!(200)
    );

    ctx.withdrawals
        .reject(&withdrawal.withdrawal_id, "kyc mismatch", now)
        .await
        .unwrap();
    let user = ctx.store.get_user("frank").await.unwrap();
    assert_eq!(user.balance.value(), dec!(500));
    assert_eq!(user.total_earnings.value(), dec!(500));
}

/// Test: maintenance sweeps run without disturbing live state
#[tokio::test]
async fn test_maintenance_sweeps_spawn_and_abort() {
    let dir = TempDir::new().unwrap();
    let ctx = context(&dir, AppConfig::default()).await;

    ctx.limiter.check("gina");
    let handles = ctx.spawn_maintenance();
    assert_eq!(handles.len(), 3);

    for handle in handles {
        handle.abort();
    }

    // Live window untouched by spawning
    assert!(ctx.limiter.check("gina").allowed);
}
