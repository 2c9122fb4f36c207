//! CLI commands

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use taskpay_core::Amount;
use taskpay_fraud::CapStatus;
use taskpay_ledger::CompletionVerdict;
use taskpay_postback::PostbackPayload;
use taskpay_ratelimit::timer::DEFAULT_MIN_DURATION_MS;
use taskpay_store::{Offer, OfferCategory, Severity, User};

use crate::context::AppContext;

/// Initialize the data directory (database and audit log)
pub async fn init(ctx: &AppContext) -> Result<(), anyhow::Error> {
    println!("✅ Initialized data directory at {}", ctx.data_path().display());
    Ok(())
}

pub async fn add_user(ctx: &AppContext, user_id: &str) -> Result<(), anyhow::Error> {
    let user = User::new(user_id, Utc::now());
    ctx.store.insert_user(&user).await?;
    println!("✅ Created user {}", user.user_id);
    Ok(())
}

pub async fn add_offer(
    ctx: &AppContext,
    title: &str,
    payout: Decimal,
    category: &str,
    duration_seconds: i64,
) -> Result<(), anyhow::Error> {
    let category = OfferCategory::from_str(category)
        .ok_or_else(|| anyhow::anyhow!("unknown offer category: {category}"))?;
    let offer = Offer::new(title, Amount::new(payout)?, category, duration_seconds);
    ctx.store.insert_offer(&offer).await?;
    println!(
        "✅ Created offer {} ({}, payout {})",
        offer.offer_id,
        category.as_str(),
        offer.payout
    );
    Ok(())
}

/// Open a task for a user, subject to the per-user rate limit
pub async fn start_task(
    ctx: &AppContext,
    user_id: &str,
    offer_id: &str,
) -> Result<(), anyhow::Error> {
    let decision = ctx.limiter.check(user_id);
    if !decision.allowed {
        anyhow::bail!(
            "rate limited: retry in {}s",
            decision.reset_in_ms / 1000
        );
    }

    let task = ctx.tasks.create_task(user_id, offer_id, Utc::now()).await?;
    ctx.timer.record_start(&task.task_id);
    println!("✅ Started task {} for {}", task.task_id, user_id);
    Ok(())
}

/// Submit a completion: validate timing, record the device sighting, score
/// for fraud, then run the completion transition.
pub async fn complete_task(
    ctx: &AppContext,
    task_id: &str,
    proof_ref: Option<&str>,
    device_hash: Option<&str>,
    ip: Option<&str>,
    ua_hash: Option<&str>,
) -> Result<(), anyhow::Error> {
    let now = Utc::now();
    let task = ctx.store.get_task(task_id).await?;
    let user = ctx.store.get_user(&task.user_id).await?;

    // Consumes the start record; a replayed completion times out here
    let timing = ctx
        .timer
        .validate_completion(task_id, DEFAULT_MIN_DURATION_MS);

    if let (Some(hash), Some(ip)) = (device_hash, ip) {
        ctx.store
            .upsert_device(&user.user_id, hash, ip, ua_hash.unwrap_or(""), now)
            .await?;
    }

    let offer = match &task.offer_id {
        Some(offer_id) => Some(ctx.store.get_offer(offer_id).await?),
        None => None,
    };
    let expected_ms = offer.as_ref().map(|o| o.duration_seconds * 1000).unwrap_or(0);
    let missing_proof = offer
        .as_ref()
        .map(|o| o.category.requires_proof() && proof_ref.is_none())
        .unwrap_or(false);

    let score = ctx
        .scorer
        .score_completion(
            &user,
            timing.duration_ms,
            expected_ms,
            missing_proof,
            device_hash,
            ip,
            now,
        )
        .await?;
    // A completion without a live timer record is suspect regardless of score
    let flagged = ctx.scorer.should_flag(score) || !timing.valid;

    let verdict = CompletionVerdict {
        fraud_score: score,
        flagged,
    };
    let task = ctx.tasks.complete_task(task_id, proof_ref, verdict, now).await?;
    println!(
        "✅ Completed task {} (status: {}, fraud score: {}{})",
        task.task_id,
        task.status.as_str(),
        task.fraud_score,
        if task.flagged { ", flagged for review" } else { "" }
    );
    Ok(())
}

/// Approve a completion, consulting the new-user daily cap first.
/// The cap is advisory: the approval proceeds, the warning goes on record.
pub async fn approve_task(ctx: &AppContext, task_id: &str) -> Result<(), anyhow::Error> {
    let now = Utc::now();
    let task = ctx.store.get_task(task_id).await?;
    let user = ctx.store.get_user(&task.user_id).await?;

    let cap: CapStatus = ctx.scorer.check_new_user_daily_cap(&user, now).await?;
    if cap.exceeded {
        ctx.store
            .log_event(
                "daily_cap_exceeded",
                Severity::Warning,
                json!({
                    "user_id": user.user_id,
                    "task_id": task_id,
                    "current_total": cap.current_total.to_string(),
                    "limit": cap.limit.to_string(),
                }),
                now,
            )
            .await?;
        println!(
            "⚠️  Daily cap reached for new account {} ({} of {})",
            user.user_id, cap.current_total, cap.limit
        );
    }

    let task = ctx.tasks.approve_task(task_id, now).await?;
    println!(
        "✅ Approved task {} (credited {})",
        task.task_id, task.earned_amount
    );
    Ok(())
}

pub async fn reject_task(
    ctx: &AppContext,
    task_id: &str,
    reason: &str,
) -> Result<(), anyhow::Error> {
    let task = ctx.tasks.reject_task(task_id, reason).await?;
    println!("✅ Rejected task {} ({})", task.task_id, reason);
    Ok(())
}

/// Ingest a postback, rate limited per source IP when one is given
pub async fn postback(
    ctx: &AppContext,
    payload: PostbackPayload,
    source_ip: Option<&str>,
) -> Result<(), anyhow::Error> {
    if let Some(ip) = source_ip {
        let decision = ctx.limiter.check(&format!("ip:{ip}"));
        if !decision.allowed {
            anyhow::bail!("rate limited: retry in {}s", decision.reset_in_ms / 1000);
        }
    }

    let outcome = ctx.postbacks.process(&payload, Utc::now()).await?;
    println!(
        "✅ Postback {}: {:?} (task {}, earned {}, balance {})",
        payload.transaction_id,
        outcome.status,
        outcome.task_id,
        outcome.earned_amount,
        outcome.new_balance
    );
    Ok(())
}

pub async fn withdraw(
    ctx: &AppContext,
    user_id: &str,
    amount: Decimal,
    upi_id: &str,
) -> Result<(), anyhow::Error> {
    let withdrawal = ctx
        .withdrawals
        .request(user_id, Amount::new(amount)?, upi_id, Utc::now())
        .await?;
    println!(
        "✅ Withdrawal {} requested: {} to {}",
        withdrawal.withdrawal_id, withdrawal.amount, withdrawal.upi_id
    );
    Ok(())
}

pub async fn approve_withdrawal(
    ctx: &AppContext,
    withdrawal_id: &str,
    external_ref: Option<&str>,
) -> Result<(), anyhow::Error> {
    let withdrawal = ctx
        .withdrawals
        .approve(withdrawal_id, external_ref, Utc::now())
        .await?;
    println!(
        "✅ Withdrawal {} completed ({})",
        withdrawal.withdrawal_id,
        withdrawal.external_ref.as_deref().unwrap_or("no reference")
    );
    Ok(())
}

pub async fn reject_withdrawal(
    ctx: &AppContext,
    withdrawal_id: &str,
    reason: &str,
) -> Result<(), anyhow::Error> {
    let withdrawal = ctx
        .withdrawals
        .reject(withdrawal_id, reason, Utc::now())
        .await?;
    println!(
        "✅ Withdrawal {} rejected, {} refunded",
        withdrawal.withdrawal_id, withdrawal.amount
    );
    Ok(())
}

/// Show a user's balance and activity stats
pub async fn balance(ctx: &AppContext, user_id: &str) -> Result<(), anyhow::Error> {
    let user = ctx.store.get_user(user_id).await?;
    let avg_score = ctx.store.avg_fraud_score(user_id).await?;

    println!("User {}", user.user_id);
    println!("  Balance:         {}", user.balance);
    println!("  Total earnings:  {}", user.total_earnings);
    println!("  Tasks completed: {}", user.tasks_completed);
    println!("  Ads watched:     {}", user.ads_watched);
    println!("  Avg fraud score: {:.1}", avg_score);
    Ok(())
}

/// Show flagged completions awaiting review, riskiest first
pub async fn review_queue(ctx: &AppContext, limit: u32) -> Result<(), anyhow::Error> {
    let queue = ctx.store.review_queue(limit).await?;
    if queue.is_empty() {
        println!("Review queue is empty");
        return Ok(());
    }

    println!("{} task(s) awaiting review:", queue.len());
    for task in queue {
        println!(
            "  {} user={} score={} amount={} provider={}",
            task.task_id,
            task.user_id,
            task.fraud_score,
            task.external_amount.unwrap_or(task.earned_amount),
            task.provider.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}
