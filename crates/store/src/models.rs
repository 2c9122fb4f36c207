//! Persisted record types and their status enums

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskpay_core::Amount;

fn short_id(prefix: &str) -> String {
    format!(
        "{}-{}",
        prefix,
        uuid::Uuid::new_v4().to_string()[..8].to_uppercase()
    )
}

/// Lifecycle of a reward-earning attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Created, offer opened, completion not yet submitted
    Pending,
    /// Completion submitted, awaiting an approve/reject decision
    Completed,
    /// Terminal: payout credited
    Approved,
    /// Terminal: no payout
    Rejected,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TaskStatus::Pending),
            "completed" => Some(TaskStatus::Completed),
            "approved" => Some(TaskStatus::Approved),
            "rejected" => Some(TaskStatus::Rejected),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Approved | TaskStatus::Rejected)
    }
}

/// How an offer is earned and reviewed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferCategory {
    /// Pays out after manual approval
    Earnable,
    /// Pays out after verification of submitted proof
    Conditional,
    /// Auto-approved on completion, zero payout
    ViewOnly,
}

impl OfferCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferCategory::Earnable => "earnable",
            OfferCategory::Conditional => "conditional",
            OfferCategory::ViewOnly => "view_only",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "earnable" => Some(OfferCategory::Earnable),
            "conditional" => Some(OfferCategory::Conditional),
            "view_only" => Some(OfferCategory::ViewOnly),
            _ => None,
        }
    }

    /// Conditional offers require a proof reference at completion
    pub fn requires_proof(&self) -> bool {
        matches!(self, OfferCategory::Conditional)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfferStatus {
    Active,
    Inactive,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Active => "active",
            OfferStatus::Inactive => "inactive",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(OfferStatus::Active),
            "inactive" => Some(OfferStatus::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WithdrawalStatus {
    /// Amount already debited, awaiting processing
    Pending,
    /// Terminal: paid out externally
    Completed,
    /// Terminal: debited amount refunded
    Rejected,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(WithdrawalStatus::Pending),
            "completed" => Some(WithdrawalStatus::Completed),
            "rejected" => Some(WithdrawalStatus::Rejected),
            _ => None,
        }
    }
}

/// Severity of a monitoring event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "info" => Some(Severity::Info),
            "warning" => Some(Severity::Warning),
            "error" => Some(Severity::Error),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }
}

/// A platform user
///
/// Identity is an opaque, externally verified id; authentication is out of
/// scope. `balance` is spendable, `total_earnings` is lifetime and only ever
/// grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub balance: Amount,
    pub total_earnings: Amount,
    pub ads_watched: i64,
    pub tasks_completed: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            balance: Amount::ZERO,
            total_earnings: Amount::ZERO,
            ads_watched: 0,
            tasks_completed: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whole days since account creation, floored
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}

/// An earnable unit. Read-only input to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub offer_id: String,
    pub title: String,
    pub payout: Amount,
    pub category: OfferCategory,
    pub duration_seconds: i64,
    pub status: OfferStatus,
}

impl Offer {
    pub fn new(
        title: impl Into<String>,
        payout: Amount,
        category: OfferCategory,
        duration_seconds: i64,
    ) -> Self {
        Self {
            offer_id: short_id("OFFER"),
            title: title.into(),
            payout,
            category,
            duration_seconds,
            status: OfferStatus::Active,
        }
    }
}

/// One user's attempt to earn from one offer
///
/// `external_transaction_id`, when present, is globally unique (partial
/// unique index) and identifies a postback-created task. `external_amount`
/// is the amount the affiliate network reported; it is what a reviewer
/// approval credits when there is no internal offer to take a payout from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub user_id: String,
    pub offer_id: Option<String>,
    pub status: TaskStatus,
    pub earned_amount: Amount,
    pub external_amount: Option<Amount>,
    pub external_transaction_id: Option<String>,
    pub provider: Option<String>,
    pub offer_name: Option<String>,
    pub currency: Option<String>,
    pub fraud_score: u8,
    pub flagged: bool,
    pub proof_ref: Option<String>,
    pub rejection_reason: Option<String>,
    pub opened_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// A freshly opened internal task for an offer
    pub fn opened(user_id: impl Into<String>, offer_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            task_id: short_id("TASK"),
            user_id: user_id.into(),
            offer_id: Some(offer_id.into()),
            status: TaskStatus::Pending,
            earned_amount: Amount::ZERO,
            external_amount: None,
            external_transaction_id: None,
            provider: None,
            offer_name: None,
            currency: None,
            fraud_score: 0,
            flagged: false,
            proof_ref: None,
            rejection_reason: None,
            opened_at: now,
            completed_at: None,
        }
    }

    /// A task recorded from an external postback. Trusted source: fraud
    /// score 0, opened and completed in the same instant.
    #[allow(clippy::too_many_arguments)]
    pub fn from_postback(
        user_id: impl Into<String>,
        provider: impl Into<String>,
        transaction_id: impl Into<String>,
        amount: Amount,
        offer_name: Option<String>,
        currency: Option<String>,
        status: TaskStatus,
        earned_amount: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id: short_id("TASK"),
            user_id: user_id.into(),
            offer_id: None,
            status,
            earned_amount,
            external_amount: Some(amount),
            external_transaction_id: Some(transaction_id.into()),
            provider: Some(provider.into()),
            offer_name,
            currency,
            fraud_score: 0,
            flagged: false,
            proof_ref: None,
            rejection_reason: None,
            opened_at: now,
            completed_at: Some(now),
        }
    }
}

/// A (user, device fingerprint) observation. Fraud evidence only, never
/// authoritative identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub user_id: String,
    pub device_hash: String,
    pub ip: String,
    pub ua_hash: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub count: i64,
}

/// A withdrawal request
///
/// A `pending` withdrawal has already had `amount` debited from the user's
/// balance; rejection must refund exactly that amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub withdrawal_id: String,
    pub user_id: String,
    pub amount: Amount,
    pub upi_id: String,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub external_ref: Option<String>,
    pub rejection_reason: Option<String>,
}

impl Withdrawal {
    pub fn pending(
        user_id: impl Into<String>,
        amount: Amount,
        upi_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            withdrawal_id: short_id("WDR"),
            user_id: user_id.into(),
            amount,
            upi_id: upi_id.into(),
            status: WithdrawalStatus::Pending,
            created_at: now,
            processed_at: None,
            external_ref: None,
            rejection_reason: None,
        }
    }
}

/// Append-only audit record for fraud-relevant and error conditions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringEvent {
    pub id: i64,
    pub event_type: String,
    pub severity: Severity,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
