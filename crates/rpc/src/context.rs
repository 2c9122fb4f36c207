//! Application context - wires everything together

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use taskpay_fraud::FraudScorer;
use taskpay_ledger::{TaskLedger, WithdrawalLedger};
use taskpay_postback::{PostbackLog, PostbackProcessor};
use taskpay_ratelimit::{RateLimiter, TaskTimer};
use taskpay_store::Store;
use tracing::debug;

use crate::config::AppConfig;

/// Monitoring events older than this are purged by the maintenance sweep
const MONITORING_RETENTION_DAYS: i64 = 30;

/// Wires together all components over one data directory
/// (`taskpay.db` + `postbacks.jsonl`).
pub struct AppContext {
    pub store: Store,
    pub limiter: Arc<RateLimiter>,
    pub timer: Arc<TaskTimer>,
    pub scorer: FraudScorer,
    pub tasks: TaskLedger,
    pub withdrawals: WithdrawalLedger,
    pub postbacks: PostbackProcessor,
    data_path: PathBuf,
}

impl AppContext {
    pub async fn with_config(
        data_path: impl AsRef<Path>,
        config: AppConfig,
    ) -> Result<Self, anyhow::Error> {
        let data_path = data_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_path)?;

        let store = Store::new(data_path.join("taskpay.db")).await?;
        let log = Arc::new(PostbackLog::new(data_path.join("postbacks.jsonl"))?);

        let limiter = Arc::new(RateLimiter::new(config.rate_limit));
        let timer = Arc::new(TaskTimer::new());
        let scorer = FraudScorer::new(store.clone(), config.fraud);
        let tasks = TaskLedger::new(store.clone());
        let withdrawals = WithdrawalLedger::new(store.clone(), config.withdrawal);
        let postbacks = PostbackProcessor::new(store.clone(), log, config.postback);

        Ok(Self {
            store,
            limiter,
            timer,
            scorer,
            tasks,
            withdrawals,
            postbacks,
            data_path,
        })
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Spawn the background sweeps: rate-limit windows every minute, stale
    /// task timers every five, expired monitoring events daily. Handles are
    /// returned so a caller can abort them on shutdown.
    pub fn spawn_maintenance(&self) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        let limiter = Arc::clone(&self.limiter);
        handles.push(tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(60));
            tick.tick().await;
            loop {
                tick.tick().await;
                let removed = limiter.sweep();
                debug!(removed, "swept rate-limit windows");
            }
        }));

        let timer = Arc::clone(&self.timer);
        handles.push(tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(300));
            tick.tick().await;
            loop {
                tick.tick().await;
                let removed = timer.sweep();
                debug!(removed, "swept stale task timers");
            }
        }));

        let store = self.store.clone();
        handles.push(tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(86_400));
            tick.tick().await;
            loop {
                tick.tick().await;
                let cutoff = Utc::now() - Duration::days(MONITORING_RETENTION_DAYS);
                match store.purge_events_before(cutoff).await {
                    Ok(purged) => debug!(purged, "purged expired monitoring events"),
                    Err(e) => tracing::warn!(error = %e, "monitoring purge failed"),
                }
            }
        }));

        handles
    }
}
