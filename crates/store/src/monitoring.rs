//! Monitoring events - append-only audit trail with TTL expiry

use crate::error::StoreError;
use crate::models::{MonitoringEvent, Severity};
use crate::store::{fmt_ts, parse_ts, Store};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

fn event_from_row(row: &SqliteRow) -> Result<MonitoringEvent, StoreError> {
    let severity: String = row.get("severity");
    let details: String = row.get("details");
    let timestamp: String = row.get("timestamp");

    Ok(MonitoringEvent {
        id: row.get("id"),
        event_type: row.get("event_type"),
        severity: Severity::from_str(&severity)
            .ok_or_else(|| StoreError::Corrupt(format!("severity: {severity}")))?,
        details: serde_json::from_str(&details)?,
        timestamp: parse_ts(&timestamp)?,
    })
}

impl Store {
    /// Append a monitoring event. Critical events are additionally surfaced
    /// through tracing so an operator sees them without querying the table.
    pub async fn log_event(
        &self,
        event_type: &str,
        severity: Severity,
        details: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if severity == Severity::Critical {
            tracing::error!(event_type, %details, "critical monitoring event");
        }

        sqlx::query(
            r#"
            INSERT INTO monitoring_logs (event_type, severity, details, timestamp)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(event_type)
        .bind(severity.as_str())
        .bind(details.to_string())
        .bind(fmt_ts(now))
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Drop events older than the cutoff. Returns the purged count.
    pub async fn purge_events_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM monitoring_logs WHERE timestamp < ?")
            .bind(fmt_ts(cutoff))
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    /// Events of one type, newest first (used by tests and operator queries)
    pub async fn events_by_type(
        &self,
        event_type: &str,
    ) -> Result<Vec<MonitoringEvent>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM monitoring_logs WHERE event_type = ? ORDER BY id DESC",
        )
        .bind(event_type)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(event_from_row).collect()
    }
}
