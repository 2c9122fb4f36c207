//! Device fingerprint observations - fraud signal evidence

use crate::error::StoreError;
use crate::models::DeviceRecord;
use crate::store::{fmt_ts, parse_ts, Store};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

fn device_from_row(row: &SqliteRow) -> Result<DeviceRecord, StoreError> {
    let first_seen: String = row.get("first_seen");
    let last_seen: String = row.get("last_seen");

    Ok(DeviceRecord {
        user_id: row.get("user_id"),
        device_hash: row.get("device_hash"),
        ip: row.get("ip"),
        ua_hash: row.get("ua_hash"),
        first_seen: parse_ts(&first_seen)?,
        last_seen: parse_ts(&last_seen)?,
        count: row.get("count"),
    })
}

impl Store {
    /// Record a (user, device) sighting. One upsert: sets ip/ua/last_seen,
    /// bumps `count`, keeps `first_seen` from the original insert.
    pub async fn upsert_device(
        &self,
        user_id: &str,
        device_hash: &str,
        ip: &str,
        ua_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_devices (user_id, device_hash, ip, ua_hash, first_seen, last_seen, count)
            VALUES (?, ?, ?, ?, ?, ?, 1)
            ON CONFLICT(user_id, device_hash) DO UPDATE SET
                ip = excluded.ip,
                ua_hash = excluded.ua_hash,
                last_seen = excluded.last_seen,
                count = user_devices.count + 1
            "#,
        )
        .bind(user_id)
        .bind(device_hash)
        .bind(ip)
        .bind(ua_hash)
        .bind(fmt_ts(now))
        .bind(fmt_ts(now))
        .execute(self.pool())
        .await?;

        Ok(())
    }

    pub async fn get_device(
        &self,
        user_id: &str,
        device_hash: &str,
    ) -> Result<Option<DeviceRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM user_devices WHERE user_id = ? AND device_hash = ?")
            .bind(user_id)
            .bind(device_hash)
            .fetch_optional(self.pool())
            .await?;

        row.as_ref().map(device_from_row).transpose()
    }

    /// How many device records share this source IP with activity at or
    /// after `since` (the IP-farm signal, 24h window at the call site)
    pub async fn count_devices_by_ip_since(
        &self,
        ip: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_devices WHERE ip = ? AND last_seen >= ?",
        )
        .bind(ip)
        .bind(fmt_ts(since))
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }

    /// How many accounts this device fingerprint has been seen on with
    /// activity at or after `since` (the emulator-farm signal, 7d window)
    pub async fn count_device_seen_since(
        &self,
        device_hash: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM user_devices WHERE device_hash = ? AND last_seen >= ?",
        )
        .bind(device_hash)
        .bind(fmt_ts(since))
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }
}
