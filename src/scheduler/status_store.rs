//! Persistent per-host device-status row with upsert and point-read (C3).

use crate::db::models::HostStatusRow;
use crate::db::Database;
use crate::error::SchedulerError;

/// Thin wrapper over the `device_status` table. Cloning is cheap — it holds
/// only a `Database` handle (itself an `Arc`-backed pool).
#[derive(Debug, Clone)]
pub struct StatusStore {
    db: Database,
}

impl StatusStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// At most one row per host. `NotFound` is benign — callers decide
    /// whether to `ensure` and retry.
    pub async fn get(&self, host_id: &str) -> Result<HostStatusRow, SchedulerError> {
        sqlx::query_as::<_, HostStatusRow>("SELECT * FROM device_status WHERE host_id = ?")
            .bind(host_id)
            .fetch_one(&self.db.pool)
            .await
            .map_err(SchedulerError::from)
    }

    /// Insert-or-update. Guarantees the next `get` observes the new values.
    pub async fn upsert(&self, row: &HostStatusRow) -> Result<(), SchedulerError> {
        sqlx::query(
            r#"
            INSERT INTO device_status (
                host_id, on_ac_power, on_usb_power, battery_charge_pct, battery_state,
                battery_temperature_celsius, wifi_online, user_active, last_update_time, mge_sched_data
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(host_id) DO UPDATE SET
                on_ac_power = excluded.on_ac_power,
                on_usb_power = excluded.on_usb_power,
                battery_charge_pct = excluded.battery_charge_pct,
                battery_state = excluded.battery_state,
                battery_temperature_celsius = excluded.battery_temperature_celsius,
                wifi_online = excluded.wifi_online,
                user_active = excluded.user_active,
                last_update_time = excluded.last_update_time,
                mge_sched_data = excluded.mge_sched_data
            "#,
        )
        .bind(&row.host_id)
        .bind(row.on_ac_power)
        .bind(row.on_usb_power)
        .bind(row.battery_charge_pct)
        .bind(row.battery_state)
        .bind(row.battery_temperature_celsius)
        .bind(row.wifi_online)
        .bind(row.user_active)
        .bind(row.last_update_time)
        .bind(&row.mge_sched_data)
        .execute(&self.db.pool)
        .await
        .map_err(SchedulerError::from)?;

        Ok(())
    }

    /// Create an empty row if none exists. `Conflict` (the row already
    /// existed) is benign.
    pub async fn ensure(&self, host_id: &str) -> Result<(), SchedulerError> {
        let result = sqlx::query(
            r#"
            INSERT INTO device_status (host_id) VALUES (?)
            ON CONFLICT(host_id) DO NOTHING
            "#,
        )
        .bind(host_id)
        .execute(&self.db.pool)
        .await
        .map_err(SchedulerError::from)?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::Conflict(format!(
                "host {host_id} already has a status row"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_on_missing_host_is_not_found() {
        let db = Database::test_db().await;
        let store = StatusStore::new(db);
        let err = store.get("nohost").await.unwrap_err();
        assert!(matches!(err, SchedulerError::NotFound));
    }

    #[tokio::test]
    async fn upsert_then_get_observes_new_values() {
        let db = Database::test_db().await;
        let store = StatusStore::new(db);
        let mut row = HostStatusRow::empty("host-1");
        row.battery_charge_pct = 87.0;
        row.mge_sched_data = "abc123".into();

        store.upsert(&row).await.unwrap();
        let fetched = store.get("host-1").await.unwrap();
        assert_eq!(fetched.battery_charge_pct, 87.0);
        assert_eq!(fetched.mge_sched_data, "abc123");

        // second upsert (last writer wins)
        row.battery_charge_pct = 50.0;
        store.upsert(&row).await.unwrap();
        let fetched = store.get("host-1").await.unwrap();
        assert_eq!(fetched.battery_charge_pct, 50.0);
    }

    #[tokio::test]
    async fn ensure_creates_empty_row_once() {
        let db = Database::test_db().await;
        let store = StatusStore::new(db);
        store.ensure("host-2").await.unwrap();
        let fetched = store.get("host-2").await.unwrap();
        assert_eq!(fetched.battery_charge_pct, 0.0);

        let err = store.ensure("host-2").await.unwrap_err();
        assert!(matches!(err, SchedulerError::Conflict(_)));
    }
}
