//! Read-only queries over past jobs/results for RL-Repl reward computation (C4).

use crate::db::models::{PastJob, PastResult};
use crate::db::Database;
use crate::error::SchedulerError;

/// Read-only view over the `workunit`/`result` history tables. Queries are
/// parameterized; results need not be consistent snapshots across calls —
/// RL-Repl tolerates small skew.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    db: Database,
}

impl HistoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Up to `limit` most recently modified past workunits with the given
    /// replication factor, excluding `exclude_id`, newest first.
    pub async fn recent_workunits_with_replication(
        &self,
        target_nresults: i64,
        exclude_id: &str,
        limit: i64,
    ) -> Result<Vec<PastJob>, SchedulerError> {
        sqlx::query_as::<_, PastJob>(
            r#"
            SELECT id, target_nresults, delay_bound, mod_time FROM workunit
            WHERE target_nresults = ? AND id != ?
            ORDER BY mod_time DESC
            LIMIT ?
            "#,
        )
        .bind(target_nresults)
        .bind(exclude_id)
        .bind(limit)
        .fetch_all(&self.db.pool)
        .await
        .map_err(SchedulerError::from)
    }

    /// Results of a past workunit, ordered by descending receive time
    /// (still-in-progress results, with a null `received_time`, sort first).
    pub async fn results_of(&self, workunit_id: &str) -> Result<Vec<PastResult>, SchedulerError> {
        sqlx::query_as::<_, PastResult>(
            r#"
            SELECT id, workunit_id, sent_time, received_time, initial_battery_charge_pct,
                   final_battery_charge_pct, outcome, server_state, host_id
            FROM result
            WHERE workunit_id = ?
            ORDER BY received_time IS NOT NULL, received_time DESC
            "#,
        )
        .bind(workunit_id)
        .fetch_all(&self.db.pool)
        .await
        .map_err(SchedulerError::from)
    }

    /// Per-host running mean of observed turnaround (`received_time -
    /// sent_time` over completed results). Returns 0 when there is no data,
    /// which callers treat as "not yet authoritative".
    pub async fn avg_turnaround(&self, host_id: &str) -> Result<f64, SchedulerError> {
        let row: (Option<f64>,) = sqlx::query_as(
            r#"
            SELECT AVG(received_time - sent_time) FROM result
            WHERE host_id = ? AND received_time IS NOT NULL
            "#,
        )
        .bind(host_id)
        .fetch_one(&self.db.pool)
        .await
        .map_err(SchedulerError::from)?;

        Ok(row.0.unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_workunit(db: &Database, id: &str, target_nresults: i64, delay_bound: f64, mod_time: f64) {
        sqlx::query("INSERT INTO workunit (id, target_nresults, delay_bound, mod_time) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(target_nresults)
            .bind(delay_bound)
            .bind(mod_time)
            .execute(&db.pool)
            .await
            .unwrap();
    }

    #[allow(clippy::too_many_arguments)]
    async fn seed_result(
        db: &Database,
        id: &str,
        workunit_id: &str,
        sent_time: f64,
        received_time: Option<f64>,
        outcome: &str,
        server_state: &str,
        host_id: &str,
    ) {
        sqlx::query(
            "INSERT INTO result (id, workunit_id, sent_time, received_time, outcome, server_state, host_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(workunit_id)
        .bind(sent_time)
        .bind(received_time)
        .bind(outcome)
        .bind(server_state)
        .bind(host_id)
        .execute(&db.pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn recent_workunits_orders_by_mod_time_desc_and_excludes_current() {
        let db = Database::test_db().await;
        seed_workunit(&db, "wu1", 2, 600.0, 100.0).await;
        seed_workunit(&db, "wu2", 2, 600.0, 300.0).await;
        seed_workunit(&db, "wu3", 2, 600.0, 200.0).await;
        seed_workunit(&db, "wu4", 3, 600.0, 400.0).await; // different replication

        let store = HistoryStore::new(db);
        let results = store
            .recent_workunits_with_replication(2, "wu2", 5)
            .await
            .unwrap();

        let ids: Vec<&str> = results.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["wu3", "wu1"]);
    }

    #[tokio::test]
    async fn avg_turnaround_ignores_in_progress_results() {
        let db = Database::test_db().await;
        seed_workunit(&db, "wu1", 1, 600.0, 100.0).await;
        seed_result(&db, "r1", "wu1", 0.0, Some(100.0), "success", "done", "host-1").await;
        seed_result(&db, "r2", "wu1", 0.0, Some(300.0), "success", "done", "host-1").await;
        seed_result(&db, "r3", "wu1", 0.0, None, "in_progress", "in_progress", "host-1").await;

        let store = HistoryStore::new(db);
        let avg = store.avg_turnaround("host-1").await.unwrap();
        assert_eq!(avg, 200.0);
    }

    #[tokio::test]
    async fn avg_turnaround_with_no_data_is_zero() {
        let db = Database::test_db().await;
        let store = HistoryStore::new(db);
        let avg = store.avg_turnaround("ghost-host").await.unwrap();
        assert_eq!(avg, 0.0);
    }

    #[tokio::test]
    async fn results_of_orders_in_progress_first_then_by_received_time_desc() {
        let db = Database::test_db().await;
        seed_workunit(&db, "wu1", 1, 600.0, 100.0).await;
        seed_result(&db, "r1", "wu1", 0.0, Some(100.0), "success", "done", "host-1").await;
        seed_result(&db, "r2", "wu1", 0.0, None, "in_progress", "in_progress", "host-2").await;
        seed_result(&db, "r3", "wu1", 0.0, Some(300.0), "success", "done", "host-3").await;

        let store = HistoryStore::new(db);
        let results = store.results_of("wu1").await.unwrap();
        assert_eq!(results[0].id, "r2"); // in-progress sorts first
        assert_eq!(results[1].id, "r3");
        assert_eq!(results[2].id, "r1");
    }
}
