//! Fast and slow predicates that say whether a slot may be handed to this
//! host (C6).

use crate::error::SchedulerError;
use crate::scheduler::history_store::HistoryStore;
use crate::scheduler::work_cache::WorkUnitCandidate;

/// Why `fast_check` rejected a candidate. Not an error — the scan loop
/// absorbs these and moves on to the next slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfeasibleReason {
    NonCpuIntensive,
    QuotaExceeded,
    Unsuitable,
}

/// Outcome of the slow (store-consulting) feasibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlowCheckOutcome {
    /// The slot may be assigned to this host.
    Ok,
    /// This host is unsuitable; the caller should restore the slot to PRESENT.
    NoHost,
    /// This slot is no longer valid for anyone; the caller should leave it EMPTY.
    NoAny,
}

/// Fast/slow feasibility predicates. The fast path is pure and cheap and
/// holds no locks; the slow path may query the history store.
#[derive(Debug, Clone)]
pub struct FeasibilityOracle {
    history: HistoryStore,
}

impl FeasibilityOracle {
    pub fn new(history: HistoryStore) -> Self {
        Self { history }
    }

    /// Pure, cheap, holds no locks. Rejects slots whose app is non-CPU-intensive,
    /// or whose (app, processor-type) pair has hit its in-progress quota.
    pub fn fast_check(
        candidate: &WorkUnitCandidate,
        in_progress_for_app: u32,
        app_quota: u32,
    ) -> Result<(), InfeasibleReason> {
        if !candidate.cpu_intensive {
            return Err(InfeasibleReason::NonCpuIntensive);
        }
        if in_progress_for_app >= app_quota {
            return Err(InfeasibleReason::QuotaExceeded);
        }
        Ok(())
    }

    /// May query the store. Distinguishes "unsuitable for this host" from
    /// "no longer valid for anyone".
    pub async fn slow_check(
        &self,
        candidate: &WorkUnitCandidate,
        host_id: &str,
    ) -> Result<SlowCheckOutcome, SchedulerError> {
        let results = self.history.results_of(&candidate.workunit_id).await?;

        if results.iter().any(|r| r.is_success()) {
            // Someone already returned a good answer; this slot is stale for everyone.
            return Ok(SlowCheckOutcome::NoAny);
        }
        if results
            .iter()
            .any(|r| r.host_id == host_id && r.is_in_progress())
        {
            // This host already has a replica of this workunit in flight.
            return Ok(SlowCheckOutcome::NoHost);
        }
        Ok(SlowCheckOutcome::Ok)
    }

    /// Re-read the persistent result to guard against a race with another
    /// scheduler instance claiming the same result.
    pub async fn result_still_sendable(
        &self,
        result_id: &str,
        workunit_id: &str,
    ) -> Result<bool, SchedulerError> {
        let results = self.history.results_of(workunit_id).await?;
        Ok(results
            .iter()
            .find(|r| r.id == result_id)
            .map(|r| r.server_state != "done")
            .unwrap_or(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn candidate() -> WorkUnitCandidate {
        WorkUnitCandidate {
            workunit_id: "wu1".into(),
            app_id: "app-1".into(),
            result_id: "wu1-r1".into(),
            server_state: "unsent".into(),
            priority: 0.0,
            report_deadline: 3600.0,
            cpu_intensive: true,
            static_duration_estimate: 600.0,
            delay_bound: 3600.0,
        }
    }

    #[test]
    fn fast_check_rejects_non_cpu_intensive() {
        let mut c = candidate();
        c.cpu_intensive = false;
        let err = FeasibilityOracle::fast_check(&c, 0, 10).unwrap_err();
        assert_eq!(err, InfeasibleReason::NonCpuIntensive);
    }

    #[test]
    fn fast_check_rejects_at_quota() {
        let c = candidate();
        let err = FeasibilityOracle::fast_check(&c, 5, 5).unwrap_err();
        assert_eq!(err, InfeasibleReason::QuotaExceeded);
    }

    #[test]
    fn fast_check_passes_under_quota() {
        let c = candidate();
        assert!(FeasibilityOracle::fast_check(&c, 2, 5).is_ok());
    }

    #[tokio::test]
    async fn slow_check_no_any_when_already_succeeded() {
        let db = Database::test_db().await;
        sqlx::query("INSERT INTO workunit (id, target_nresults, delay_bound, mod_time) VALUES ('wu1', 1, 3600, 0)")
            .execute(&db.pool).await.unwrap();
        sqlx::query(
            "INSERT INTO result (id, workunit_id, sent_time, received_time, outcome, server_state, host_id) \
             VALUES ('r1', 'wu1', 0, 100, 'success', 'done', 'host-a')",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let oracle = FeasibilityOracle::new(HistoryStore::new(db));
        let outcome = oracle.slow_check(&candidate(), "host-b").await.unwrap();
        assert_eq!(outcome, SlowCheckOutcome::NoAny);
    }

    #[tokio::test]
    async fn slow_check_no_host_when_host_already_has_in_flight_replica() {
        let db = Database::test_db().await;
        sqlx::query("INSERT INTO workunit (id, target_nresults, delay_bound, mod_time) VALUES ('wu1', 2, 3600, 0)")
            .execute(&db.pool).await.unwrap();
        sqlx::query(
            "INSERT INTO result (id, workunit_id, sent_time, received_time, outcome, server_state, host_id) \
             VALUES ('r1', 'wu1', 0, NULL, 'in_progress', 'in_progress', 'host-b')",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let oracle = FeasibilityOracle::new(HistoryStore::new(db));
        let outcome = oracle.slow_check(&candidate(), "host-b").await.unwrap();
        assert_eq!(outcome, SlowCheckOutcome::NoHost);
    }

    #[tokio::test]
    async fn slow_check_ok_when_fresh() {
        let db = Database::test_db().await;
        let oracle = FeasibilityOracle::new(HistoryStore::new(db));
        let outcome = oracle.slow_check(&candidate(), "host-b").await.unwrap();
        assert_eq!(outcome, SlowCheckOutcome::Ok);
    }

    #[tokio::test]
    async fn result_still_sendable_false_once_done() {
        let db = Database::test_db().await;
        sqlx::query("INSERT INTO workunit (id, target_nresults, delay_bound, mod_time) VALUES ('wu1', 1, 3600, 0)")
            .execute(&db.pool).await.unwrap();
        sqlx::query(
            "INSERT INTO result (id, workunit_id, sent_time, received_time, outcome, server_state, host_id) \
             VALUES ('r1', 'wu1', 0, 100, 'success', 'done', 'host-a')",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let oracle = FeasibilityOracle::new(HistoryStore::new(db));
        assert!(!oracle.result_still_sendable("r1", "wu1").await.unwrap());
    }

    #[tokio::test]
    async fn result_still_sendable_true_when_unknown() {
        let db = Database::test_db().await;
        let oracle = FeasibilityOracle::new(HistoryStore::new(db));
        assert!(oracle.result_still_sendable("r-nope", "wu1").await.unwrap());
    }
}
