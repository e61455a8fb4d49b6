pub mod context;
pub mod duration;
pub mod feasibility;
pub mod history_store;
pub mod rl_repl;
pub mod seas;
pub mod status_store;
pub mod work_cache;

use crate::config::AppConfig;
use crate::db::Database;
use crate::error::SchedulerError;
use context::RequestContext;
use duration::DurationOracle;
use feasibility::FeasibilityOracle;
use history_store::HistoryStore;
use rl_repl::{RlReplConfig, RlReplEngine, ReplicationDecision};
use seas::{SeasConfig, SeasEngine};
use status_store::StatusStore;
use work_cache::{WorkCache, WorkUnitCandidate};

/// Composition root (C10): wires the stores and engines initialized once at
/// startup, replacing the original's process-wide globals. Cloning is cheap —
/// every field is itself `Arc`-backed or a thin `Database` handle.
#[derive(Debug, Clone)]
pub struct Scheduler {
    status: StatusStore,
    history: HistoryStore,
    work_cache: WorkCache,
    seas: SeasEngine,
    rl_repl: RlReplEngine,
}

impl Scheduler {
    pub fn new(db: Database, config: &AppConfig) -> Self {
        let status = StatusStore::new(db.clone());
        let history = HistoryStore::new(db.clone());
        let work_cache = WorkCache::new(config.work_cache_capacity);
        let feasibility = FeasibilityOracle::new(history.clone());
        let duration = DurationOracle::new(history.clone());

        let seas = SeasEngine::new(
            status.clone(),
            work_cache.clone(),
            feasibility,
            duration,
            SeasConfig {
                app_quota: config.app_quota,
                backoff_avoidance_enabled: config.backoff_avoidance_enabled,
            },
        );

        let rl_repl = RlReplEngine::new(
            history.clone(),
            status.clone(),
            RlReplConfig {
                max_replicas: config.max_replicas,
                explorative_prob: config.explorative_prob,
                ..RlReplConfig::default()
            },
        );

        Self {
            status,
            history,
            work_cache,
            seas,
            rl_repl,
        }
    }

    /// Feeder entry point: publish a candidate assignment into a work-cache
    /// slot. Used by tests and by any future job-submission path.
    pub fn publish_candidate(&self, index: usize, candidate: WorkUnitCandidate) -> bool {
        self.work_cache.fill(index, candidate)
    }

    pub fn work_cache_capacity(&self) -> usize {
        self.work_cache.capacity()
    }

    /// Run one SEAS scheduling RPC to completion (DECODE -> PREDICT -> ADMIT
    /// -> SCAN -> PERSIST).
    pub async fn schedule(&self, ctx: &mut RequestContext) -> Result<(), SchedulerError> {
        self.seas.run(ctx).await
    }

    /// Decide a replica count + quorum for a new workunit.
    pub async fn replicate(
        &self,
        exclude_workunit_id: &str,
        now: f64,
    ) -> Result<ReplicationDecision, SchedulerError> {
        self.rl_repl.decide_replicas(exclude_workunit_id, now).await
    }

    pub fn status_store(&self) -> &StatusStore {
        &self.status
    }

    pub fn history_store(&self) -> &HistoryStore {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_status::DeviceStatus;
    use crate::scheduler::context::ScheduleRequest;

    fn config() -> AppConfig {
        AppConfig {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: "sqlite::memory:".into(),
            work_cache_capacity: 4,
            battery_charge_min_pct: 10.0,
            backoff_avoidance_enabled: true,
            max_replicas: 5,
            explorative_prob: 0.0,
            app_quota: 4,
            request_timeout_secs: 30,
        }
    }

    #[tokio::test]
    async fn schedule_persists_blob_and_can_assign_published_candidate() {
        let db = Database::test_db().await;
        let scheduler = Scheduler::new(db, &config());

        let candidate = WorkUnitCandidate {
            workunit_id: "wu1".into(),
            app_id: "app-1".into(),
            result_id: "wu1-r1".into(),
            server_state: "unsent".into(),
            priority: 0.0,
            report_deadline: 3600.0,
            cpu_intensive: true,
            static_duration_estimate: 600.0,
            delay_bound: 3600.0,
        };
        assert!(scheduler.publish_candidate(0, candidate));

        let request = ScheduleRequest {
            host_id: "host-1".into(),
            device_status: DeviceStatus {
                battery_charge_pct: 95.0,
                ..Default::default()
            },
            device_status_time: 1_700_000_000.0,
            requested_cpu_instances: 1,
            battery_charge_min_pct: 10.0,
            other_project_in_progress: Vec::new(),
            current_project_result_count: 0,
        };
        let mut ctx = RequestContext::new(request, 1, 1_700_000_000.0);
        scheduler.schedule(&mut ctx).await.unwrap();

        assert_eq!(ctx.reply.jobs.len(), 1);
        assert!(ctx.reply.updated_sched_blob.is_some());
    }

    #[tokio::test]
    async fn replicate_with_no_history_still_returns_a_decision() {
        let db = Database::test_db().await;
        let scheduler = Scheduler::new(db, &config());
        let decision = scheduler.replicate("wu-new", 0.0).await.unwrap();
        assert!((1..=5).contains(&decision.replicas));
        assert_eq!(decision.quorum, 1);
    }
}
