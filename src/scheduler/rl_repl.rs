//! ε-greedy bandit over replica counts, rewarded from historical QoS and
//! energy outcomes (C9).

use rand::RngExt;

use crate::error::SchedulerError;
use crate::scheduler::history_store::HistoryStore;
use crate::scheduler::status_store::StatusStore;
use crate::sched_blob::SchedBlob;

const PAST_WORKUNITS_PER_REPLICA_COUNT: i64 = 5;
const DEFAULT_DR: f64 = 300.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RlReplConfig {
    pub k_factor: f64,
    /// Carried from the original tunable; not multiplied directly into the
    /// reward formula (see module docs), exposed for callers that want to
    /// scale the wasted-energy term before folding it in.
    pub k_wasted_energy_impact: f64,
    pub explorative_prob: f64,
    pub max_replicas: u32,
}

impl Default for RlReplConfig {
    fn default() -> Self {
        Self {
            k_factor: 10.0,
            k_wasted_energy_impact: 7.0,
            explorative_prob: 0.2,
            max_replicas: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReplicationDecision {
    pub replicas: u32,
    pub quorum: u32,
}

/// Bandit over `{1..=max_replicas}`, trained from the same `workunit`/`result`
/// history `FeasibilityOracle`/`DurationOracle` read.
#[derive(Debug, Clone)]
pub struct RlReplEngine {
    history: HistoryStore,
    status: StatusStore,
    config: RlReplConfig,
}

impl RlReplEngine {
    pub fn new(history: HistoryStore, status: StatusStore, config: RlReplConfig) -> Self {
        Self {
            history,
            status,
            config,
        }
    }

    /// Decide how many replicas to create for a new workunit, plus the
    /// quorum (always 1).
    pub async fn decide_replicas(
        &self,
        exclude_workunit_id: &str,
        now: f64,
    ) -> Result<ReplicationDecision, SchedulerError> {
        let max_replicas = self.config.max_replicas.max(1);
        let mut rewards: Vec<(u32, f64)> = Vec::new();
        for r in 1..=max_replicas {
            if let Some(reward) = self
                .reward_for_replica_count(r, exclude_workunit_id, now)
                .await?
            {
                rewards.push((r, reward));
            }
        }

        let u = rand::rng().random_range(0.0..1.0);
        let replicas = if u < self.config.explorative_prob || rewards.is_empty() {
            rand::rng().random_range(1..=max_replicas)
        } else {
            let mut best: Option<(u32, f64)> = None;
            for (r, reward) in rewards {
                best = match best {
                    None => Some((r, reward)),
                    Some((br, breward)) if reward > breward => Some((r, reward)),
                    Some(kept) => Some(kept),
                };
            }
            best.map(|(r, _)| r).unwrap_or(1)
        };

        Ok(ReplicationDecision {
            replicas,
            quorum: 1,
        })
    }

    /// `reward[r]`, or `None` if no past workunit at this replica count
    /// yielded a verdict (treated by the caller as "no data").
    ///
    /// The per-replica-count reward is the last evaluated past workunit's
    /// verdict, unless a QoS failure (over-replication or an overdue
    /// in-progress result) short-circuits the scan for this `r`.
    async fn reward_for_replica_count(
        &self,
        r: u32,
        exclude_workunit_id: &str,
        now: f64,
    ) -> Result<Option<f64>, SchedulerError> {
        let past = self
            .history
            .recent_workunits_with_replication(
                r as i64,
                exclude_workunit_id,
                PAST_WORKUNITS_PER_REPLICA_COUNT,
            )
            .await?;

        let mut reward: Option<f64> = None;

        for job in past {
            let results = self.history.results_of(&job.id).await?;

            if results.len() as u32 > r {
                reward = Some(-self.config.k_factor);
                break;
            }

            let mut found_good = false;
            let mut wasted_energy = 0.0;
            let mut qos_failure = false;

            for res in &results {
                let is_good = res.outcome == "success"
                    && res
                        .received_time
                        .map(|recv| {
                            let rtt = recv - res.sent_time;
                            rtt > 0.0 && rtt <= job.delay_bound
                        })
                        .unwrap_or(false);
                if is_good {
                    found_good = true;
                }

                if res.received_time.is_none() {
                    let elapsed = now - res.sent_time;
                    if elapsed > job.delay_bound {
                        qos_failure = true;
                    }
                }

                if res.outcome == "success" {
                    wasted_energy += res.initial_battery_charge_pct - res.final_battery_charge_pct;
                } else {
                    let avg_turnaround = self.history.avg_turnaround(&res.host_id).await?;
                    let dr = self.discharge_rate_for(&res.host_id).await?;
                    let drs = if dr > 0.0 { 1.0 / dr } else { 0.0 };
                    wasted_energy += avg_turnaround * drs;
                }
            }

            if qos_failure {
                reward = Some(-self.config.k_factor);
                break;
            }

            reward = Some(if found_good {
                ((100.0 - wasted_energy) / 100.0) * self.config.k_factor
            } else {
                -self.config.k_factor
            });
        }

        Ok(reward)
    }

    /// Best-effort lookup of a host's current discharge rate, degrading to
    /// the SEAS default when the host has no status row or no samples yet.
    async fn discharge_rate_for(&self, host_id: &str) -> Result<f64, SchedulerError> {
        match self.status.get(host_id).await {
            Ok(row) => {
                let blob = SchedBlob::decode(&row.mge_sched_data);
                Ok(if blob.dr > 0.0 { blob.dr } else { DEFAULT_DR })
            }
            Err(SchedulerError::NotFound) => Ok(DEFAULT_DR),
            Err(e) => Err(e),
        }
    }
}
