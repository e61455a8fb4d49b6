//! Per-host job-duration estimator; blends a static estimate with a moving
//! average of real turnaround (C7).

use crate::error::SchedulerError;
use crate::scheduler::history_store::HistoryStore;
use crate::scheduler::work_cache::WorkUnitCandidate;

/// A duration estimate in seconds, tagged with whether it came from real
/// per-host turnaround history (authoritative) or a static fallback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DurationEstimate {
    pub seconds: f64,
    pub estimated: bool,
}

/// Blends `avg_turnaround` (authoritative when positive) with a static
/// per-workunit estimate (fallback, marked `estimated`).
#[derive(Debug, Clone)]
pub struct DurationOracle {
    history: HistoryStore,
}

impl DurationOracle {
    pub fn new(history: HistoryStore) -> Self {
        Self { history }
    }

    /// Static prediction from workunit characteristics, independent of any
    /// particular host's history.
    pub fn estimate(candidate: &WorkUnitCandidate) -> f64 {
        candidate.static_duration_estimate
    }

    /// SEAS uses `avg_turnaround` when it is strictly positive; otherwise it
    /// falls back to the static estimate and marks the figure "estimated".
    pub async fn duration_for(
        &self,
        candidate: &WorkUnitCandidate,
        host_id: &str,
    ) -> Result<DurationEstimate, SchedulerError> {
        let avg = self.history.avg_turnaround(host_id).await?;
        if avg > 0.0 {
            Ok(DurationEstimate {
                seconds: avg,
                estimated: false,
            })
        } else {
            Ok(DurationEstimate {
                seconds: Self::estimate(candidate),
                estimated: true,
            })
        }
    }
}
