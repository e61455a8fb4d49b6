//! Explicit per-RPC request/reply value (C11), replacing the process-wide
//! globals the original scheduler used to thread this state through SEAS and
//! RL-Repl.

use serde::{Deserialize, Serialize};

use crate::device_status::DeviceStatus;
use crate::scheduler::work_cache::WorkUnitCandidate;

/// One other-project result the client reports as still in progress,
/// contributing to `in_progress` pipeline time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InProgressResult {
    pub estimated_completion_time: f64,
}

/// Everything the SEAS engine needs from a single scheduler RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRequest {
    pub host_id: String,
    pub device_status: DeviceStatus,
    /// Epoch seconds at which `device_status` was sampled on the client.
    pub device_status_time: f64,
    pub requested_cpu_instances: u32,
    /// Preference: device contributes no uptime below this charge percentage.
    pub battery_charge_min_pct: f64,
    /// Results the client reports as in-progress for *other* projects.
    pub other_project_in_progress: Vec<InProgressResult>,
    /// Count of results already at this host for *this* project.
    pub current_project_result_count: u32,
}

impl ScheduleRequest {
    pub fn requests_cpu_work(&self) -> bool {
        self.requested_cpu_instances > 0
    }

    pub fn on_external_power(&self) -> bool {
        self.device_status.on_ac_power || self.device_status.on_usb_power
    }
}

/// Accumulates outgoing job assignments plus the server-side SchedBlob
/// update for a single RPC.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleReply {
    pub jobs: Vec<WorkUnitCandidate>,
    /// Server-side only; never shipped back to the client verbatim, but
    /// exposed here so callers (and tests) can observe what was persisted.
    pub updated_sched_blob: Option<String>,
}

impl ScheduleReply {
    pub fn append(&mut self, candidate: WorkUnitCandidate) {
        self.jobs.push(candidate);
    }
}

/// Threads request + reply state through one SEAS invocation. Replaces the
/// original's process-global "current request"/"current reply" ambient
/// state with an explicit, independently-constructible value.
pub struct RequestContext {
    pub request: ScheduleRequest,
    pub reply: ScheduleReply,
    /// Identifies this worker for WorkCache claims. Distinct RPC handlers
    /// (even within the same process) should use distinct pids so a claim
    /// race is always observable.
    pub pid: u64,
    /// Wall-clock "now", injected so uptime-prediction math is testable.
    pub now: f64,
}

impl RequestContext {
    pub fn new(request: ScheduleRequest, pid: u64, now: f64) -> Self {
        Self {
            request,
            reply: ScheduleReply::default(),
            pid,
            now,
        }
    }
}
