//! Uptime prediction + admission control + per-slot scan; emits assignments
//! to the reply (C8) — the hard path.

use tracing::{debug, warn};

use crate::db::models::HostStatusRow;
use crate::error::SchedulerError;
use crate::sched_blob::SchedBlob;
use crate::scheduler::context::RequestContext;
use crate::scheduler::duration::DurationOracle;
use crate::scheduler::feasibility::{FeasibilityOracle, SlowCheckOutcome};
use crate::scheduler::status_store::StatusStore;
use crate::scheduler::work_cache::WorkCache;

/// Reset threshold: a gap longer than this between reports discards the
/// running uptime average rather than trusting a stale baseline.
const RESET_GAP_SECONDS: f64 = 6.0 * 3600.0;
/// Epsilon (percentage points) below which a charge reading is treated as unchanged.
const CHARGE_EPSILON: f64 = 0.1;
/// Discharge-rate default at first use, seconds per percentage point.
const DEFAULT_DR: f64 = 300.0;

#[derive(Debug, Clone)]
pub struct SeasConfig {
    /// In-progress-result quota per (app, processor-type) pair, consulted by
    /// the fast feasibility check.
    pub app_quota: u32,
    /// Flag-gates the backoff-avoidance single-job override (§9 open issue).
    pub backoff_avoidance_enabled: bool,
}

impl Default for SeasConfig {
    fn default() -> Self {
        Self {
            app_quota: 4,
            backoff_avoidance_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct UptimePrediction {
    remaining: f64,
    available: f64,
}

/// The SEAS engine: composes StatusStore, WorkCache, FeasibilityOracle and
/// DurationOracle to decide how many (and which) jobs to hand to a host.
#[derive(Debug, Clone)]
pub struct SeasEngine {
    status: StatusStore,
    work_cache: WorkCache,
    feasibility: FeasibilityOracle,
    duration: DurationOracle,
    config: SeasConfig,
}

impl SeasEngine {
    pub fn new(
        status: StatusStore,
        work_cache: WorkCache,
        feasibility: FeasibilityOracle,
        duration: DurationOracle,
        config: SeasConfig,
    ) -> Self {
        Self {
            status,
            work_cache,
            feasibility,
            duration,
            config,
        }
    }

    /// Run one SEAS invocation: DECODE -> PREDICT -> ADMIT -> SCAN -> PERSIST.
    /// PERSIST is always reached, even on early abort or store errors during
    /// prediction.
    pub async fn run(&self, ctx: &mut RequestContext) -> Result<(), SchedulerError> {
        let host_row = match self.status.get(&ctx.request.host_id).await {
            Ok(row) => row,
            Err(SchedulerError::NotFound) => HostStatusRow::empty(&ctx.request.host_id),
            Err(e) => {
                // Store errors during uptime prediction degrade to a fresh
                // state and continue; the RPC must not fail.
                warn!(host_id = %ctx.request.host_id, error = %e, "status store unavailable, starting from fresh state");
                HostStatusRow::empty(&ctx.request.host_id)
            }
        };

        let mut blob = SchedBlob::decode(&host_row.mge_sched_data);
        let new_charge = ctx.request.device_status.battery_charge_pct;
        let new_time = ctx.request.device_status_time;
        let old_charge = blob.last_charge_pct;
        let old_time = blob.last_update_time;

        let reset = ctx.now - blob.last_update_time > RESET_GAP_SECONDS;
        if reset {
            blob.last_update_time = new_time;
            blob.last_charge_pct = new_charge;
            blob.start_time = new_time;
            blob.uptime_avg = 0.0;
            blob.samples = 0;
            debug!(host_id = %ctx.request.host_id, "SEAS: long-gap reset");
        }

        if !reset && (old_charge - new_charge).abs() > CHARGE_EPSILON && new_time > old_time {
            blob.dr = (new_time - old_time) / (old_charge - new_charge);
        }
        if blob.dr <= 0.0 {
            blob.dr = DEFAULT_DR;
        }

        let available = (new_charge - ctx.request.battery_charge_min_pct).max(0.0);
        let uptime = (new_time - blob.start_time) + available * blob.dr;

        if (new_charge - old_charge).abs() > CHARGE_EPSILON {
            blob.samples += 1;
            blob.uptime_avg += (uptime - blob.uptime_avg) / blob.samples as f64;
        }

        let remaining = if blob.uptime_avg > 1.0 {
            blob.uptime_avg - (new_time - blob.start_time)
        } else {
            uptime
        };

        blob.total_cpus = blob.total_cpus.max(ctx.request.requested_cpu_instances);
        blob.last_charge_pct = new_charge;
        blob.last_update_time = new_time;

        let prediction = UptimePrediction {
            remaining,
            available,
        };

        let admitted = ctx.request.requests_cpu_work()
            && !(remaining <= 0.0 && !ctx.request.on_external_power())
            && available > 0.0;

        if !admitted {
            debug!(host_id = %ctx.request.host_id, remaining, available, "SEAS: admission gate closed, no jobs");
        } else {
            self.scan_and_assign(ctx, &prediction, blob.total_cpus).await?;
        }

        ctx.reply.updated_sched_blob = Some(blob.encode());

        let updated_row = HostStatusRow::from_status(
            &ctx.request.host_id,
            &ctx.request.device_status,
            blob.encode(),
            new_time,
        );
        if let Err(e) = self.status.upsert(&updated_row).await {
            // Logged at critical level but does not fail the RPC.
            tracing::error!(host_id = %ctx.request.host_id, error = %e, "failed to persist host status row");
        }

        Ok(())
    }

    async fn scan_and_assign(
        &self,
        ctx: &mut RequestContext,
        prediction: &UptimePrediction,
        total_cpus: u32,
    ) -> Result<(), SchedulerError> {
        let total_cpus_f = (total_cpus.max(1)) as f64;
        let in_progress: f64 = ctx
            .request
            .other_project_in_progress
            .iter()
            .map(|r| r.estimated_completion_time)
            .sum();
        let current_jobs = ctx.request.current_project_result_count;

        let mut sent: u32 = 0;
        let mut available_cpus = ctx.request.requested_cpu_instances;
        let mut blocked_purely_on_remaining = false;

        for idx in self.work_cache.scan_order() {
            let Some(claimed) = self.work_cache.claim(idx, ctx.pid) else {
                continue;
            };

            if FeasibilityOracle::fast_check(
                claimed.candidate(),
                current_jobs,
                self.config.app_quota,
            )
            .is_err()
            {
                claimed.resolve_present();
                continue;
            }

            let ewd = self
                .duration
                .duration_for(claimed.candidate(), &ctx.request.host_id)
                .await?;

            if current_jobs >= total_cpus && available_cpus == 0 && ewd.estimated {
                claimed.resolve_present();
                break;
            }

            let pipeline_jobs = current_jobs as f64 + sent as f64;
            let ewop = ewd.seconds * (pipeline_jobs / total_cpus_f).ceil();
            let mut tot_busy = in_progress + ewop;
            if pipeline_jobs % total_cpus_f == 0.0 {
                tot_busy += ewd.seconds;
            }

            let deadline = claimed.candidate().delay_bound;
            if tot_busy > deadline && available_cpus == 0 {
                claimed.resolve_present();
                break;
            }

            if tot_busy > prediction.remaining && !ctx.request.on_external_power() && !ewd.estimated
            {
                blocked_purely_on_remaining = available_cpus > 0;
                claimed.resolve_present();
                break;
            }

            match self
                .feasibility
                .slow_check(claimed.candidate(), &ctx.request.host_id)
                .await?
            {
                SlowCheckOutcome::NoHost => {
                    claimed.resolve_present();
                }
                SlowCheckOutcome::NoAny => {
                    claimed.resolve_empty();
                }
                SlowCheckOutcome::Ok => {
                    let result_id = claimed.candidate().result_id.clone();
                    let workunit_id = claimed.candidate().workunit_id.clone();
                    if self
                        .feasibility
                        .result_still_sendable(&result_id, &workunit_id)
                        .await?
                    {
                        let candidate = claimed.candidate().clone();
                        claimed.resolve_empty();
                        ctx.reply.append(candidate);
                        sent += 1;
                        available_cpus = available_cpus.saturating_sub(1);
                    } else {
                        claimed.resolve_present();
                    }
                }
            }
        }

        if sent == 0 && blocked_purely_on_remaining && self.config.backoff_avoidance_enabled {
            debug!(host_id = %ctx.request.host_id, "SEAS: backoff-avoidance single-job override");
            self.dispatch_one_ignoring_deadline(ctx).await?;
        }

        Ok(())
    }

    /// Dispatch exactly one job, bypassing both the remaining-uptime check
    /// and the delay-bound check, to keep the client from entering an RPC
    /// backoff when the only reason the main scan yielded nothing was
    /// predicted uptime exhaustion with free CPUs. A deliberate override of
    /// the deadline-vs-uptime check (§9): it must always find one job if any
    /// feasible candidate exists, so only the feasibility predicates still
    /// apply.
    async fn dispatch_one_ignoring_deadline(
        &self,
        ctx: &mut RequestContext,
    ) -> Result<(), SchedulerError> {
        let current_jobs = ctx.request.current_project_result_count;

        for idx in self.work_cache.scan_order() {
            let Some(claimed) = self.work_cache.claim(idx, ctx.pid) else {
                continue;
            };

            if FeasibilityOracle::fast_check(
                claimed.candidate(),
                current_jobs,
                self.config.app_quota,
            )
            .is_err()
            {
                claimed.resolve_present();
                continue;
            }

            match self
                .feasibility
                .slow_check(claimed.candidate(), &ctx.request.host_id)
                .await?
            {
                SlowCheckOutcome::NoHost => {
                    claimed.resolve_present();
                    continue;
                }
                SlowCheckOutcome::NoAny => {
                    claimed.resolve_empty();
                    continue;
                }
                SlowCheckOutcome::Ok => {
                    let result_id = claimed.candidate().result_id.clone();
                    let workunit_id = claimed.candidate().workunit_id.clone();
                    if self
                        .feasibility
                        .result_still_sendable(&result_id, &workunit_id)
                        .await?
                    {
                        let candidate = claimed.candidate().clone();
                        claimed.resolve_empty();
                        ctx.reply.append(candidate);
                        return Ok(());
                    }
                    claimed.resolve_present();
                }
            }
        }

        Ok(())
    }
}
