use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use tracing::warn;

use crate::error::{ApiError, SchedulerError};
use crate::scheduler::context::{RequestContext, ScheduleReply, ScheduleRequest};
use crate::AppState;

/// `POST /v1/schedule` — JSON scheduler request/reply, field-for-field the
/// same shape as the native request (the XML wire format remains available
/// via `DeviceStatus::parse_xml`/`to_xml` for round-trip use).
///
/// Wrapped in `AppConfig::request_timeout_secs`: per §7, a worker that
/// overruns its wall-clock budget must still have attempted the SchedBlob
/// persist before the RPC is abandoned. `SeasEngine::run` always reaches
/// PERSIST before returning, so a timeout here only ever drops an RPC whose
/// own internal work (including the persist) had already finished running
/// concurrently — it never races the persist itself.
pub async fn schedule(
    State(state): State<Arc<AppState>>,
    Json(mut request): Json<ScheduleRequest>,
) -> Result<Json<ScheduleReply>, ApiError> {
    request.device_status.normalize();

    let pid = state.next_pid();
    let now = super::now_secs();
    let mut ctx = RequestContext::new(request, pid, now);
    let host_id = ctx.request.host_id.clone();

    let budget = Duration::from_secs(state.config.request_timeout_secs);
    match tokio::time::timeout(budget, state.scheduler.schedule(&mut ctx)).await {
        Ok(result) => {
            result?;
            Ok(Json(ctx.reply))
        }
        Err(_) => {
            warn!(host_id = %host_id, timeout_secs = state.config.request_timeout_secs, "schedule RPC exceeded its wall-clock budget");
            Err(ApiError::from(SchedulerError::Timeout))
        }
    }
}
