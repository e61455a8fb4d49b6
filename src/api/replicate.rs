use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::warn;

use crate::error::{ApiError, SchedulerError};
use crate::scheduler::rl_repl::ReplicationDecision;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ReplicateRequest {
    pub workunit_id: String,
}

/// `POST /v1/replicate` — the RL-Repl replica-count decision for a new
/// workunit, excluded from its own training history by id. Wrapped in
/// `AppConfig::request_timeout_secs`, same as `schedule`.
pub async fn replicate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReplicateRequest>,
) -> Result<Json<ReplicationDecision>, ApiError> {
    let now = super::now_secs();
    let budget = Duration::from_secs(state.config.request_timeout_secs);
    match tokio::time::timeout(budget, state.scheduler.replicate(&request.workunit_id, now)).await
    {
        Ok(result) => Ok(Json(result?)),
        Err(_) => {
            warn!(
                workunit_id = %request.workunit_id,
                timeout_secs = state.config.request_timeout_secs,
                "replicate RPC exceeded its wall-clock budget"
            );
            Err(ApiError::from(SchedulerError::Timeout))
        }
    }
}
