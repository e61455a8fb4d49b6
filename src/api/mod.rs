pub mod replicate;
pub mod schedule;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/schedule", post(schedule::schedule))
        .route("/v1/replicate", post(replicate::replicate))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Wall-clock seconds since the epoch, as the SEAS/RL-Repl math expects.
pub fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
