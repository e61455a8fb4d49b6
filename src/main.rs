mod api;
mod config;
mod db;
mod device_status;
mod error;
mod sched_blob;
mod scheduler;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::AppConfig;
use crate::db::Database;
use crate::scheduler::Scheduler;

/// Shared application state available to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub scheduler: Scheduler,
    pid_counter: AtomicU64,
}

impl AppState {
    /// Monotonic id identifying a single scheduling RPC, used for WorkCache
    /// claims. Distinct RPCs always get distinct pids, so a claim race is
    /// always observable.
    pub fn next_pid(&self) -> u64 {
        self.pid_counter.fetch_add(1, Ordering::Relaxed)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seas_rlrepl_scheduler=info,tower_http=info".into()),
        )
        .init();

    info!("Starting scheduler v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::from_env()?;
    info!(listen_addr = %config.listen_addr, "Configuration loaded");

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;
    info!("Database initialized");

    let scheduler = Scheduler::new(db.clone(), &config);
    info!(
        work_cache_capacity = scheduler.work_cache_capacity(),
        "Scheduler initialized"
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        scheduler,
        pid_counter: AtomicU64::new(1),
    });

    let app = build_router(state);

    let addr = config.listen_addr.parse::<std::net::SocketAddr>()?;
    info!("Starting HTTP server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    api::routes(state)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10 MB
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
}
