use anyhow::Result;

/// Process-wide tunables, loaded once at startup and handed to the
/// `Scheduler` composition root.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Bind address (e.g. "0.0.0.0:8080")
    pub listen_addr: String,

    /// SQLite database URL
    pub database_url: String,

    /// Number of slots in the shared work-unit cache (C5).
    pub work_cache_capacity: usize,

    /// Preference floor below which a device contributes no uptime
    /// (env: BATTERY_CHARGE_MIN_PCT, percentage points).
    pub battery_charge_min_pct: f64,

    /// Gates the single-job backoff-avoidance override in the SEAS scan
    /// loop (env: BACKOFF_AVOIDANCE_ENABLED, default true).
    pub backoff_avoidance_enabled: bool,

    /// Upper bound on RL-Repl's replica-count action space.
    pub max_replicas: u32,

    /// RL-Repl's exploration probability; overridable for deterministic tests.
    pub explorative_prob: f64,

    /// Per-(app, processor-type) in-progress quota consulted by the fast
    /// feasibility check.
    pub app_quota: u32,

    /// Max seconds to hold a request before the HTTP surface returns 503
    /// (env: REQUEST_TIMEOUT_SECS).
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://scheduler.db".into()),
            work_cache_capacity: std::env::var("WORK_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(256),
            battery_charge_min_pct: std::env::var("BATTERY_CHARGE_MIN_PCT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10.0),
            backoff_avoidance_enabled: std::env::var("BACKOFF_AVOIDANCE_ENABLED")
                .map(|v| !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            max_replicas: std::env::var("MAX_REPLICAS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            explorative_prob: std::env::var("EXPLORATIVE_PROB")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.2),
            app_quota: std::env::var("APP_QUOTA")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal `AppConfig` with all fields defaulted. Override specific
    /// fields in each test via struct update syntax.
    fn base_config() -> AppConfig {
        AppConfig {
            listen_addr: "0.0.0.0:8080".into(),
            database_url: "sqlite::memory:".into(),
            work_cache_capacity: 256,
            battery_charge_min_pct: 10.0,
            backoff_avoidance_enabled: true,
            max_replicas: 10,
            explorative_prob: 0.2,
            app_quota: 4,
            request_timeout_secs: 30,
        }
    }

    #[test]
    fn defaults_are_stable() {
        let cfg = base_config();
        assert_eq!(cfg.max_replicas, 10);
        assert!(cfg.backoff_avoidance_enabled);
    }

    #[test]
    fn backoff_avoidance_can_be_disabled_via_struct_update() {
        let cfg = AppConfig {
            backoff_avoidance_enabled: false,
            ..base_config()
        };
        assert!(!cfg.backoff_avoidance_enabled);
    }

    #[test]
    fn explorative_prob_override_for_deterministic_tests() {
        let cfg = AppConfig {
            explorative_prob: 0.0,
            ..base_config()
        };
        assert_eq!(cfg.explorative_prob, 0.0);
    }
}
