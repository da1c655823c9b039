pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod engine;

pub use db::DbPool;

use config::Config;
use engine::{AttendanceThresholds, PlanLocks, PlanRules};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    /// Serialises generation and session edits per plan
    pub plan_locks: Arc<PlanLocks>,
    /// Renders `/metrics`; absent until a recorder is installed
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        Self {
            config,
            db,
            plan_locks: Arc::new(PlanLocks::new()),
            metrics_handle: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    pub fn attendance_thresholds(&self) -> AttendanceThresholds {
        AttendanceThresholds {
            full_day_minutes: self.config.attendance.full_day_minutes,
        }
    }

    pub fn plan_rules(&self) -> PlanRules {
        PlanRules {
            max_plan_days: self.config.scheduling.max_plan_days,
        }
    }
}
