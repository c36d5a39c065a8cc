//! Scheduled Jobs
//!
//! Background maintenance: expired idempotency keys are removed and
//! customer aggregates are checked for drift. Drift is only reported here;
//! repairing it is an explicit admin action.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::interval;
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;
use crate::idempotency;
use crate::projection::CustomerAggregateService;

// =========================================================================
// Expired Idempotency Key Deletion
// =========================================================================

/// Delete idempotency keys past their `expires_at`
pub async fn delete_expired_idempotency_keys(pool: &PgPool) -> Result<u64, JobError> {
    let rows_deleted = idempotency::delete_expired(pool).await?;

    if rows_deleted > 0 {
        tracing::info!(rows_deleted = rows_deleted, "Deleted expired idempotency keys");
    }

    Ok(rows_deleted)
}

// =========================================================================
// Aggregate Drift Detection
// =========================================================================

/// Find customers whose stored totals disagree with their purchases.
///
/// Returns the drifted customer ids and logs a warning when there are any.
pub async fn detect_aggregate_drift(pool: &PgPool) -> Result<Vec<Uuid>, JobError> {
    let drifted = CustomerAggregateService::new(pool.clone())
        .detect_drift()
        .await?;

    let ids: Vec<Uuid> = drifted.iter().map(|d| d.customer_id).collect();

    if !ids.is_empty() {
        tracing::warn!(
            drifted_customers = ids.len(),
            customer_ids = ?ids,
            "Customer aggregate drift detected"
        );
    }

    Ok(ids)
}

// =========================================================================
// Job Scheduler
// =========================================================================

/// Configuration for job scheduler
#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    /// Interval for idempotency key cleanup (default: 1 minute)
    pub idempotency_cleanup_interval: Duration,
    /// Interval for aggregate drift detection (default: 1 hour)
    pub drift_check_interval: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            idempotency_cleanup_interval: Duration::from_secs(60),
            drift_check_interval: Duration::from_secs(3600),
        }
    }
}

impl JobSchedulerConfig {
    /// Intervals taken from the service configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            idempotency_cleanup_interval: config.idempotency_cleanup_interval,
            drift_check_interval: config.drift_check_interval,
        }
    }
}

/// Job Scheduler - runs periodic maintenance tasks
pub struct JobScheduler {
    pool: PgPool,
    config: JobSchedulerConfig,
}

impl JobScheduler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            config: JobSchedulerConfig::default(),
        }
    }

    pub fn with_config(pool: PgPool, config: JobSchedulerConfig) -> Self {
        Self { pool, config }
    }

    /// Start the job scheduler in the background.
    /// The returned handle can be used to abort it.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!("Job scheduler started");

        let mut idempotency_interval = interval(self.config.idempotency_cleanup_interval);
        let mut drift_interval = interval(self.config.drift_check_interval);

        loop {
            tokio::select! {
                _ = idempotency_interval.tick() => {
                    if let Err(e) = delete_expired_idempotency_keys(&self.pool).await {
                        tracing::error!(error = %e, "Idempotency key deletion failed");
                    }
                }
                _ = drift_interval.tick() => {
                    if let Err(e) = detect_aggregate_drift(&self.pool).await {
                        tracing::error!(error = %e, "Aggregate drift check failed");
                    }
                }
            }
        }
    }

    /// Run all maintenance jobs once (for manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match delete_expired_idempotency_keys(&self.pool).await {
            Ok(count) => report.idempotency_keys_deleted = count,
            Err(e) => report.errors.push(format!("Idempotency deletion: {}", e)),
        }

        match detect_aggregate_drift(&self.pool).await {
            Ok(ids) => report.drifted_customers = ids,
            Err(e) => report.errors.push(format!("Drift detection: {}", e)),
        }

        report.completed_at = Utc::now();
        report
    }
}

/// Report from running maintenance jobs
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub idempotency_keys_deleted: u64,
    pub drifted_customers: Vec<Uuid>,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl MaintenanceReport {
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty() && self.drifted_customers.is_empty()
    }
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    App(#[from] AppError),
}

// =========================================================================
// Tests
// =========================================================================
