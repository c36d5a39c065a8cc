//! Database module
//!
//! Connection, schema verification and per-transaction settings.

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

use crate::config::Config;
use crate::error::AppResult;

/// Tables created by `migrations/0001_purchase_engine.sql`
const REQUIRED_TABLES: &[&str] = &[
    "customers",
    "products",
    "promos",
    "promo_assignments",
    "purchases",
    "idempotency_keys",
    "audit_logs",
];

/// Open the connection pool described by the configuration
pub async fn connect(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
}

/// Simple connectivity check
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!("Required table '{}' does not exist", table);
            return Ok(false);
        }
    }

    Ok(true)
}

/// Bound every statement of the current transaction by `timeout`.
///
/// Uses `set_config(..., true)` so the setting is local to the transaction
/// and the pooled connection goes back clean.
pub async fn set_transaction_timeout(
    tx: &mut Transaction<'_, Postgres>,
    timeout: Duration,
) -> AppResult<()> {
    sqlx::query("SELECT set_config('statement_timeout', $1, true)")
        .bind(statement_timeout_value(timeout))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn statement_timeout_value(timeout: Duration) -> String {
    format!("{}ms", timeout.as_millis().max(1))
}
