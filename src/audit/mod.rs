//! Audit Log
//!
//! Every state-changing operation leaves an `audit_logs` row written in the
//! same transaction as the change, so the log and the data cannot disagree.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{query_as, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::OperationContext;

/// Audit log entry as stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub actor_role: Option<String>,
    pub correlation_id: Option<Uuid>,
    pub action: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<Uuid>,
    pub after_state: Option<serde_json::Value>,
    pub client_ip: Option<IpAddr>,
    pub created_at: DateTime<Utc>,
}

/// Audit action types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    PurchaseCreated,
    PromoAssigned,
    CustomerReconciled,
    CustomersReconciled,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PurchaseCreated => "purchase.created",
            AuditAction::PromoAssigned => "promo.assigned",
            AuditAction::CustomerReconciled => "customer.reconciled",
            AuditAction::CustomersReconciled => "customers.reconciled",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Builder for creating audit log entries
#[derive(Debug, Clone)]
pub struct AuditLogBuilder {
    action: AuditAction,
    resource_type: Option<String>,
    resource_id: Option<Uuid>,
    after_state: Option<serde_json::Value>,
}

impl AuditLogBuilder {
    pub fn new(action: AuditAction) -> Self {
        Self {
            action,
            resource_type: None,
            resource_id: None,
            after_state: None,
        }
    }

    pub fn resource_type(mut self, resource_type: &str) -> Self {
        self.resource_type = Some(resource_type.to_string());
        self
    }

    pub fn resource_id(mut self, resource_id: Uuid) -> Self {
        self.resource_id = Some(resource_id);
        self
    }

    /// Snapshot of the resource after the change
    pub fn after_state<T: Serialize>(mut self, state: &T) -> Self {
        self.after_state = serde_json::to_value(state).ok();
        self
    }
}

/// Write an audit log entry inside the caller's transaction.
pub async fn log(
    tx: &mut Transaction<'_, Postgres>,
    builder: AuditLogBuilder,
    context: &OperationContext,
) -> Result<Uuid, AuditLogError> {
    let (id,): (Uuid,) = query_as(
        r#"
        INSERT INTO audit_logs (
            id, actor_id, actor_role, correlation_id,
            action, resource_type, resource_id, after_state, client_ip
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::inet)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(context.actor_id)
    .bind(context.actor_role.map(|role| role.as_str()))
    .bind(context.correlation_id)
    .bind(builder.action.as_str())
    .bind(&builder.resource_type)
    .bind(builder.resource_id)
    .bind(&builder.after_state)
    .bind(context.client_ip.map(|ip| ip.to_string()))
    .fetch_one(&mut **tx)
    .await?;

    tracing::debug!(
        audit_id = %id,
        action = %builder.action,
        "Audit log entry created"
    );

    Ok(id)
}

type AuditRow = (
    Uuid,
    Option<Uuid>,
    Option<String>,
    Option<Uuid>,
    String,
    Option<String>,
    Option<Uuid>,
    Option<serde_json::Value>,
    Option<String>,
    DateTime<Utc>,
);

fn into_entry(row: AuditRow) -> AuditLogEntry {
    let (
        id,
        actor_id,
        actor_role,
        correlation_id,
        action,
        resource_type,
        resource_id,
        after_state,
        client_ip,
        created_at,
    ) = row;

    AuditLogEntry {
        id,
        actor_id,
        actor_role,
        correlation_id,
        action,
        resource_type,
        resource_id,
        after_state,
        client_ip: client_ip.and_then(|ip| ip.parse().ok()),
        created_at,
    }
}

/// Read side of the audit log
#[derive(Debug, Clone)]
pub struct AuditLogService {
    pool: PgPool,
}

impl AuditLogService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get recent audit logs
    pub async fn get_recent(&self, limit: i64) -> Result<Vec<AuditLogEntry>, AuditLogError> {
        let rows: Vec<AuditRow> = query_as(
            r#"
            SELECT id, actor_id, actor_role, correlation_id,
                   action, resource_type, resource_id, after_state,
                   host(client_ip), created_at
            FROM audit_logs
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(into_entry).collect())
    }

    /// Get audit logs for one resource (purchase, customer, assignment)
    pub async fn get_by_resource(
        &self,
        resource_id: Uuid,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, AuditLogError> {
        let rows: Vec<AuditRow> = query_as(
            r#"
            SELECT id, actor_id, actor_role, correlation_id,
                   action, resource_type, resource_id, after_state,
                   host(client_ip), created_at
            FROM audit_logs
            WHERE resource_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(resource_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(into_entry).collect())
    }
}

/// Audit log errors
#[derive(Debug, thiserror::Error)]
pub enum AuditLogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<AuditLogError> for crate::error::AppError {
    fn from(err: AuditLogError) -> Self {
        match err {
            AuditLogError::Database(e) => e.into(),
        }
    }
}
