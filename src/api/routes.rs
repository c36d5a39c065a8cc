//! API Routes
//!
//! HTTP endpoint definitions.

use axum::{
    extract::{Extension, FromRef, Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::extract::ApiJson;
use crate::assignment::AssignedPromo;
use crate::audit::{AuditLogEntry, AuditLogService};
use crate::config::EngineSettings;
use crate::domain::{
    Actor, CustomerAggregate, DomainError, Money, OperationContext, PromoAssignment, PromoStatus,
    PromoType,
};
use crate::error::AppError;
use crate::handlers::{
    AssignPromoCommand, CreatePurchaseCommand, PromoHandler, PurchaseHandler, PurchaseResult,
};
use crate::projection::{CustomerAggregateService, ReconcileReport};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";
pub const IDEMPOTENT_REPLAYED_HEADER: &str = "idempotent-replayed";

// =========================================================================
// State
// =========================================================================

/// Shared router state
#[derive(Clone, FromRef)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: EngineSettings,
}

impl AppState {
    pub fn new(pool: PgPool, settings: EngineSettings) -> Self {
        Self { pool, settings }
    }
}

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreatePurchaseRequest {
    pub customer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    #[serde(default)]
    pub promo_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AppliedPromoResponse {
    pub promo_id: Uuid,
    pub promo_type: PromoType,
    pub discount_amount: Money,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Money,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub final_amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo_id: Option<Uuid>,
    pub purchase_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_promo: Option<AppliedPromoResponse>,
}

impl From<PurchaseResult> for PurchaseResponse {
    fn from(result: PurchaseResult) -> Self {
        let mut response = PurchaseResponse::from(result.purchase);
        response.applied_promo = result.applied_promo.map(|applied| AppliedPromoResponse {
            promo_id: applied.promo_id,
            promo_type: applied.promo_type,
            discount_amount: applied.discount_amount,
        });
        response
    }
}

impl From<crate::domain::Purchase> for PurchaseResponse {
    fn from(purchase: crate::domain::Purchase) -> Self {
        Self {
            id: purchase.id,
            customer_id: purchase.customer_id,
            product_id: purchase.product_id,
            quantity: purchase.quantity,
            unit_price: purchase.unit_price,
            subtotal: purchase.subtotal,
            discount_amount: purchase.discount_amount,
            final_amount: purchase.final_amount,
            promo_id: purchase.promo_id,
            purchase_date: purchase.purchase_date,
            applied_promo: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AssignPromoRequest {
    pub customer_id: Uuid,
    pub promo_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct AvailablePromoResponse {
    pub assignment_id: Uuid,
    pub promo_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub promo_type: PromoType,
    pub value: Decimal,
    pub status: PromoStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub assigned_at: DateTime<Utc>,
}

impl AvailablePromoResponse {
    fn from_assigned(assigned: AssignedPromo, now: DateTime<Utc>) -> Self {
        let AssignedPromo { assignment, promo } = assigned;
        Self {
            assignment_id: assignment.id,
            promo_id: promo.id,
            status: promo.status(now),
            promo_type: promo.discount.promo_type(),
            value: promo.discount.value(),
            name: promo.name,
            description: promo.description,
            start_date: promo.start_date,
            end_date: promo.end_date,
            assigned_at: assignment.assigned_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AvailablePromosResponse {
    pub customer_id: Uuid,
    pub promos: Vec<AvailablePromoResponse>,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default)]
    pub resource_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

const MAX_AUDIT_LIMIT: i64 = 500;

#[derive(Debug, Serialize)]
pub struct AuditLogResponse {
    pub entries: Vec<AuditLogEntry>,
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/purchases", post(create_purchase))
        .route("/purchases/:purchase_id", get(get_purchase))
        .route("/promos/assign", post(assign_promo))
        .route(
            "/promos/customer/:customer_id/available",
            get(available_promos),
        )
        .route("/customers/:customer_id/aggregate", get(customer_aggregate))
        .route(
            "/admin/customers/:customer_id/reconcile",
            post(reconcile_customer),
        )
        .route("/admin/reconcile", post(reconcile_all))
        .route("/admin/audit", get(audit_log))
}

// =========================================================================
// Authorization helpers
// =========================================================================

fn require_can_act_for(actor: &Actor, customer_id: Uuid) -> Result<(), AppError> {
    if actor.can_act_for(customer_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Customers may only act on their own account".to_string(),
        ))
    }
}

fn require_staff(actor: &Actor) -> Result<(), AppError> {
    if actor.is_staff() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin role required".to_string()))
    }
}

fn require_super_admin(actor: &Actor) -> Result<(), AppError> {
    if actor.is_super_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Super admin role required".to_string()))
    }
}

/// Optional `Idempotency-Key` header; present but not a UUID is a bad request
fn idempotency_key(headers: &HeaderMap) -> Result<Option<Uuid>, AppError> {
    match headers.get(IDEMPOTENCY_KEY_HEADER) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(Some)
            .ok_or_else(|| {
                AppError::InvalidRequest("Idempotency-Key must be a UUID".to_string())
            }),
    }
}

// =========================================================================
// POST /purchases
// =========================================================================

/// Create a purchase
async fn create_purchase(
    State(pool): State<PgPool>,
    State(settings): State<EngineSettings>,
    Extension(actor): Extension<Actor>,
    Extension(context): Extension<OperationContext>,
    headers: HeaderMap,
    ApiJson(request): ApiJson<CreatePurchaseRequest>,
) -> Result<(StatusCode, HeaderMap, Json<PurchaseResponse>), AppError> {
    require_can_act_for(&actor, request.customer_id)?;
    let idem_key = idempotency_key(&headers)?;

    let mut command =
        CreatePurchaseCommand::new(request.customer_id, request.product_id, request.quantity);
    if let Some(promo_id) = request.promo_id {
        command = command.with_promo(promo_id);
    }

    let handler = PurchaseHandler::new(pool).with_settings(settings);
    let result = handler.execute(command, idem_key, &context).await?;

    let mut response_headers = HeaderMap::new();
    if result.replayed {
        response_headers.insert(
            HeaderName::from_static(IDEMPOTENT_REPLAYED_HEADER),
            HeaderValue::from_static("true"),
        );
    }

    Ok((
        StatusCode::CREATED,
        response_headers,
        Json(PurchaseResponse::from(result)),
    ))
}

// =========================================================================
// GET /purchases/:purchase_id
// =========================================================================

/// Read back a purchase record
async fn get_purchase(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Path(purchase_id): Path<Uuid>,
) -> Result<Json<PurchaseResponse>, AppError> {
    let purchase = PurchaseHandler::new(pool).get(purchase_id).await?;
    // Someone else's purchase looks the same as a missing one.
    if !actor.can_act_for(purchase.customer_id) {
        return Err(DomainError::PurchaseNotFound(purchase_id).into());
    }

    Ok(Json(PurchaseResponse::from(purchase)))
}

// =========================================================================
// POST /promos/assign
// =========================================================================

/// Assign a promo to a customer (staff only)
async fn assign_promo(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Extension(context): Extension<OperationContext>,
    ApiJson(request): ApiJson<AssignPromoRequest>,
) -> Result<(StatusCode, Json<PromoAssignment>), AppError> {
    require_staff(&actor)?;

    let command = AssignPromoCommand::new(request.promo_id, request.customer_id);
    let assignment = PromoHandler::new(pool).assign(command, &context).await?;

    Ok((StatusCode::CREATED, Json(assignment)))
}

// =========================================================================
// GET /promos/customer/:customer_id/available
// =========================================================================

/// Promos the customer can use right now
async fn available_promos(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<AvailablePromosResponse>, AppError> {
    require_can_act_for(&actor, customer_id)?;

    let now = Utc::now();
    let promos = PromoHandler::new(pool)
        .available_for_customer(customer_id, now)
        .await?
        .into_iter()
        .map(|assigned| AvailablePromoResponse::from_assigned(assigned, now))
        .collect();

    Ok(Json(AvailablePromosResponse {
        customer_id,
        promos,
    }))
}

// =========================================================================
// GET /customers/:customer_id/aggregate
// =========================================================================

/// Stored lifetime totals of a customer
async fn customer_aggregate(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<CustomerAggregate>, AppError> {
    require_can_act_for(&actor, customer_id)?;

    let aggregate = CustomerAggregateService::new(pool)
        .get_aggregate(customer_id)
        .await?;

    Ok(Json(aggregate))
}

// =========================================================================
// Admin: reconciliation and audit
// =========================================================================

/// Recompute one customer's aggregate from its purchases
async fn reconcile_customer(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Extension(context): Extension<OperationContext>,
    Path(customer_id): Path<Uuid>,
) -> Result<Json<ReconcileReport>, AppError> {
    require_staff(&actor)?;

    let report = CustomerAggregateService::new(pool)
        .reconcile(customer_id, &context)
        .await?;

    Ok(Json(report))
}

/// Recompute every customer's aggregate
async fn reconcile_all(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Extension(context): Extension<OperationContext>,
) -> Result<Json<ReconcileReport>, AppError> {
    require_super_admin(&actor)?;

    let report = CustomerAggregateService::new(pool)
        .reconcile_all(&context)
        .await?;

    Ok(Json(report))
}

/// Recent audit entries, optionally for one resource
async fn audit_log(
    State(pool): State<PgPool>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditLogResponse>, AppError> {
    require_staff(&actor)?;

    let limit = query.limit.clamp(1, MAX_AUDIT_LIMIT);
    let service = AuditLogService::new(pool);

    let entries = match query.resource_id {
        Some(resource_id) => service.get_by_resource(resource_id, limit).await?,
        None => service.get_recent(limit).await?,
    };

    Ok(Json(AuditLogResponse { entries }))
}
