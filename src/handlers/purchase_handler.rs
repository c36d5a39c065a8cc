//! Purchase Handler
//!
//! Turns "customer buys N units of product P, optionally with promo X" into
//! one transaction: purchase row, stock decrement, promo consumption,
//! customer aggregate delta and audit entry. Either all of them happen or
//! none do.

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::assignment;
use crate::audit::{self, AuditAction, AuditLogBuilder};
use crate::config::EngineSettings;
use crate::db;
use crate::domain::pricing;
use crate::domain::{
    evaluate, DomainError, Eligibility, OperationContext, Promo, Purchase, Quantity,
};
use crate::error::{AppError, AppResult};
use crate::idempotency::{self, IdempotencyOutcome};
use crate::projection;
use crate::repository::purchases::NewPurchase;
use crate::repository::{customers, products, promos, purchases};

use super::{AppliedPromo, CreatePurchaseCommand, PurchaseResult};

/// A promo that passed eligibility, with the assignment to consume
struct PromoUse {
    promo: Promo,
    assignment_id: Uuid,
}

// =========================================================================
// PurchaseHandler
// =========================================================================

/// Coordinator for purchases
pub struct PurchaseHandler {
    pool: PgPool,
    settings: EngineSettings,
}

impl PurchaseHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Execute the purchase command.
    ///
    /// Every check runs before the first write. The handler never retries;
    /// a `TransactionFailed` error is returned for the client to retry.
    pub async fn execute(
        &self,
        command: CreatePurchaseCommand,
        idempotency_key: Option<Uuid>,
        context: &OperationContext,
    ) -> AppResult<PurchaseResult> {
        let mut tx = self.pool.begin().await?;
        db::set_transaction_timeout(&mut tx, self.settings.transaction_timeout).await?;

        if let Some(key) = idempotency_key {
            let request_hash = idempotency::compute_request_hash(&command.canonical_bytes());
            let outcome = idempotency::claim(
                &mut tx,
                key,
                &request_hash,
                self.settings.idempotency_ttl_hours,
            )
            .await?;

            if let IdempotencyOutcome::Replay(purchase_id) = outcome {
                let result = replay(&mut tx, purchase_id).await?;
                tx.commit().await?;
                return Ok(result);
            }
        }

        let result = match create(&mut tx, &command, context).await {
            Ok(result) => result,
            Err(err) => {
                if let Some(domain) = err.as_domain().filter(|d| d.is_client_error()) {
                    tracing::info!(
                        customer_id = %command.customer_id,
                        product_id = %command.product_id,
                        kind = domain.kind(),
                        "Purchase rejected"
                    );
                }
                return Err(err);
            }
        };

        if let Some(key) = idempotency_key {
            idempotency::complete(&mut tx, key, result.purchase.id).await?;
        }

        tx.commit().await?;

        tracing::info!(
            purchase_id = %result.purchase.id,
            customer_id = %result.purchase.customer_id,
            product_id = %result.purchase.product_id,
            quantity = result.purchase.quantity,
            final_amount = %result.purchase.final_amount,
            promo_id = ?result.purchase.promo_id,
            "Purchase created"
        );

        Ok(result)
    }

    /// Read back a stored purchase
    pub async fn get(&self, purchase_id: Uuid) -> AppResult<Purchase> {
        let mut tx = self.pool.begin().await?;
        let purchase = purchases::find_purchase(&mut tx, purchase_id)
            .await?
            .ok_or(DomainError::PurchaseNotFound(purchase_id))?;
        tx.commit().await?;
        Ok(purchase)
    }
}

async fn create(
    tx: &mut Transaction<'_, Postgres>,
    command: &CreatePurchaseCommand,
    context: &OperationContext,
) -> AppResult<PurchaseResult> {
    // Locked until commit: concurrent buyers of this product serialize here.
    let product = products::lock_product(tx, command.product_id)
        .await?
        .ok_or(DomainError::ProductNotFound(command.product_id))?;

    let quantity =
        Quantity::new(command.quantity).ok_or(DomainError::InvalidQuantity(command.quantity))?;

    if !customers::customer_exists(tx, command.customer_id).await? {
        return Err(DomainError::CustomerNotFound(command.customer_id).into());
    }

    if !product.has_stock_for(quantity.get()) {
        return Err(DomainError::insufficient_stock(command.quantity, product.stock).into());
    }

    let promo_use = match command.promo_id {
        Some(promo_id) => Some(resolve_promo(tx, promo_id, command.customer_id).await?),
        None => None,
    };

    let price = pricing::compute(
        product.price,
        quantity,
        promo_use.as_ref().map(|used| &used.promo.discount),
    )
    .map_err(DomainError::from)?;

    // Writes start here.
    let purchase = purchases::insert_purchase(
        tx,
        &NewPurchase {
            customer_id: command.customer_id,
            product_id: product.id,
            quantity,
            unit_price: product.price,
            price,
            promo_id: promo_use.as_ref().map(|used| used.promo.id),
        },
    )
    .await?;

    if !products::decrement_stock(tx, product.id, quantity).await? {
        return Err(DomainError::insufficient_stock(command.quantity, product.stock).into());
    }

    if let Some(used) = &promo_use {
        assignment::consume(tx, used.assignment_id).await?;
    }

    projection::apply_delta(tx, command.customer_id, price.final_amount.value(), 1).await?;

    audit::log(
        tx,
        AuditLogBuilder::new(AuditAction::PurchaseCreated)
            .resource_type("purchase")
            .resource_id(purchase.id)
            .after_state(&purchase),
        context,
    )
    .await?;

    let applied_promo = promo_use.map(|used| AppliedPromo {
        promo_id: used.promo.id,
        promo_type: used.promo.discount.promo_type(),
        discount_amount: price.discount,
    });

    Ok(PurchaseResult {
        purchase,
        applied_promo,
        replayed: false,
    })
}

/// Load a promo and the customer's assignment, then decide eligibility.
async fn resolve_promo(
    tx: &mut Transaction<'_, Postgres>,
    promo_id: Uuid,
    customer_id: Uuid,
) -> AppResult<PromoUse> {
    let promo = promos::find_promo(tx, promo_id)
        .await?
        .ok_or(DomainError::PromoNotFound(promo_id))?;

    let assignment = assignment::find_for_update(tx, promo_id, customer_id).await?;

    match evaluate(&promo, assignment.as_ref(), customer_id, Utc::now()) {
        Eligibility::Eligible { assignment_id } => Ok(PromoUse {
            promo,
            assignment_id,
        }),
        Eligibility::Ineligible(reason) => {
            tracing::info!(
                promo_id = %promo_id,
                customer_id = %customer_id,
                reason = %reason,
                "Promo not applicable"
            );
            Err(DomainError::PromoIneligible(reason).into())
        }
    }
}

/// Rebuild the result of an earlier purchase for a repeated idempotency key.
async fn replay(
    tx: &mut Transaction<'_, Postgres>,
    purchase_id: Uuid,
) -> AppResult<PurchaseResult> {
    let purchase = purchases::find_purchase(tx, purchase_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("idempotency key points at missing purchase {purchase_id}")))?;

    let applied_promo = match purchase.promo_id {
        Some(promo_id) => {
            let promo = promos::find_promo(tx, promo_id)
                .await?
                .ok_or(DomainError::PromoNotFound(promo_id))?;
            Some(AppliedPromo {
                promo_id,
                promo_type: promo.discount.promo_type(),
                discount_amount: purchase.discount_amount,
            })
        }
        None => None,
    };

    Ok(PurchaseResult {
        purchase,
        applied_promo,
        replayed: true,
    })
}
