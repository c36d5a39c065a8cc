//! Customer Aggregate Service
//!
//! The purchases table is the source of truth. The aggregate columns are a
//! read model maintained with commutative deltas, so concurrent purchases of
//! the same customer never lose an update.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{query, query_as, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::audit::{self, AuditAction, AuditLogBuilder};
use crate::domain::{CustomerAggregate, DomainError, OperationContext};
use crate::error::AppResult;
use crate::repository::customers;

/// Customers whose stored totals disagree with their purchases
const DRIFT_SQL: &str = r#"
    SELECT c.id,
           c.total_spent,
           c.purchase_count,
           COALESCE(a.total_spent, 0) AS actual_total_spent,
           COALESCE(a.purchase_count, 0) AS actual_purchase_count
    FROM customers c
    LEFT JOIN (
        SELECT customer_id,
               SUM(final_amount) AS total_spent,
               COUNT(*)::int AS purchase_count
        FROM purchases
        GROUP BY customer_id
    ) a ON a.customer_id = c.id
    WHERE c.total_spent <> COALESCE(a.total_spent, 0)
       OR c.purchase_count <> COALESCE(a.purchase_count, 0)
    ORDER BY c.id
"#;

/// One customer whose stored aggregate differs from its purchases
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateDrift {
    pub customer_id: Uuid,
    pub stored_total_spent: Decimal,
    pub stored_purchase_count: i32,
    pub actual_total_spent: Decimal,
    pub actual_purchase_count: i32,
}

impl AggregateDrift {
    fn from_tuple((customer_id, stored_total, stored_count, actual_total, actual_count): DriftRow) -> Self {
        Self {
            customer_id,
            stored_total_spent: stored_total,
            stored_purchase_count: stored_count,
            actual_total_spent: actual_total,
            actual_purchase_count: actual_count,
        }
    }
}

type DriftRow = (Uuid, Decimal, i32, Decimal, i32);

/// Outcome of a reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub customers_checked: i64,
    /// Customers that were repaired, with their values before and after
    pub drifted: Vec<AggregateDrift>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.drifted.is_empty()
    }
}

/// Add a purchase's effect to the customer's aggregate.
///
/// Runs inside the purchase transaction. The update is relative to the
/// current row value, so interleaved purchases commute.
///
/// # Errors
/// `CustomerNotFound` if no customer row matched.
pub async fn apply_delta(
    tx: &mut Transaction<'_, Postgres>,
    customer_id: Uuid,
    amount_delta: Decimal,
    count_delta: i32,
) -> AppResult<()> {
    let rows = query(
        r#"
        UPDATE customers
        SET total_spent = total_spent + $2,
            purchase_count = purchase_count + $3,
            updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(customer_id)
    .bind(amount_delta)
    .bind(count_delta)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if rows == 0 {
        return Err(DomainError::CustomerNotFound(customer_id).into());
    }

    tracing::debug!(
        customer_id = %customer_id,
        amount_delta = %amount_delta,
        count_delta = count_delta,
        "Customer aggregate updated"
    );

    Ok(())
}

/// Reconciliation and read access for customer aggregates
#[derive(Debug, Clone)]
pub struct CustomerAggregateService {
    pool: PgPool,
}

impl CustomerAggregateService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // get_aggregate
    // =========================================================================

    /// Stored totals for one customer
    pub async fn get_aggregate(&self, customer_id: Uuid) -> AppResult<CustomerAggregate> {
        let mut tx = self.pool.begin().await?;
        let customer = customers::find_customer(&mut tx, customer_id)
            .await?
            .ok_or(DomainError::CustomerNotFound(customer_id))?;
        tx.commit().await?;

        Ok(customer.aggregate())
    }

    // =========================================================================
    // reconcile
    // =========================================================================

    /// Recompute one customer's aggregate from its purchases.
    ///
    /// Idempotent: a second call right after the first changes nothing.
    /// The customer row is locked first, so a purchase committing meanwhile
    /// is either fully counted or applies its delta afterwards.
    pub async fn reconcile(
        &self,
        customer_id: Uuid,
        context: &OperationContext,
    ) -> AppResult<ReconcileReport> {
        let mut tx = self.pool.begin().await?;

        let stored: Option<(Decimal, i32)> = query_as(
            "SELECT total_spent, purchase_count FROM customers WHERE id = $1 FOR UPDATE",
        )
        .bind(customer_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (stored_total, stored_count) =
            stored.ok_or(DomainError::CustomerNotFound(customer_id))?;

        let (actual_total, actual_count): (Decimal, i32) = query_as(
            r#"
            SELECT COALESCE(SUM(final_amount), 0), COUNT(*)::int
            FROM purchases
            WHERE customer_id = $1
            "#,
        )
        .bind(customer_id)
        .fetch_one(&mut *tx)
        .await?;

        let mut drifted = Vec::new();
        if stored_total != actual_total || stored_count != actual_count {
            query(
                r#"
                UPDATE customers
                SET total_spent = $2, purchase_count = $3, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(customer_id)
            .bind(actual_total)
            .bind(actual_count)
            .execute(&mut *tx)
            .await?;

            tracing::warn!(
                customer_id = %customer_id,
                stored_total_spent = %stored_total,
                actual_total_spent = %actual_total,
                stored_purchase_count = stored_count,
                actual_purchase_count = actual_count,
                "Customer aggregate drift repaired"
            );

            drifted.push(AggregateDrift {
                customer_id,
                stored_total_spent: stored_total,
                stored_purchase_count: stored_count,
                actual_total_spent: actual_total,
                actual_purchase_count: actual_count,
            });
        }

        let report = ReconcileReport {
            customers_checked: 1,
            drifted,
        };

        audit::log(
            &mut tx,
            AuditLogBuilder::new(AuditAction::CustomerReconciled)
                .resource_type("customer")
                .resource_id(customer_id)
                .after_state(&report),
            context,
        )
        .await?;

        tx.commit().await?;

        Ok(report)
    }

    // =========================================================================
    // reconcile_all
    // =========================================================================

    /// Recompute every customer's aggregate in one transaction.
    pub async fn reconcile_all(&self, context: &OperationContext) -> AppResult<ReconcileReport> {
        let mut tx = self.pool.begin().await?;

        // Lock in id order so two reconcile passes cannot deadlock each other.
        let locked: Vec<(Uuid,)> = query_as("SELECT id FROM customers ORDER BY id FOR UPDATE")
            .fetch_all(&mut *tx)
            .await?;

        let drifted: Vec<AggregateDrift> = query_as::<_, DriftRow>(DRIFT_SQL)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(AggregateDrift::from_tuple)
            .collect();

        for drift in &drifted {
            query(
                r#"
                UPDATE customers
                SET total_spent = $2, purchase_count = $3, updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(drift.customer_id)
            .bind(drift.actual_total_spent)
            .bind(drift.actual_purchase_count)
            .execute(&mut *tx)
            .await?;
        }

        let report = ReconcileReport {
            customers_checked: locked.len() as i64,
            drifted,
        };

        audit::log(
            &mut tx,
            AuditLogBuilder::new(AuditAction::CustomersReconciled)
                .resource_type("customer")
                .after_state(&report),
            context,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            customers_checked = report.customers_checked,
            customers_repaired = report.drifted.len(),
            "Customer aggregates reconciled"
        );

        Ok(report)
    }

    // =========================================================================
    // detect_drift
    // =========================================================================

    /// List drifted customers without repairing anything.
    pub async fn detect_drift(&self) -> AppResult<Vec<AggregateDrift>> {
        let rows: Vec<DriftRow> = query_as(DRIFT_SQL).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(AggregateDrift::from_tuple).collect())
    }
}
