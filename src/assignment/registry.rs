//! Assignment persistence
//!
//! The pair uniqueness is enforced by `promo_assignments_pair_unique`, so two
//! concurrent `assign` calls for the same pair cannot both insert.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{query, query_as, FromRow, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::{
    DomainError, Discount, IneligibleReason, Promo, PromoAssignment, PromoType,
};
use crate::error::AppResult;
use crate::repository::{customers, decode_error, promos};

impl<'r> FromRow<'r, PgRow> for PromoAssignment {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            promo_id: row.try_get("promo_id")?,
            customer_id: row.try_get("customer_id")?,
            is_used: row.try_get("is_used")?,
            assigned_at: row.try_get("assigned_at")?,
            used_at: row.try_get("used_at")?,
        })
    }
}

/// An assignment together with the promo it grants
#[derive(Debug, Clone, PartialEq)]
pub struct AssignedPromo {
    pub assignment: PromoAssignment,
    pub promo: Promo,
}

impl<'r> FromRow<'r, PgRow> for AssignedPromo {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let promo_type: String = row.try_get("p_promo_type")?;
        let promo_type: PromoType = promo_type
            .parse()
            .map_err(|e| decode_error("p_promo_type", e))?;
        let value: Decimal = row.try_get("p_value")?;
        let discount =
            Discount::from_parts(promo_type, value).map_err(|e| decode_error("p_value", e))?;

        let assignment = PromoAssignment::from_row(row)?;
        let promo = Promo {
            id: assignment.promo_id,
            name: row.try_get("p_name")?,
            description: row.try_get("p_description")?,
            discount,
            start_date: row.try_get::<Option<DateTime<Utc>>, _>("p_start_date")?,
            end_date: row.try_get::<Option<DateTime<Utc>>, _>("p_end_date")?,
            is_active: row.try_get("p_is_active")?,
            created_by: row.try_get("p_created_by")?,
        };

        Ok(Self { assignment, promo })
    }
}

/// Assign a promo to a customer.
///
/// # Errors
/// - `PromoNotFound` / `CustomerNotFound` if either side is missing
/// - `AlreadyAssigned` if the pair already has an assignment, used or not
pub async fn assign(
    tx: &mut Transaction<'_, Postgres>,
    promo_id: Uuid,
    customer_id: Uuid,
) -> AppResult<PromoAssignment> {
    if promos::find_promo(tx, promo_id).await?.is_none() {
        return Err(DomainError::PromoNotFound(promo_id).into());
    }
    if !customers::customer_exists(tx, customer_id).await? {
        return Err(DomainError::CustomerNotFound(customer_id).into());
    }

    let inserted = query_as::<Postgres, PromoAssignment>(
        r#"
        INSERT INTO promo_assignments (id, promo_id, customer_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (promo_id, customer_id) DO NOTHING
        RETURNING id, promo_id, customer_id, is_used, assigned_at, used_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(promo_id)
    .bind(customer_id)
    .fetch_optional(&mut **tx)
    .await?;

    let assignment =
        inserted.ok_or_else(|| DomainError::already_assigned(promo_id, customer_id))?;

    tracing::info!(
        assignment_id = %assignment.id,
        promo_id = %promo_id,
        customer_id = %customer_id,
        "Promo assigned"
    );

    Ok(assignment)
}

/// Load the assignment for a pair and lock it for the rest of the transaction.
pub async fn find_for_update(
    tx: &mut Transaction<'_, Postgres>,
    promo_id: Uuid,
    customer_id: Uuid,
) -> AppResult<Option<PromoAssignment>> {
    let assignment = query_as::<Postgres, PromoAssignment>(
        r#"
        SELECT id, promo_id, customer_id, is_used, assigned_at, used_at
        FROM promo_assignments
        WHERE promo_id = $1 AND customer_id = $2
        FOR UPDATE
        "#,
    )
    .bind(promo_id)
    .bind(customer_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(assignment)
}

/// Flip `is_used` from false to true.
///
/// Compare-and-set: if another transaction consumed the assignment first the
/// update matches no row and the promo is reported as already used.
pub(crate) async fn consume(
    tx: &mut Transaction<'_, Postgres>,
    assignment_id: Uuid,
) -> AppResult<()> {
    let rows = query(
        r#"
        UPDATE promo_assignments
        SET is_used = TRUE, used_at = NOW()
        WHERE id = $1 AND is_used = FALSE
        "#,
    )
    .bind(assignment_id)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    if rows == 0 {
        return Err(DomainError::PromoIneligible(IneligibleReason::AlreadyUsed).into());
    }

    Ok(())
}

/// Every assignment of a customer with its promo, newest first.
pub async fn list_with_promos(
    tx: &mut Transaction<'_, Postgres>,
    customer_id: Uuid,
) -> AppResult<Vec<AssignedPromo>> {
    let rows = query_as::<Postgres, AssignedPromo>(
        r#"
        SELECT
            a.id, a.promo_id, a.customer_id, a.is_used, a.assigned_at, a.used_at,
            p.name AS p_name,
            p.description AS p_description,
            p.promo_type AS p_promo_type,
            p.value AS p_value,
            p.start_date AS p_start_date,
            p.end_date AS p_end_date,
            p.is_active AS p_is_active,
            p.created_by AS p_created_by
        FROM promo_assignments a
        JOIN promos p ON p.id = a.promo_id
        WHERE a.customer_id = $1
        ORDER BY a.assigned_at DESC
        "#,
    )
    .bind(customer_id)
    .fetch_all(&mut **tx)
    .await?;

    Ok(rows)
}
