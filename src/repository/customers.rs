//! Customers Repository
//!
//! Read access only. The aggregate columns are written by
//! [`crate::projection`].

use sqlx::postgres::PgRow;
use sqlx::{query_as, query_scalar, FromRow, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::Customer;
use crate::error::AppResult;

impl<'r> FromRow<'r, PgRow> for Customer {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            total_spent: row.try_get("total_spent")?,
            purchase_count: row.try_get("purchase_count")?,
        })
    }
}

pub async fn customer_exists(
    tx: &mut Transaction<'_, Postgres>,
    customer_id: Uuid,
) -> AppResult<bool> {
    let exists: bool = query_scalar("SELECT EXISTS (SELECT 1 FROM customers WHERE id = $1)")
        .bind(customer_id)
        .fetch_one(&mut **tx)
        .await?;

    Ok(exists)
}

pub async fn find_customer(
    tx: &mut Transaction<'_, Postgres>,
    customer_id: Uuid,
) -> AppResult<Option<Customer>> {
    let customer = query_as::<Postgres, Customer>(
        r#"
        SELECT id, name, email, phone, total_spent, purchase_count
        FROM customers
        WHERE id = $1
        "#,
    )
    .bind(customer_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(customer)
}
