//! Products Repository

use sqlx::postgres::PgRow;
use sqlx::{query, query_as, FromRow, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::{Product, Quantity};
use crate::error::AppResult;

use super::money_column;

impl<'r> FromRow<'r, PgRow> for Product {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            stock: row.try_get("stock")?,
            price: money_column(row, "price")?,
        })
    }
}

/// Load a product and hold its row lock until the transaction ends.
/// Concurrent purchases of the same product queue here.
pub async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
) -> AppResult<Option<Product>> {
    let product = query_as::<Postgres, Product>(
        r#"
        SELECT id, name, stock, price
        FROM products
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(product_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(product)
}

/// Decrement stock only if enough is left. Returns `false` when the guard
/// rejected the update, leaving the row untouched. A quantity beyond the
/// `INTEGER` range can never be covered and is rejected the same way.
pub async fn decrement_stock(
    tx: &mut Transaction<'_, Postgres>,
    product_id: Uuid,
    quantity: Quantity,
) -> AppResult<bool> {
    let Some(units) = quantity.as_i32() else {
        return Ok(false);
    };

    let rows = query(
        r#"
        UPDATE products
        SET stock = stock - $2, updated_at = NOW()
        WHERE id = $1 AND stock >= $2
        "#,
    )
    .bind(product_id)
    .bind(units)
    .execute(&mut **tx)
    .await?
    .rows_affected();

    Ok(rows == 1)
}
