//! Purchases Repository
//!
//! Purchases are insert-only. There is no update or delete.

use sqlx::postgres::PgRow;
use sqlx::{query_as, FromRow, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::{DomainError, Money, PriceBreakdown, Purchase, Quantity};
use crate::error::AppResult;

use super::{decode_error, money_column};

const PURCHASE_COLUMNS: &str = "id, customer_id, product_id, quantity, unit_price, \
     discount_amount, final_amount, promo_id, purchase_date";

impl<'r> FromRow<'r, PgRow> for Purchase {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let quantity: i32 = row.try_get("quantity")?;
        let unit_price = money_column(row, "unit_price")?;
        let subtotal = unit_price
            .checked_mul(i64::from(quantity))
            .map_err(|e| decode_error("unit_price", e))?;

        Ok(Self {
            id: row.try_get("id")?,
            customer_id: row.try_get("customer_id")?,
            product_id: row.try_get("product_id")?,
            quantity,
            unit_price,
            subtotal,
            discount_amount: money_column(row, "discount_amount")?,
            final_amount: money_column(row, "final_amount")?,
            promo_id: row.try_get("promo_id")?,
            purchase_date: row.try_get("purchase_date")?,
        })
    }
}

/// Values for a new purchase row
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub customer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub price: PriceBreakdown,
    pub promo_id: Option<Uuid>,
}

pub async fn insert_purchase(
    tx: &mut Transaction<'_, Postgres>,
    purchase: &NewPurchase,
) -> AppResult<Purchase> {
    let sql = format!(
        r#"
        INSERT INTO purchases (
            id, customer_id, product_id, quantity, unit_price,
            discount_amount, final_amount, promo_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {PURCHASE_COLUMNS}
        "#
    );

    // Only reached after the stock check, so the quantity fits the column.
    let quantity = purchase
        .quantity
        .as_i32()
        .ok_or(DomainError::InvalidQuantity(purchase.quantity.get()))?;

    let created = query_as::<Postgres, Purchase>(&sql)
        .bind(Uuid::new_v4())
        .bind(purchase.customer_id)
        .bind(purchase.product_id)
        .bind(quantity)
        .bind(purchase.unit_price.value())
        .bind(purchase.price.discount.value())
        .bind(purchase.price.final_amount.value())
        .bind(purchase.promo_id)
        .fetch_one(&mut **tx)
        .await?;

    Ok(created)
}

pub async fn find_purchase(
    tx: &mut Transaction<'_, Postgres>,
    purchase_id: Uuid,
) -> AppResult<Option<Purchase>> {
    let sql = format!("SELECT {PURCHASE_COLUMNS} FROM purchases WHERE id = $1");
    let purchase = query_as::<Postgres, Purchase>(&sql)
        .bind(purchase_id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(purchase)
}
