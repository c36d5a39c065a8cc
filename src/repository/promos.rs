//! Promos Repository

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{query_as, FromRow, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::{Discount, Promo, PromoType};
use crate::error::AppResult;

use super::decode_error;

/// Column list shared by every promo query
const PROMO_COLUMNS: &str =
    "id, name, description, promo_type, value, start_date, end_date, is_active, created_by";

impl<'r> FromRow<'r, PgRow> for Promo {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let promo_type: String = row.try_get("promo_type")?;
        let promo_type: PromoType = promo_type
            .parse()
            .map_err(|e| decode_error("promo_type", e))?;
        let value: Decimal = row.try_get("value")?;
        let discount =
            Discount::from_parts(promo_type, value).map_err(|e| decode_error("value", e))?;

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            discount,
            start_date: row.try_get("start_date")?,
            end_date: row.try_get("end_date")?,
            is_active: row.try_get("is_active")?,
            created_by: row.try_get("created_by")?,
        })
    }
}

pub async fn find_promo(
    tx: &mut Transaction<'_, Postgres>,
    promo_id: Uuid,
) -> AppResult<Option<Promo>> {
    let sql = format!("SELECT {PROMO_COLUMNS} FROM promos WHERE id = $1");
    let promo = query_as::<Postgres, Promo>(&sql)
        .bind(promo_id)
        .fetch_optional(&mut **tx)
        .await?;

    Ok(promo)
}
