//! Repository module
//!
//! Explicit SQL over a caller-owned transaction. Nothing in here begins or
//! commits; the caller decides the transaction boundary.

pub mod customers;
pub mod products;
pub mod promos;
pub mod purchases;

use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::Money;

/// Decode a `NUMERIC` column into a validated [`Money`].
pub(crate) fn money_column(row: &PgRow, column: &str) -> sqlx::Result<Money> {
    let value: Decimal = row.try_get(column)?;
    Money::new(value).map_err(|e| decode_error(column, e))
}

pub(crate) fn decode_error<E>(column: &str, source: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(source),
    }
}
