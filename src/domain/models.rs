//! Persistent records
//!
//! Plain data structs for the rows the engine reads and writes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Money;

/// Customer row, including the running aggregate columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub total_spent: Decimal,
    pub purchase_count: i32,
}

impl Customer {
    pub fn aggregate(&self) -> CustomerAggregate {
        CustomerAggregate {
            customer_id: self.id,
            total_spent: self.total_spent,
            purchase_count: self.purchase_count,
        }
    }
}

/// Product row. `stock` is only ever lowered by the purchase coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub stock: i32,
    pub price: Money,
}

impl Product {
    pub fn has_stock_for(&self, quantity: i64) -> bool {
        i64::from(self.stock) >= quantity
    }
}

/// Immutable purchase record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Product price at the time of purchase
    pub unit_price: Money,
    pub subtotal: Money,
    pub discount_amount: Money,
    pub final_amount: Money,
    pub promo_id: Option<Uuid>,
    pub purchase_date: DateTime<Utc>,
}

/// Lifetime totals kept on the customer row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAggregate {
    pub customer_id: Uuid,
    pub total_spent: Decimal,
    pub purchase_count: i32,
}
