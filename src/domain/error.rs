//! Domain Error Types
//!
//! Business rule violations raised by the purchase engine. Independent of
//! the web and database layers.

use thiserror::Error;
use uuid::Uuid;

use super::eligibility::IneligibleReason;
use super::money::MoneyError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Customer not found: {0}")]
    CustomerNotFound(Uuid),

    #[error("Promo not found: {0}")]
    PromoNotFound(Uuid),

    #[error("Purchase not found: {0}")]
    PurchaseNotFound(Uuid),

    /// Quantity below one
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    #[error("Insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i32 },

    #[error("Promo cannot be applied: {0}")]
    PromoIneligible(IneligibleReason),

    #[error("Promo {promo_id} is already assigned to customer {customer_id}")]
    AlreadyAssigned { promo_id: Uuid, customer_id: Uuid },

    /// Amount outside the storable range or otherwise malformed
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Idempotency key reused for a different request
    #[error("Idempotency key {0} was used with a different request")]
    IdempotencyConflict(Uuid),

    /// Lock wait, deadlock, serialization failure or timeout. Safe to retry.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),
}

impl DomainError {
    pub fn insufficient_stock(requested: i64, available: i32) -> Self {
        Self::InsufficientStock {
            requested,
            available,
        }
    }

    pub fn already_assigned(promo_id: Uuid, customer_id: Uuid) -> Self {
        Self::AlreadyAssigned {
            promo_id,
            customer_id,
        }
    }

    /// Stable machine-readable name
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ProductNotFound(_) => "product_not_found",
            Self::CustomerNotFound(_) => "customer_not_found",
            Self::PromoNotFound(_) => "promo_not_found",
            Self::PurchaseNotFound(_) => "purchase_not_found",
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::PromoIneligible(_) => "promo_ineligible",
            Self::AlreadyAssigned { .. } => "already_assigned",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::IdempotencyConflict(_) => "idempotency_conflict",
            Self::TransactionFailed(_) => "transaction_failed",
        }
    }

    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::TransactionFailed(_))
    }

    /// Retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionFailed(_))
    }
}

impl From<MoneyError> for DomainError {
    fn from(err: MoneyError) -> Self {
        Self::InvalidAmount(err.to_string())
    }
}
