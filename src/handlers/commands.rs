//! Command definitions
//!
//! Commands represent intentions to change the system state.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Money, PromoType, Purchase};

// =========================================================================
// CreatePurchaseCommand
// =========================================================================

/// Command to buy `quantity` units of a product, optionally with a promo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseCommand {
    pub customer_id: Uuid,
    pub product_id: Uuid,
    /// Raw quantity; validated by the handler
    pub quantity: i64,
    pub promo_id: Option<Uuid>,
}

impl CreatePurchaseCommand {
    pub fn new(customer_id: Uuid, product_id: Uuid, quantity: i64) -> Self {
        Self {
            customer_id,
            product_id,
            quantity,
            promo_id: None,
        }
    }

    pub fn with_promo(mut self, promo_id: Uuid) -> Self {
        self.promo_id = Some(promo_id);
        self
    }

    /// Canonical bytes for idempotency hashing
    pub fn canonical_bytes(&self) -> Vec<u8> {
        // Serializing a plain struct of ids and integers cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

// =========================================================================
// AssignPromoCommand
// =========================================================================

/// Command to make a promo available to one customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignPromoCommand {
    pub promo_id: Uuid,
    pub customer_id: Uuid,
}

impl AssignPromoCommand {
    pub fn new(promo_id: Uuid, customer_id: Uuid) -> Self {
        Self {
            promo_id,
            customer_id,
        }
    }
}

/// The promo that was applied to a purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPromo {
    pub promo_id: Uuid,
    pub promo_type: PromoType,
    pub discount_amount: Money,
}

/// Result of a purchase request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseResult {
    pub purchase: Purchase,
    pub applied_promo: Option<AppliedPromo>,
    /// True when the purchase was returned for a repeated idempotency key
    pub replayed: bool,
}
