//! Domain module
//!
//! Core domain types and the pure parts of the purchase engine.

pub mod context;
pub mod eligibility;
pub mod error;
pub mod models;
pub mod money;
pub mod pricing;
pub mod promo;

pub use context::{Actor, OperationContext, Role};
pub use eligibility::{evaluate, Eligibility, IneligibleReason};
pub use error::DomainError;
pub use models::{Customer, CustomerAggregate, Product, Purchase};
pub use money::{Money, MoneyError};
pub use pricing::{PriceBreakdown, Quantity};
pub use promo::{Discount, Percentage, Promo, PromoAssignment, PromoError, PromoStatus, PromoType};
