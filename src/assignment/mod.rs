//! Promo Assignment Registry
//!
//! Records which customer may use which promo. An assignment is created at
//! most once per (promo, customer) pair and consumed at most once, and only
//! the purchase coordinator consumes.

mod registry;

pub(crate) use registry::consume;
pub use registry::{assign, find_for_update, list_with_promos, AssignedPromo};
