//! Projection module
//!
//! Keeps the customer aggregate columns (`total_spent`, `purchase_count`)
//! in step with the purchases table: incrementally on every purchase, and by
//! full recomputation when asked to reconcile.

mod service;

pub use service::{apply_delta, AggregateDrift, CustomerAggregateService, ReconcileReport};
