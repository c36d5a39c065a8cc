//! Command Handlers module
//!
//! Handlers own the transaction boundary and coordinate repositories,
//! the assignment registry and the aggregate maintainer.

mod commands;
mod promo_handler;
mod purchase_handler;


pub use commands::*;
pub use promo_handler::PromoHandler;
pub use purchase_handler::PurchaseHandler;
