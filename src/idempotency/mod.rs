//! Idempotency module
//!
//! Lets a client retry a purchase safely: the key row is written inside the
//! purchase transaction, so it exists exactly when the purchase does.

mod repository;

pub use repository::{
    claim, complete, compute_request_hash, delete_expired, IdempotencyOutcome,
};
