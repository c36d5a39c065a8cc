//! CRM purchase engine
//!
//! Purchases, promo assignment and customer aggregates over PostgreSQL.
//! The binary in `main.rs` serves [`build_router`]; the library is also used
//! by the maintenance binaries and the integration tests.

pub mod api;
pub mod assignment;
pub mod audit;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod idempotency;
pub mod jobs;
pub mod projection;
pub mod repository;

use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

pub use api::AppState;
pub use config::{Config, EngineSettings};
pub use domain::{DomainError, Money, MoneyError, OperationContext};
pub use error::{AppError, AppResult};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Layers run last-added first: actor -> logging -> handler
    let api_routes = api::create_router()
        .layer(middleware::from_fn(api::middleware::logging_middleware))
        .layer(middleware::from_fn(api::middleware::actor_middleware));

    Router::new()
        // Health check (no actor required)
        .route("/health", axum::routing::get(health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
