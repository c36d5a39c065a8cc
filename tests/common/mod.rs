//! Common test utilities
//!
//! Tests share one database and run concurrently, so every test seeds its
//! own customers and products under fresh ids instead of truncating.

#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tokio::sync::OnceCell;
use uuid::Uuid;

const MIGRATION: &str = include_str!("../../migrations/0001_purchase_engine.sql");

static MIGRATED: OnceCell<()> = OnceCell::const_new();

/// Connect to `DATABASE_URL` and make sure the schema exists.
///
/// Returns `None` when no database is configured; callers skip the test.
pub async fn setup_test_db() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    MIGRATED
        .get_or_init(|| async {
            let mut tx = pool.begin().await.expect("Failed to begin transaction");
            // Serialize schema setup across test binaries.
            sqlx::query("SELECT pg_advisory_xact_lock(7142)")
                .execute(&mut *tx)
                .await
                .expect("Failed to take migration lock");
            (&mut *tx)
                .execute(MIGRATION)
                .await
                .expect("Failed to apply migration");
            tx.commit().await.expect("Failed to commit migration");
        })
        .await;

    Some(pool)
}

/// Build the full application router the way the server does
pub fn app(pool: PgPool) -> axum::Router {
    crm_engine::build_router(crm_engine::AppState::new(
        pool,
        crm_engine::EngineSettings::default(),
    ))
}

pub async fn seed_customer(pool: &PgPool) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO customers (id, name, email) VALUES ($1, $2, $3)")
        .bind(id)
        .bind("Test Customer")
        .bind(format!("{id}@example.com"))
        .execute(pool)
        .await
        .expect("Failed to seed customer");
    id
}

pub async fn seed_product(pool: &PgPool, price: Decimal, stock: i32) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO products (id, name, stock, price) VALUES ($1, $2, $3, $4)")
        .bind(id)
        .bind("Test Product")
        .bind(stock)
        .bind(price)
        .execute(pool)
        .await
        .expect("Failed to seed product");
    id
}

/// Promo running from yesterday to tomorrow
pub async fn seed_promo(pool: &PgPool, promo_type: &str, value: Decimal) -> Uuid {
    let now = Utc::now();
    seed_promo_window(
        pool,
        promo_type,
        value,
        Some(now - Duration::days(1)),
        Some(now + Duration::days(1)),
        true,
    )
    .await
}

pub async fn seed_promo_window(
    pool: &PgPool,
    promo_type: &str,
    value: Decimal,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    is_active: bool,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO promos (id, name, promo_type, value, start_date, end_date, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind("Test Promo")
    .bind(promo_type)
    .bind(value)
    .bind(start_date)
    .bind(end_date)
    .bind(is_active)
    .execute(pool)
    .await
    .expect("Failed to seed promo");
    id
}

pub async fn seed_assignment(pool: &PgPool, promo_id: Uuid, customer_id: Uuid) -> Uuid {
    sqlx::query_scalar(
        "INSERT INTO promo_assignments (promo_id, customer_id) VALUES ($1, $2) RETURNING id",
    )
    .bind(promo_id)
    .bind(customer_id)
    .fetch_one(pool)
    .await
    .expect("Failed to seed assignment")
}

pub async fn stock_of(pool: &PgPool, product_id: Uuid) -> i32 {
    sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read stock")
}

pub async fn aggregate_of(pool: &PgPool, customer_id: Uuid) -> (Decimal, i32) {
    sqlx::query_as("SELECT total_spent, purchase_count FROM customers WHERE id = $1")
        .bind(customer_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read aggregate")
}

pub async fn assignment_used(pool: &PgPool, assignment_id: Uuid) -> bool {
    sqlx::query_scalar("SELECT is_used FROM promo_assignments WHERE id = $1")
        .bind(assignment_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read assignment")
}

pub async fn purchase_count_for(pool: &PgPool, customer_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM purchases WHERE customer_id = $1")
        .bind(customer_id)
        .fetch_one(pool)
        .await
        .expect("Failed to count purchases")
}
