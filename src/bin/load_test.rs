//! Load Testing Tool
//!
//! Fires concurrent purchases at a single freshly seeded product and checks
//! that stock never goes negative.
//!
//! Run with: cargo run --bin load_test --release -- --requests 200 --stock 100

use std::time::Instant;

use rand::Rng;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinSet;
use uuid::Uuid;

use crm_engine::domain::{Actor, Role};
use crm_engine::handlers::{CreatePurchaseCommand, PurchaseHandler};
use crm_engine::{AppError, DomainError, OperationContext};

fn arg_or(args: &[String], name: &str, default: u32) -> u32 {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let requests = arg_or(&args, "--requests", 200);
    let stock = arg_or(&args, "--stock", 100);

    let database_url = std::env::var("DATABASE_URL")?;

    println!("Load Test - {} concurrent purchases against stock {}", requests, stock);
    println!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&database_url)
        .await?;

    let customer_id = Uuid::new_v4();
    sqlx::query("INSERT INTO customers (id, name, email) VALUES ($1, 'Load Test', $2)")
        .bind(customer_id)
        .bind(format!("load-{customer_id}@example.com"))
        .execute(&pool)
        .await?;

    let product_id = Uuid::new_v4();
    sqlx::query("INSERT INTO products (id, name, stock, price) VALUES ($1, 'Load Test Item', $2, $3)")
        .bind(product_id)
        .bind(i32::try_from(stock)?)
        .bind(Decimal::new(10_000, 0))
        .execute(&pool)
        .await?;

    let quantities: Vec<i64> = {
        let mut rng = rand::thread_rng();
        (0..requests).map(|_| rng.gen_range(1..=3)).collect()
    };

    let context = OperationContext::new().with_actor(&Actor::new(Uuid::new_v4(), Role::Admin));
    let start = Instant::now();
    let mut tasks = JoinSet::new();

    for quantity in quantities {
        let handler = PurchaseHandler::new(pool.clone());
        let context = context.clone();
        tasks.spawn(async move {
            let command = CreatePurchaseCommand::new(customer_id, product_id, quantity);
            (quantity, handler.execute(command, None, &context).await)
        });
    }

    let mut sold = 0i64;
    let mut success_count = 0u32;
    let mut insufficient_stock = 0u32;
    let mut retryable = 0u32;
    let mut other_errors = 0u32;

    while let Some(joined) = tasks.join_next().await {
        match joined? {
            (quantity, Ok(_)) => {
                success_count += 1;
                sold += quantity;
            }
            (_, Err(AppError::Domain(DomainError::InsufficientStock { .. }))) => {
                insufficient_stock += 1
            }
            (_, Err(e)) if e.as_domain().is_some_and(DomainError::is_retryable) => retryable += 1,
            (_, Err(e)) => {
                other_errors += 1;
                eprintln!("Unexpected error: {}", e);
            }
        }
    }

    let elapsed = start.elapsed();

    let final_stock: i32 = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(&pool)
        .await?;

    println!("\n=== Load Test Results ===");
    println!("Requests: {}", requests);
    println!("Successful: {}", success_count);
    println!("Insufficient stock: {}", insufficient_stock);
    println!("Transaction failed (retryable): {}", retryable);
    println!("Other errors: {}", other_errors);
    println!("Units sold: {}", sold);
    println!("Final stock: {}", final_stock);
    println!("Time: {:.2}s", elapsed.as_secs_f64());

    if i64::from(final_stock) + sold != i64::from(stock) || final_stock < 0 {
        anyhow::bail!("stock accounting mismatch");
    }
    println!("Stock accounting consistent");

    Ok(())
}
