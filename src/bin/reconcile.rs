//! Aggregate reconciliation tool
//!
//! Recomputes customer totals from the purchases table and prints what
//! drifted.
//!
//! Run with: cargo run --bin reconcile -- [--customer <uuid>]

use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crm_engine::projection::CustomerAggregateService;
use crm_engine::{Config, OperationContext};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crm_engine=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let customer = match args.iter().position(|a| a == "--customer") {
        Some(i) => {
            let raw = args
                .get(i + 1)
                .ok_or_else(|| anyhow::anyhow!("--customer needs a UUID"))?;
            Some(Uuid::parse_str(raw)?)
        }
        None => None,
    };

    let config = Config::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await?;

    let service = CustomerAggregateService::new(pool.clone());
    let mut context = OperationContext::new();
    context.ensure_correlation_id();

    let report = match customer {
        Some(customer_id) => service.reconcile(customer_id, &context).await?,
        None => service.reconcile_all(&context).await?,
    };

    println!("Customers checked: {}", report.customers_checked);
    if report.is_clean() {
        println!("No drift found");
    } else {
        println!("Repaired {} customer(s):", report.drifted.len());
        for drift in &report.drifted {
            println!(
                "  {}  total_spent {} -> {}  purchase_count {} -> {}",
                drift.customer_id,
                drift.stored_total_spent,
                drift.actual_total_spent,
                drift.stored_purchase_count,
                drift.actual_purchase_count,
            );
        }
    }

    pool.close().await;
    Ok(())
}
