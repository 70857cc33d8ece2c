//! Assigns order numbers to orders created before numbering existed.
//!
//! Each number is computed from the order's original `created_at`, not the
//! current time. Run once against the production database:
//!
//! ```text
//! DATABASE_URL=postgres://... cargo run --bin backfill-order-numbers
//! ```

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use instrument_store::clock::SystemClock;
use instrument_store::infrastructure::PgOrderRepository;
use instrument_store::{Config, OrderService};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;
    let url = config.database_url.as_deref().context("DATABASE_URL is required for the backfill")?;

    let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    info!("Starting order number migration...");
    let service = OrderService::new(Arc::new(PgOrderRepository::new(db.clone())), Arc::new(SystemClock), config.order_numbers()?);
    let report = service.backfill_order_numbers().await?;
    info!(scanned = report.scanned, assigned = report.assigned, suffixed = report.suffixed, "Migration completed");

    db.close().await;
    Ok(())
}
