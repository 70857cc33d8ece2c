//! Instrument Store - order service

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use instrument_store::api::{self, AppState};
use instrument_store::clock::SystemClock;
use instrument_store::infrastructure::{InMemoryOrderRepository, PgOrderRepository};
use instrument_store::{Config, OrderRepository, OrderService};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let repo: Arc<dyn OrderRepository> = match &config.database_url {
        Some(url) => {
            let db = PgPoolOptions::new().max_connections(config.database_max_connections).connect(url).await?;
            sqlx::migrate!("./migrations").run(&db).await?;
            Arc::new(PgOrderRepository::new(db))
        }
        None => {
            warn!("DATABASE_URL not set, orders are kept in memory only");
            Arc::new(InMemoryOrderRepository::new())
        }
    };
    let nats = match &config.nats_url {
        Some(url) => async_nats::connect(url.as_str()).await.map_err(|e| warn!(error = %e, "NATS unavailable, events disabled")).ok(),
        None => None,
    };

    let orders = OrderService::new(repo, Arc::new(SystemClock), config.order_numbers()?);
    let app = api::router(AppState { orders, nats, currency: config.currency.clone() });

    info!(timezone = %config.order_timezone, format = ?config.order_number_format, "order numbering configured");
    info!("🎸 Instrument Store listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?, app).await?;
    Ok(())
}
