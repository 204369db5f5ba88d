use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod auth;
mod config;
mod domain;
mod error;
mod gateway;
mod http;
mod metrics;
mod repo;
mod service;
mod utils;

use auth::AuthSecret;
use gateway::{PaymentGateway, StripeGateway};
use repo::{OrderStore, PaymentStore, PgStore};
use service::{OrderService, PaymentService};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,storefront=debug")),
        )
        .init();

    let config = config::Config::load();

    // === 1. Connect to Postgres and apply migrations ===
    tracing::info!("Connecting to Postgres...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;

    sqlx::migrate!().run(&pool).await?;
    tracing::info!("Migrations applied");

    // === 2. Initialize Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);

    // === 3. Wire stores, gateway, and services ===
    let store = Arc::new(PgStore::new(pool, config.lock_timeout_ms));
    let order_store: Arc<dyn OrderStore> = store.clone();
    let payment_store: Arc<dyn PaymentStore> = store;
    let payment_gateway: Arc<dyn PaymentGateway> =
        Arc::new(StripeGateway::new(&config.webhook_secret));

    let orders = Arc::new(OrderService::new(order_store, metrics.clone()));
    let payments = Arc::new(PaymentService::new(
        payment_store,
        orders.clone(),
        payment_gateway,
        metrics.clone(),
        &config.currency,
    ));

    let order_data = web::Data::from(orders);
    let payment_data = web::Data::from(payments);
    let metrics_data = web::Data::from(metrics);
    let auth_data = web::Data::new(AuthSecret(config.auth_secret.clone()));

    // === 4. Serve ===
    tracing::info!(host = %config.host, port = config.port, "Starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(order_data.clone())
            .app_data(payment_data.clone())
            .app_data(metrics_data.clone())
            .app_data(auth_data.clone())
            .configure(http::routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
