//! Application entry point for the `sensorflow-alerting` service.
//!
//! This binary orchestrates the full startup sequence for the metrics
//! ingestion and alerting API, including:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Selecting the storage backend (PostgreSQL, or in-memory when no
//!   `DATABASE_URL` is given)
//! - Creating the database schema if it does not exist
//! - Wiring the alerting engine and summary aggregator into the `routes`
//!   gateway (EMBP pattern)
//! - Binding the Axum HTTP server and serving requests
//!
//! # Environment Variables
//! - `DATABASE_URL` (optional) – PostgreSQL connection string
//! - `DB_POOL_MAX` (optional) – maximum number of DB connections (default: 5)
//! - `LISTEN_PORT` (optional) – HTTP port (default: 8080)
//! - `ALERTING_CONSECUTIVE_BREACH_COUNT`, `THRESHOLDS_*` – see `config`
//! - `AXUM_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `AXUM_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! This module follows the Explicit Module Boundary Pattern (EMBP) by
//! delegating schema setup to `schema`, configuration parsing to `config`,
//! persistence to `store`, and route registration to `routes`.
use std::{env, net::SocketAddr, sync::Arc};

use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use anyhow::Result;

mod alerting;
mod config;
mod error;
mod models;
mod routes;
mod schema;
mod store;
mod summary;

pub use config::Config;

use store::{
    AlertStore, MemoryAlertStore, MemoryReadingStore, PgAlertStore, PgReadingStore, ReadingStore,
};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    init_tracing();
    dotenv().ok();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    let (readings, alerts) = open_stores(&cfg).await?;

    // Build app from routes gateway (EMBP)
    let state = routes::AppState::new(&cfg.alerting, readings, alerts);
    let app: Router = routes::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.listen_port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Connect to PostgreSQL and prepare the schema, or fall back to in-memory
/// stores when no database is configured.
async fn open_stores(cfg: &Config) -> Result<(Arc<dyn ReadingStore>, Arc<dyn AlertStore>)> {
    // ---
    let Some(db_url) = cfg.db_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; readings and alerts are kept in memory only");
        return Ok((
            Arc::new(MemoryReadingStore::new()),
            Arc::new(MemoryAlertStore::new()),
        ));
    };

    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    Ok((
        Arc::new(PgReadingStore::new(pool.clone())),
        Arc::new(PgAlertStore::new(pool)),
    ))
}

// ---

/// Install the process-wide subscriber. Alert creation is logged at WARN and
/// storage failures at ERROR, so `AXUM_LOG_LEVEL=warn` keeps only those.
/// `RUST_LOG` overrides the level entirely; `FORCE_COLOR` overrides TTY
/// detection for ANSI output.
fn init_tracing() {
    // ---
    let span_events = match env::var("AXUM_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = env::var("AXUM_LOG_LEVEL")
            .ok()
            .filter(|l| ["trace", "debug", "info", "warn", "error"].contains(&l.as_str()))
            .unwrap_or_else(|| "debug".to_string());
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
