// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! calbook API Server
//!
//! Serves booking pages for hosts and creates the booked meetings on their
//! connected Google or Microsoft calendars.

use calbook::{
    config::Config,
    db::SqliteDb,
    models::AvailabilityDay,
    services::{account::hash_password, Providers},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting calbook API");

    let db = SqliteDb::new(&config.database_url).await?;

    if config.seed_demo {
        seed_demo(&db).await?;
    }

    let providers = Providers::from_config(&config)?;
    let state = Arc::new(AppState::new(config.clone(), db.clone(), providers)?);

    let app = calbook::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    tracing::info!("Server stopped");
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("calbook=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Demo host `demo`/`demo` with a weekday 09:00-17:00 availability.
async fn seed_demo(db: &SqliteDb) -> Result<(), Box<dyn std::error::Error>> {
    if db.find_user_by_username("demo").await?.is_some() {
        return Ok(());
    }

    let password = hash_password("demo", bcrypt::DEFAULT_COST).await?;
    let user_id = db.create_user("demo", &password).await?;

    let days: Vec<AvailabilityDay> = (0..7)
        .map(|day| AvailabilityDay {
            day,
            enabled: (1..=5).contains(&day),
            start_time: 900,
            end_time: 1700,
        })
        .collect();
    let availability_id = db
        .create_availability(user_id, "Working hours", "America/New_York", &days)
        .await?;
    db.create_event_type(
        user_id,
        availability_id,
        "30min-intro",
        "A quick introduction call",
        30,
        true,
    )
    .await?;

    tracing::info!(user_id, "Seeded demo host");
    Ok(())
}
