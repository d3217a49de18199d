//! Arena Ledger Service
//!
//! Main entry point. This service:
//! - applies database migrations
//! - wires tournament, ledger, reward and wager services
//! - runs the background settlement poller for match bets

use anyhow::Context;
use arena_ledger::database::{create_pool, run_migrations};
use arena_ledger::services::SettlementPoller;
use arena_ledger::{AppConfig, AppState};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env()
        .map_err(arena_ledger::AppError::Config)
        .context("Failed to load configuration")?;

    // Initialize tracing/logging with config
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("arena_ledger={},sqlx=warn", config.log_level).into());
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Arena ledger service starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");
    let pool = create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;
    info!("Database connection pool created (max connections: {})", config.database.max_connections);

    info!("Running database migrations...");
    run_migrations(&pool).await.context("Database migration failed")?;
    info!("Database migrations completed");

    // =========================================================================
    // SERVICES
    // =========================================================================
    let state = AppState::with_pool(&config, pool).context("Failed to initialize services")?;
    info!("✓ Services initialized");

    // =========================================================================
    // BACKGROUND TASKS
    // =========================================================================
    let poller_handle = if config.bracket.is_configured() {
        let poller = SettlementPoller::new(state.wagers.clone())
            .with_poll_interval(config.settlement.poll_interval());
        info!("✓ Settlement poller started ({}s interval)", config.settlement.poll_interval_secs);
        Some(tokio::spawn(async move {
            poller.start().await;
        }))
    } else {
        warn!("Bracket provider not configured - settlement poller not started");
        None
    };

    info!("Arena ledger service ready. Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = async {
            match poller_handle {
                Some(handle) => {
                    handle.await.ok();
                }
                // Never completes if the poller is not running
                None => futures::future::pending::<()>().await,
            }
        } => {
            error!("Settlement poller exited unexpectedly");
        }
    }

    if let Some(database) = state.database {
        database.into_pool().close().await;
    }
    info!("Arena ledger service shutdown complete");
    Ok(())
}
