//! play-alloc - Audio Allocation microservice
//!
//! Serves the lifecycle hooks a survey host calls to attach audio to listening
//! questions. Default port: 5730.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use play_alloc::config::{CliOverrides, Config};
use play_alloc::pool::PoolLayout;
use play_alloc::session::SessionRegistry;
use play_alloc::store::SqliteStore;
use play_alloc::{AppState, Allocator};

/// Command-line arguments for play-alloc
#[derive(Parser, Debug)]
#[command(name = "play-alloc")]
#[command(about = "Audio allocation microservice for listening surveys")]
#[command(version)]
struct Args {
    /// Directory holding `<survey>/files` audio pools
    #[arg(long, env = "PLAY_POOL_ROOT")]
    pool_root: Option<PathBuf>,

    /// Public URL prefix equivalent to the pool root
    #[arg(long, env = "PLAY_PUBLIC_PREFIX")]
    public_prefix: Option<String>,

    /// SQLite database file
    #[arg(long, env = "PLAY_DATABASE")]
    database: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "PLAY_BIND")]
    bind: Option<String>,

    /// Configuration file
    #[arg(short, long, env = "PLAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = match args.config.clone().or_else(play_common::config::default_config_path) {
        Some(path) => play_common::config::load_toml_config(&path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => Default::default(),
    };

    // Initialize tracing; RUST_LOG wins over the config file level
    let default_filter = format!("play_alloc=debug,tower_http=debug,{}", toml_config.logging.level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting play-alloc v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = Config::resolve(
        CliOverrides {
            pool_root: args.pool_root,
            public_url_prefix: args.public_prefix,
            database_path: args.database,
            bind_addr: args.bind,
        },
        toml_config,
    );
    info!("Audio pool root: {}", config.pool_root.display());
    info!("Public URL prefix: {}", config.public_url_prefix);
    info!("Database: {}", config.database_path.display());
    info!(
        "Session idle timeout: {}s, retention: {}s",
        config.session_idle_timeout.as_secs(),
        config.session_retention.as_secs()
    );

    let db_pool = play_alloc::db::init_database_pool(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established");

    let layout = PoolLayout::new(&config.pool_root, &config.public_url_prefix);
    let store = Arc::new(SqliteStore::new(db_pool, layout.clone()));
    let allocator = Allocator::new(store, layout);

    let sessions = SessionRegistry::with_timeouts(config.session_idle_timeout, config.session_retention);
    let state = AppState::new(allocator, config.allowed_question_types.clone()).with_sessions(sessions);
    let app = play_alloc::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("Listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
