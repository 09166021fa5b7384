//! SEO Audit Tracker - Installer
//!
//! Guided installation of a fresh deployment, served as a small JSON API:
//! - Stage 1: Check system requirements (database server, writable directories)
//! - Stage 2: Apply the database schema
//! - Stage 3: Create the administrator account
//! - Stage 4: Import the initial audit step templates
//! - Stage 5: Done
//!
//! The server keeps no record of which stage an operator is on; every request
//! names its stage and the response says where to go next.

mod auth;
mod config;
mod db;
mod error;
mod install;
mod models;
mod routes;
mod state;

use crate::config::Settings;
use crate::db::PgConnectionFactory;
use crate::install::{InstallOptions, Installer};
use crate::routes::create_router;
use crate::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging
    init_tracing();

    info!("🚀 Starting SEO Audit Tracker installer...");

    // Load configuration
    let settings = Settings::load()?;
    info!("📋 Configuration loaded successfully");

    if settings.install.allow_default_admin {
        warn!("⚠️  INSTALL_ALLOW_DEFAULT_ADMIN is set: blank administrator fields fall back to default credentials (development only!)");
    }
    match &settings.install.schema_path {
        Some(path) => info!("📄 Schema source: {}", path.display()),
        None => info!("📄 Schema source: bundled"),
    }

    // The pool connects lazily; an unreachable database is reported by the
    // requirements stage rather than stopping the server.
    let pool = db::create_pool(&settings.database)?;
    if let Err(e) = pool.get().await {
        warn!("⚠️  Database not reachable yet: {}", e);
    }

    let installer = Installer::new(
        PgConnectionFactory::new(pool),
        InstallOptions::from_config(&settings.install),
    );
    let state = Arc::new(AppState::new(installer));

    // Build the router
    let app = create_router(state, &settings);

    // Create socket address
    let addr = SocketAddr::from((settings.server.host, settings.server.port));

    info!("🌐 Server listening on http://{}", addr);
    info!("");
    info!("📚 API Endpoints:");
    info!("   GET  /health                   - Liveness check");
    info!("   GET  /install?stage=N          - Describe installation stage N");
    info!("   POST /install/advance          - Run the action of the current stage");
    info!("   GET  /install/status           - Installation status");
    info!("");

    // Create TCP listener and serve
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Initialize tracing with structured logging
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,seo_audit_installer=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("📴 Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            info!("📴 Received terminate signal, initiating graceful shutdown...");
        },
    }
}
