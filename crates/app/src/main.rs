use std::net::SocketAddr;

use anyhow::{Context, Result};
use api::{AppState, build_router};
use chrono::Duration;
use clap::Parser;
use services::{AppServices, Clock, ServiceOptions};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{Cli, Config};

const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Config::resolve(Cli::parse())?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        db_url = %config.db_url,
        "starting nexus-server"
    );

    let mut options = ServiceOptions {
        session_ttl: Duration::hours(config.session_ttl_hours),
        ..ServiceOptions::default()
    };
    if config.provider_mail {
        options = options.with_provider_mail();
    }
    let services = AppServices::new_sqlite(&config.db_url, Clock::system(), options)
        .await
        .with_context(|| format!("opening database {}", config.db_url))?;

    if let Some(admin) = &config.admin {
        let user = services
            .auth()
            .ensure_admin(&admin.email, &admin.name, &admin.password)
            .await
            .context("bootstrapping administrator")?;
        info!(user_id = %user.id, email = %user.email, "administrator ready");
    }

    serve(config.bind, AppState::new(services)).await
}

async fn serve(bind: SocketAddr, state: AppState) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    info!("listening on http://{bind}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c, shutting down"),
        () = terminate => info!("received terminate signal, shutting down"),
    }
}
