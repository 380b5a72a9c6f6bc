//! GHAS reviewer entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Resolve configuration**: load `.env`, parse flags and environment,
//!    read the optional policy file and fail fast on missing credentials.
//! 2. **Wire observability**: install the `tracing` subscriber (text or JSON)
//!    and the optional OTLP exporter.
//! 3. **Construct infrastructure**: build the [`github::GitHubApp`] session
//!    factory and the triage handler registry, and inject both into the
//!    webhook service.
//! 4. **Serve** until Ctrl-C / SIGTERM, then flush telemetry.

mod config;
mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use github::GitHubApp;
use listener::{router, serve, triage_registry, WebhookService};
use tracing::info;

use crate::config::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let config = Args::parse()
        .resolve()
        .context("invalid configuration")?;
    let telemetry = telemetry::init(&config.logging)?;

    let app = GitHubApp::new(config.app).context("failed to load GitHub App credentials")?;
    info!(
        app_id = %app.app_id(),
        team = %config.policy.team,
        tools = ?config.policy.tools,
        severities = ?config.policy.severities,
        "GHAS reviewer configured"
    );

    let registry = triage_registry(Arc::new(config.policy));
    let service = WebhookService::new(registry, config.secret, Arc::new(app));
    let router = router(Arc::new(service), &config.webhook_path);

    let result = serve(config.bind, router, shutdown_signal())
        .await
        .context("webhook server failed");

    info!("Shutting down");
    telemetry.shutdown();
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
