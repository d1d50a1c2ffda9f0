use std::sync::Arc;

use anyhow::Context;

use stocktake_api::app::{self, services::AppServices};
use stocktake_infra::config::AppConfig;
use stocktake_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;

    stocktake_observability::init(LogFormat::for_production(config.is_production()));

    tracing::info!(
        environment = config.environment.as_str(),
        server_address = %config.server_addr(),
        "starting inventory check service"
    );

    let services = Arc::new(
        AppServices::from_config(&config)
            .await
            .context("failed to initialize check store")?,
    );

    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app::build_app(services.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    services.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}
