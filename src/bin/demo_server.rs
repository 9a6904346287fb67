use anyhow::Context;
use aws_launchpad::server::{self, AppState};
use aws_launchpad::utils::{logger, validation::Validate};
use aws_launchpad::ServerConfig;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init_server_logger();

    let config = ServerConfig::from_env().context("failed to read server configuration")?;
    config.validate().context("invalid server configuration")?;

    tracing::info!(
        "Starting {} v{} ({})",
        config.app_name,
        config.app_version,
        config.environment
    );
    if let Some(db) = &config.database {
        tracing::info!("Database check target: {}:{}", db.host, db.port);
    }

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    server::serve(listener, AppState::new(config), shutdown_signal()).await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM as sent by ECS/Kubernetes when stopping a task.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("failed to listen for SIGTERM: {}", e);
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

    tracing::info!("Shutdown signal received");
}
