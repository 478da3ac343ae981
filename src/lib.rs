pub mod commands;
pub mod config;
pub mod data;
pub mod error;
pub mod models;
pub mod scope_path;
pub mod services;
pub mod state;

use tokio::net::TcpListener;
use tokio::signal;

use crate::config::AppConfig;
use crate::error::AppError;

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {e}");
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
    log::info!("shutdown signal received");
}

/// Serves the API until a shutdown signal arrives, then closes the store.
pub async fn run(config: AppConfig) -> Result<(), AppError> {
    let addr = config.socket_addr()?;
    let (state, db) = state::build(&config)?;
    log::info!(
        "sandbox root: {}, database: {}",
        state.files.sandbox().path().display(),
        config.database_path().display()
    );

    let listener = TcpListener::bind(addr).await?;
    log::info!("listening on http://{addr}");

    axum::serve(listener, commands::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close()?;
    Ok(())
}
