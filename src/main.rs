use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use engine_sync::application::handlers::router;
use engine_sync::application::AppContext;
use engine_sync::config::EngineConfig;
use engine_sync::domain::errors::{ConfigError, StartupError};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Ignoring unreadable .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "engine_sync=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = EngineConfig::from_env();
    info!("Engine sync starting, engine at {}", config.url);

    let ctx = Arc::new(AppContext::build(config)?);
    let addr: SocketAddr = ctx
        .config
        .http_bind_addr
        .parse()
        .map_err(|_| ConfigError::InvalidBindAddress(ctx.config.http_bind_addr.clone()))?;

    ctx.coordinator.init().await;

    let app = router(ctx.clone());
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    let shutdown_signal = async {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await;

    info!("Server shutting down gracefully...");
    if !ctx.coordinator.shutdown().await {
        warn!("Engine session was already torn down");
    }
    info!("Shutdown complete");

    served.map_err(StartupError::from)
}
