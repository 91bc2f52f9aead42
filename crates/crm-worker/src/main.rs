//! CRM worker entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use crm_core::clock::SystemClock;
use crm_event_store::pg_event_buffer_repository::PgEventBufferRepository;
use crm_event_store::pg_event_repository::PgEventRepository;
use crm_worker::config::WorkerConfig;
use crm_worker::error::AppError;
use crm_worker::routes;
use crm_worker::state::AppState;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting CRM worker");

    let config = WorkerConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    let app_state = AppState::new(
        Arc::new(PgEventRepository::new(pool.clone())),
        Arc::new(PgEventBufferRepository::new(pool)),
        Arc::new(SystemClock),
        &config,
    );
    let rebuilt = app_state.rebuild_read_models().await?;
    tracing::info!(records = rebuilt, "Read models rebuilt");
    app_state.dispatcher.start();

    let app = routes::router(app_state.clone()).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(app_state.shutdown.clone()))
        .await?;

    app_state.dispatcher.shutdown().await;
    tracing::info!("CRM worker stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown requested"),
        Err(err) => {
            tracing::error!(error = %err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
    shutdown.cancel();
}
