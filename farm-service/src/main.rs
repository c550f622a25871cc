use farm_core::error::AppError;
use farm_core::observability::init_tracing;
use farm_service::{
    build_router,
    config::FarmConfig,
    services::{JwtService, PermissionResolver, PgStore, SmtpEmail},
    AppState,
};
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = FarmConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting farm service"
    );

    let pool = farm_service::db::create_pool(&config.database).await?;
    farm_service::db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!(e)))?;

    let store = Arc::new(PgStore::new(pool));
    tracing::info!("Database initialized");

    let email = Arc::new(SmtpEmail::new(&config.smtp)?);
    let jwt = JwtService::new(&config.jwt);
    let permissions = PermissionResolver::new(store.clone());

    let state = AppState {
        config: config.clone(),
        store,
        jwt,
        permissions,
        email,
    };

    let app = build_router(state);

    let addr = config.common.socket_addr();
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
