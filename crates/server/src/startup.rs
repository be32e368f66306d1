use std::{net::SocketAddr, sync::Arc, time::Duration};

use migration::{Migrator, MigratorTrait};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use configs::{AppConfig, ServerConfig};
use service::auth::hasher::Argon2Hasher;
use service::auth::repo::seaorm::SeaOrmUserRepository;
use service::auth::repository::UserRepository;
use service::auth::token::JwtTokenIssuer;
use service::auth::InputRules;
use service::loader::LoaderConfig;

use crate::errors::StartupError;
use crate::routes;
use crate::state::AppState;

/// Wire the auth service and loader factory from configuration.
pub fn build_state(repo: Arc<dyn UserRepository>, cfg: &AppConfig) -> Result<AppState, StartupError> {
    let hasher = Argon2Hasher::from_settings(&cfg.auth)
        .map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
    let tokens = JwtTokenIssuer::from_settings(&cfg.auth);
    Ok(AppState::new(
        repo,
        Arc::new(hasher),
        Arc::new(tokens),
        InputRules::from(&cfg.auth),
        LoaderConfig::from(&cfg.loader),
    ))
}

fn bind_addr(server: &ServerConfig) -> Result<SocketAddr, StartupError> {
    format!("{}:{}", server.host, server.port)
        .parse()
        .map_err(|e| StartupError::InvalidConfig(format!("server address: {e}")))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received, draining connections");
}

/// Connect, migrate and serve until Ctrl+C.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let db = models::db::connect_with_config(&cfg.database)
        .await
        .map_err(|e| StartupError::Database(e.to_string()))?;
    Migrator::up(&db, None).await?;
    info!("database migrations applied");

    let repo: Arc<dyn UserRepository> = Arc::new(SeaOrmUserRepository::new(db));
    let state = build_state(repo, &cfg)?;
    let timeout = Duration::from_secs(cfg.server.request_timeout_secs);
    let app = routes::build_router(state, CorsLayer::very_permissive(), timeout);

    let addr = bind_addr(&cfg.server)?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "http server listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!("http server stopped");
    Ok(())
}
