//! Lumina Server binary.

use lumina_server::config::Config;
use lumina_server::{app, db, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lumina_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting Lumina Server on {}", config.bind_addr());
    if config.auth_secret.is_none() {
        tracing::warn!("AUTH_SECRET is not set, accepting unauthenticated requests");
    }

    let pool = db::create_pool(&config).await?;

    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    let addr = config.bind_addr();
    let state = AppState {
        pool,
        config: Arc::new(config),
    };

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
