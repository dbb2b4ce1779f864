use anyhow::Context;
use restaurant_service::config::load_config;
use restaurant_service::{build_router, db, seed, AppState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config()?;
    let addr = config.bind_addr();

    let db_pool = db::connect(&config).await?;
    if config.seed_demo_data {
        seed::seed_demo_data(&db_pool).await?;
    }

    let state = AppState::new(db_pool, config)?;
    let app = build_router(state);

    info!(%addr, "starting restaurant-service");
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
