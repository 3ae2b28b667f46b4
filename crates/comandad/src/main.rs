use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod credentials;
mod engine;
mod inventory;
mod routes;
mod store;

use config::Config;
use inventory::InventoryStore;
use routes::AppState;
use store::PgChefStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    tracing::info!("comandad starting");

    let ops_pool = PgPoolOptions::new()
        .max_connections(config.max_pool_connections)
        .connect(&config.ops_database_url)
        .await?;
    sqlx::migrate!().run(&ops_pool).await?;
    tracing::info!("operational database ready");

    let catalog_pool = PgPoolOptions::new()
        .max_connections(config.max_pool_connections)
        .connect(&config.catalog_database_url)
        .await?;
    tracing::info!("catalog database connected");

    let engine = engine::spawn_engine(
        &config.detector_model_path(),
        &config.encoder_model_path(),
        config.engine_queue_depth,
    )?;

    let state = AppState {
        embedder: Arc::new(engine),
        chefs: Arc::new(PgChefStore::new(ops_pool.clone())),
        inventory: Arc::new(InventoryStore::new(
            ops_pool,
            catalog_pool,
            config.display_timezone.clone(),
        )),
        match_threshold: config.match_threshold,
    };

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    tracing::info!(addr = %config.bind_address, "comandad listening");
    axum::serve(listener, app).await?;

    Ok(())
}
