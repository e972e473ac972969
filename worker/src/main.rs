use anyhow::Result;
use crates::infra::db::postgres::postgres_connection;
use std::sync::Arc;
use tracing::{error, info};
use worker::{axum_http, config};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.pool_max_size,
    )?;
    info!("Postgres connection has been established");

    axum_http::http_serve::start(dotenvy_env, Arc::new(postgres_pool)).await
}
