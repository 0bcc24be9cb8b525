mod error;
mod handlers;
mod state;
mod telemetry;

use std::sync::Arc;

use recast_core::AppConfig;
use recast_db::{PgCheckpointStore, PgRunStore};
use recast_engine::{ContentPipeline, ProgressHub, ProgressTokenIssuer, RetryPolicy};
use recast_providers::{SpeechApiClient, StructuredCompletionClient};
use recast_tasks::default_tasks;

use state::AppState;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    telemetry::init(&config.environment);

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    // Explicitly constructed, injected client handles — lifecycle owned
    // here, not by module-load side effects.
    let transcriber = Arc::new(SpeechApiClient::new(
        config.speech_api_base_url.clone(),
        config.speech_api_key.clone(),
    )?);
    let completion = Arc::new(StructuredCompletionClient::new(
        config.completion_api_base_url.clone(),
        config.completion_api_key.clone(),
        config.completion_model.clone(),
    )?);

    let runs = Arc::new(PgRunStore::new(pool.clone()));
    let checkpoints = Arc::new(PgCheckpointStore::new(pool.clone()));
    let progress = Arc::new(ProgressHub::default());
    let tokens = Arc::new(ProgressTokenIssuer::new(
        config.progress_token_secret.as_bytes(),
        config.progress_token_ttl_secs,
    ));

    let pipeline = Arc::new(ContentPipeline::new(
        runs.clone(),
        checkpoints,
        transcriber,
        default_tasks(completion),
        progress.clone(),
        RetryPolicy::new(config.step_max_attempts),
    ));

    let state = AppState {
        runs,
        pipeline,
        progress,
        tokens,
        service_api_key: config.service_api_key.clone(),
    };

    let app = handlers::router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, environment = %config.environment, "Recast API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
