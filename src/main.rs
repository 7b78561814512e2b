// src/main.rs - Server entry point

use anyhow::Result;
use health_hub_ai::api::{create_router, AppState};
use health_hub_ai::config::Config;
use health_hub_ai::database::Database;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_with_env()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();

    let db = Arc::new(
        Database::connect(&config.database.url, config.database.max_connections).await?,
    );
    let address = config.get_server_address();
    let state = AppState::build(config, db).await?;

    // Build the knowledge bases up front so the first request does not
    // pay the embedding cost.
    {
        let nutrition_kb = Arc::clone(&state.nutrition_kb);
        let recipe_graph = Arc::clone(&state.recipe_graph);
        let exercise_kb = Arc::clone(&state.exercise_kb);
        tokio::task::spawn_blocking(move || {
            nutrition_kb.ensure_initialized();
            recipe_graph.ensure_initialized();
            exercise_kb.ensure_initialized();
        })
        .await?;
    }

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Health hub server listening on http://{address}");
    axum::serve(listener, app).await?;
    Ok(())
}
