use anyhow::Context;
use imagehost::{app, images, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "imagehost=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;

    sqlx::migrate!("./migrations")
        .run(&app_state.db)
        .await
        .context("run migrations")?;

    // pick up uploads whose enrichment was interrupted by a restart
    let unfinished = images::repo::list_unfinished_ids(&app_state.db).await?;
    if !unfinished.is_empty() {
        tracing::info!(count = unfinished.len(), "re-queueing unfinished images");
    }
    for id in unfinished {
        app_state.metadata_queue.enqueue(id);
    }

    app::serve(app::build_app(app_state)).await
}
