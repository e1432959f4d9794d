mod app;
mod auth;
mod config;
mod error;
mod gemini;
mod pages;
mod state;

use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "gemchat=debug,axum=info,tower_http=info".to_string());
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

    let app_state = state::AppState::init().await?;

    sqlx::migrate!("./migrations")
        .run(&app_state.db)
        .await
        .context("run database migrations")?;

    if app_state.config.gemini.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY is not set; /api/gemini will answer 500 until it is");
    }
    if !app_state.config.auth_enabled {
        tracing::warn!("AUTH_ENABLED=false; serving the main page and proxy without a login");
    }

    let app = app::build_app(app_state);
    app::serve(app).await
}
