use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::AppConfig;
use crate::gemini::client::GeminiClient;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub gemini: GeminiClient,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let options = SqliteConnectOptions::from_str(&config.database_url)
            .context("parse DATABASE_URL")?
            .create_if_missing(true);
        let db = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("connect to database")?;

        let gemini = GeminiClient::new(&config.gemini.base_url, &config.gemini.model);

        Ok(Self { db, config, gemini })
    }
}

#[cfg(test)]
impl AppState {
    /// State over a fresh in-memory database. The Gemini base URL points at
    /// an unroutable port so any unexpected upstream call fails loudly.
    pub(crate) async fn for_tests(auth_enabled: bool, gemini_api_key: Option<String>) -> Self {
        Self::for_tests_with_upstream(auth_enabled, gemini_api_key, "http://127.0.0.1:9").await
    }

    pub(crate) async fn for_tests_with_upstream(
        auth_enabled: bool,
        gemini_api_key: Option<String>,
        gemini_base_url: &str,
    ) -> Self {
        use crate::config::GeminiConfig;

        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory database");
        sqlx::migrate!("./migrations")
            .run(&db)
            .await
            .expect("run migrations");

        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            secret_key: "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef".into(),
            auth_enabled,
            gemini: GeminiConfig {
                api_key: gemini_api_key,
                model: "gemini-2.0-flash".into(),
                base_url: gemini_base_url.into(),
            },
        });
        let gemini = GeminiClient::new(&config.gemini.base_url, &config.gemini.model);

        Self { db, config, gemini }
    }
}
