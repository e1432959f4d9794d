use anyhow::{bail, Context};
use serde::Deserialize;

/// Minimum length for `SECRET_KEY`; the session signing key needs 64 bytes
/// of material. Startup fails without a real key, there is no fallback
/// literal.
pub const MIN_SECRET_KEY_BYTES: usize = 64;

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    /// A missing key is tolerated at startup and reported per request by
    /// the proxy route.
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub secret_key: String,
    /// `false` serves the main page and the proxy route without a login.
    pub auth_enabled: bool,
    pub gemini: GeminiConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let secret_key =
            std::env::var("SECRET_KEY").context("SECRET_KEY must be set to sign session cookies")?;
        if secret_key.len() < MIN_SECRET_KEY_BYTES {
            bail!(
                "SECRET_KEY must be at least {MIN_SECRET_KEY_BYTES} bytes, got {}",
                secret_key.len()
            );
        }

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:gemchat.db".into());
        let auth_enabled = std::env::var("AUTH_ENABLED")
            .map(|v| !matches!(v.as_str(), "false" | "0"))
            .unwrap_or(true);

        let gemini = GeminiConfig {
            api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
            model: std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.0-flash".into()),
            base_url: std::env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into()),
        };

        Ok(Self {
            database_url,
            secret_key,
            auth_enabled,
            gemini,
        })
    }
}
