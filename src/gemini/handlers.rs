use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::{error::ApiError, gemini::client::GenerateContentRequest, state::AppState};

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// POST /api/gemini — relays a prompt to the generative API.
///
/// Order matters: the server key check and the prompt check both return
/// before any upstream connection is attempted.
#[instrument(skip(state, payload))]
pub async fn generate(
    State(state): State<AppState>,
    Json(payload): Json<PromptRequest>,
) -> Result<Json<Value>, ApiError> {
    let Some(api_key) = state.config.gemini.api_key.as_deref() else {
        return Err(ApiError::Configuration(
            "Gemini API key is not configured.",
        ));
    };

    let prompt = payload
        .prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::Validation("No prompt provided.".into()))?;

    let request = GenerateContentRequest::from_prompt(prompt);
    let body = state.gemini.generate_content(api_key, &request).await?;

    info!(prompt_chars = prompt.len(), "prompt relayed");
    Ok(Json(body))
}
