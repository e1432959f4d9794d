use reqwest::{header::CONTENT_TYPE, Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Request payload for the `generateContent` endpoint. Only the chat shape
/// the proxy forwards is modelled; the response is relayed untouched, so it
/// stays a `serde_json::Value`.
#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
pub struct Part {
    pub text: String,
}

impl GenerateContentRequest {
    /// Wraps a prompt as a single user-role message.
    pub fn from_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                role: "user".into(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        }
    }
}

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("request to generative API failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generative API returned {status}: {body}")]
    Status { status: StatusCode, body: String },
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    /// Issues a single `generateContent` call and returns the upstream JSON
    /// body verbatim. No retries; transport timeouts are the client
    /// defaults.
    pub async fn generate_content(
        &self,
        api_key: &str,
        request: &GenerateContentRequest,
    ) -> Result<Value, GeminiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, "calling generative API");

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Status { status, body });
        }

        Ok(response.json::<Value>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_wraps_as_single_user_message() {
        let request = GenerateContentRequest::from_prompt("hello");
        let json = serde_json::to_value(&request).expect("serialize request");
        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{"role": "user", "parts": [{"text": "hello"}]}]
            })
        );
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_transport_error() {
        // Port 9 (discard) is not listening; the call must fail before any
        // status handling.
        let client = GeminiClient::new("http://127.0.0.1:9", "gemini-2.0-flash");
        let request = GenerateContentRequest::from_prompt("hello");
        let err = client
            .generate_content("test-key", &request)
            .await
            .expect_err("connection should be refused");
        assert!(matches!(err, GeminiError::Transport(_)));
    }
}
