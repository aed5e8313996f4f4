//! Chat completions relay driver.
//!
//! Forwards a caller-supplied message list to `POST /v1/chat/completions`
//! and extracts the first choice's message content.

use std::time::Duration;

use serde_json::{Value, json};

use super::{UpstreamError, UpstreamSettings, parse_json, status_message};

/// Bound on the single outbound completion call.
const CHAT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(30);

const CHAT_FALLBACK_ERROR: &str = "Failed to generate response";

/// Default sampling temperature when the caller names none.
const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Driver for the chat completions endpoint.
#[derive(Clone)]
pub struct ChatDriver {
    http: reqwest::Client,
    settings: UpstreamSettings,
}

impl std::fmt::Debug for ChatDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatDriver")
            .field("settings", &self.settings)
            .finish()
    }
}

impl ChatDriver {
    /// Create a new chat relay driver with the given settings.
    #[must_use]
    pub fn new(settings: UpstreamSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    /// Relay `messages` to the upstream model and return the assistant text.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Transport`] when the upstream is
    /// unreachable, [`UpstreamError::Status`] when it answers with a
    /// non-success status, and [`UpstreamError::Contract`] when a success
    /// response carries no assistant content.
    pub async fn complete(
        &self,
        messages: &[Value],
        temperature: Option<Value>,
    ) -> Result<String, UpstreamError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );

        let body = json!({
            "model": self.settings.model,
            "messages": messages,
            "temperature": temperature.unwrap_or_else(|| json!(DEFAULT_TEMPERATURE)),
        });

        let mut rb = self.http.post(&url).timeout(CHAT_COMPLETION_TIMEOUT).json(&body);
        if let Some(key) = &self.settings.chat_api_key {
            rb = rb.bearer_auth(key);
        }

        let resp = rb
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(format!("Failed to reach model API: {e}")))?;

        let status = resp.status();
        let payload = parse_json(resp).await;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status,
                message: status_message(status, &payload, CHAT_FALLBACK_ERROR),
            });
        }

        let content = payload
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());

        match content {
            Some(content) => Ok(content.to_string()),
            None => Err(UpstreamError::Contract(
                "Missing assistant content in response",
            )),
        }
    }
}
