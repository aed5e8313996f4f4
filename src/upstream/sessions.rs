//! ChatKit session-creation driver.
//!
//! Exchanges a target id and a per-browser user id for a short-lived client
//! secret via `POST /v1/chatkit/sessions`.

use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value, json};

use super::{UpstreamError, UpstreamSettings, parse_json, status_message};

/// Beta-feature header required by the ChatKit session endpoint.
const CHATKIT_BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "chatkit_beta=v1");

/// Bound on the single outbound session-creation call.
const SESSION_CREATE_TIMEOUT: Duration = Duration::from_secs(10);

const SESSION_CREATE_FALLBACK_ERROR: &str = "Failed to create session";

/// A client secret issued by the upstream, relayed verbatim to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct SessionCreated {
    /// Short-lived credential the browser uses to open its own session.
    pub client_secret: String,
    /// Optional expiry hint, passed through untouched.
    pub expires_after: Option<Value>,
}

/// Driver for the ChatKit session-creation endpoint.
#[derive(Clone)]
pub struct SessionsDriver {
    http: reqwest::Client,
    settings: UpstreamSettings,
}

impl std::fmt::Debug for SessionsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionsDriver")
            .field("settings", &self.settings)
            .finish()
    }
}

impl SessionsDriver {
    /// Create a new sessions driver with the given settings.
    #[must_use]
    pub fn new(settings: UpstreamSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    /// Create an upstream session for `target_id` on behalf of `user`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError::Transport`] when the upstream is
    /// unreachable, [`UpstreamError::Status`] when it answers with a
    /// non-success status, and [`UpstreamError::Contract`] when a success
    /// response carries no client secret.
    pub async fn create(
        &self,
        target_id: &str,
        user: &str,
    ) -> Result<SessionCreated, UpstreamError> {
        let url = format!(
            "{}/v1/chatkit/sessions",
            self.settings.base_url.trim_end_matches('/')
        );

        let mut body = Map::new();
        body.insert(
            self.settings.target.nested_key().to_string(),
            json!({ "id": target_id }),
        );
        body.insert("user".to_string(), Value::String(user.to_string()));

        let mut rb = self
            .http
            .post(&url)
            .timeout(SESSION_CREATE_TIMEOUT)
            .header(CHATKIT_BETA_HEADER.0, CHATKIT_BETA_HEADER.1)
            .json(&Value::Object(body));
        if let Some(key) = &self.settings.api_key {
            rb = rb.bearer_auth(key);
        }

        let resp = rb
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(format!("Failed to reach ChatKit API: {e}")))?;

        let status = resp.status();
        let payload = parse_json(resp).await;

        if !status.is_success() {
            return Err(UpstreamError::Status {
                status,
                message: status_message(status, &payload, SESSION_CREATE_FALLBACK_ERROR),
            });
        }

        // Absent and empty client secrets are the same failure.
        let client_secret = payload
            .get("client_secret")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        let Some(client_secret) = client_secret else {
            return Err(UpstreamError::Contract("Missing client secret in response"));
        };

        let expires_after = payload
            .get("expires_after")
            .filter(|v| !v.is_null())
            .cloned();

        Ok(SessionCreated {
            client_secret: client_secret.to_string(),
            expires_after,
        })
    }
}
