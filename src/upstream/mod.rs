//! Upstream API drivers.
//!
//! This module provides thin clients for the two upstream endpoints the
//! proxy fronts: the ChatKit session-creation endpoint and the chat
//! completions endpoint.
//!
//! # Overview
//!
//! Each driver owns a [`reqwest::Client`] and a copy of the
//! [`UpstreamSettings`], issues exactly one bounded request per call, and
//! normalizes the heterogeneous upstream error shapes into
//! [`UpstreamError`].
//!
//! # Drivers
//!
//! - [`SessionsDriver`]: ChatKit session creation (`/v1/chatkit/sessions`)
//! - [`ChatDriver`]: chat completions relay (`/v1/chat/completions`)

pub mod chat;
pub mod sessions;

pub use chat::ChatDriver;
pub use sessions::{SessionCreated, SessionsDriver};

use reqwest::StatusCode;
use serde_json::Value;

/// Upstream connection and target settings.
#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    /// Secret key for the ChatKit session endpoint; `None` when unconfigured.
    pub api_key: Option<String>,
    /// Secret key for the chat relay (falls back to `OPENAI_API_KEY`).
    pub chat_api_key: Option<String>,
    /// Base URL for the upstream API.
    pub base_url: String,
    /// Which target field shape the session endpoint expects.
    pub target: TargetField,
    /// Default target id used when the request body names none.
    pub default_target_id: Option<String>,
    /// Model identifier for the chat relay.
    pub model: String,
}

/// The target field shape of the session-creation request.
///
/// The two deployment variants of this proxy differ only in whether the
/// upstream configuration is addressed as an assistant or a workflow; the
/// handler is parameterized over this choice instead of duplicating the
/// code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetField {
    /// `{"assistant": {"id": ...}}` / `assistantId`
    #[default]
    Assistant,
    /// `{"workflow": {"id": ...}}` / `workflowId`
    Workflow,
}

impl TargetField {
    /// Key of the nested object form in request and upstream bodies.
    #[must_use]
    pub fn nested_key(self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::Workflow => "workflow",
        }
    }

    /// Key of the flat form in request bodies.
    #[must_use]
    pub fn flat_key(self) -> &'static str {
        match self {
            Self::Assistant => "assistantId",
            Self::Workflow => "workflowId",
        }
    }

    /// Client error message when no id resolves.
    #[must_use]
    pub fn missing_id_error(self) -> &'static str {
        match self {
            Self::Assistant => "Missing assistant id",
            Self::Workflow => "Missing workflow id",
        }
    }
}

impl std::fmt::Display for TargetField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.nested_key())
    }
}

/// Normalized upstream failure.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The upstream endpoint could not be reached (DNS, connect, timeout).
    #[error("{0}")]
    Transport(String),
    /// Upstream answered with a non-success status.
    #[error("{message}")]
    Status {
        /// Upstream status, forwarded to the caller.
        status: StatusCode,
        /// Upstream `error` field, reason phrase, or a generic fallback.
        message: String,
    },
    /// Upstream answered successfully but the body is missing a required field.
    #[error("{0}")]
    Contract(&'static str),
}

impl UpstreamError {
    /// HTTP status to surface to the caller.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => *status,
            Self::Transport(_) | Self::Contract(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Decode a response body as a JSON object, treating anything else as empty.
pub(crate) async fn parse_json(resp: reqwest::Response) -> Value {
    match resp.json::<Value>().await {
        Ok(payload @ Value::Object(_)) => payload,
        _ => Value::Object(serde_json::Map::new()),
    }
}

/// Extract a non-empty `error` string from an upstream payload.
pub(crate) fn error_message(payload: &Value) -> Option<String> {
    payload
        .get("error")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Build the message for a non-success upstream status.
pub(crate) fn status_message(status: StatusCode, payload: &Value, fallback: &str) -> String {
    error_message(payload)
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_else(|| fallback.to_string())
}
