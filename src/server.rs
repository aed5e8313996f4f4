//! HTTP surface of the session proxy.
//!
//! Builds the router, derives the CORS layer from configuration, and hosts
//! the three handlers: health, session creation, and the chat relay. All
//! error branches answer with an `{"error": ...}` JSON envelope; nothing is
//! fatal to the process.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;
use serde_json::{Value, json};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::AppState;
use crate::config::{AppConfig, CorsPolicy};
use crate::session::{SESSION_COOKIE_NAME, resolve_session, session_cookie};
use crate::upstream::{ChatDriver, SessionsDriver, UpstreamSettings};

/// Request body cap; this service only ever receives small JSON bodies.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Start the Axum server with the provided configuration.
///
/// # Errors
///
/// Returns an error when the listener cannot bind or the server fails.
pub async fn start_server(
    config: Arc<AppConfig>,
    settings: UpstreamSettings,
) -> anyhow::Result<()> {
    info!(
        name: "upstream.config.loaded",
        base_url = %settings.base_url,
        target = %settings.target,
        secret_key_configured = settings.api_key.is_some(),
        "Upstream configuration loaded"
    );

    let state = AppState {
        sessions: SessionsDriver::new(settings.clone()),
        chat: ChatDriver::new(settings.clone()),
        upstream: settings,
        config: Arc::clone(&config),
    };

    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(name: "server.started", address = %addr, "Server started");

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the application router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health))
        .route("/api/create-session", post(api_create_session))
        .route("/api/chat", post(api_chat))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Derive the CORS layer from the configured policy.
///
/// Credentialed configurations mirror the request's methods and headers,
/// since wildcards are not allowed together with credentials.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    match config.cors_policy() {
        CorsPolicy::AnyOrigin => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
        CorsPolicy::AllowList(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| {
                    let parsed = origin.parse().ok();
                    if parsed.is_none() {
                        warn!(name: "cors.origin.invalid", origin = %origin, "Ignoring invalid CORS origin");
                    }
                    parsed
                })
                .collect();
            credentialed_cors().allow_origin(origins)
        }
        CorsPolicy::DevLocalhost => credentialed_cors().allow_origin(AllowOrigin::predicate(
            |origin, _| origin.to_str().is_ok_and(is_localhost_origin),
        )),
        // No allow-list in production: emit no CORS headers at all.
        CorsPolicy::Disabled => CorsLayer::new(),
    }
}

fn credentialed_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Matches `http(s)://localhost` and `http(s)://127.0.0.1` on any port.
fn is_localhost_origin(origin: &str) -> bool {
    let Some(rest) = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
    else {
        return false;
    };

    let (host, port) = match rest.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (rest, None),
    };

    let host_ok = host == "localhost" || host == "127.0.0.1";
    let port_ok = port.is_none_or(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    host_ok && port_ok
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /health - Liveness probe.
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /api/create-session - Exchange a target id for a ChatKit client secret.
async fn api_create_session(
    State(state): State<AppState>,
    jar: CookieJar,
    raw: Bytes,
) -> Response {
    if state.upstream.api_key.is_none() {
        return respond_with_cookies(
            error_body("Missing CHATKIT_API_KEY environment variable"),
            StatusCode::INTERNAL_SERVER_ERROR,
            jar,
        );
    }

    let body = read_json_body(&raw);
    let Some(target_id) = resolve_target_id(&body, &state.upstream) else {
        return respond_with_cookies(
            error_body(state.upstream.target.missing_id_error()),
            StatusCode::BAD_REQUEST,
            jar,
        );
    };

    let existing = jar.get(SESSION_COOKIE_NAME).map(|c| c.value().to_string());
    let session = resolve_session(existing.as_deref());

    // From here on every branch answers with the cookie when one was minted,
    // so a retry after an upstream failure reuses the same identity.
    let jar = if session.newly_generated {
        jar.add(session_cookie(&session.id, state.config.runtime.production()))
    } else {
        jar
    };

    match state.sessions.create(&target_id, &session.id).await {
        Ok(created) => {
            info!(
                name: "session.created",
                target = %target_id,
                user = %session.id,
                "ChatKit session created"
            );
            respond_with_cookies(created, StatusCode::OK, jar)
        }
        Err(err) => {
            warn!(
                name: "session.create_failed",
                target = %target_id,
                error = %err,
                "ChatKit session creation failed"
            );
            respond_with_cookies(error_body(&err.to_string()), err.status_code(), jar)
        }
    }
}

/// POST /api/chat - Relay a chat completion with the server-side key.
async fn api_chat(State(state): State<AppState>, raw: Bytes) -> Response {
    if state.upstream.chat_api_key.is_none() {
        return respond(
            error_body("Missing CHATKIT_API_KEY (or OPENAI_API_KEY) environment variable"),
            StatusCode::INTERNAL_SERVER_ERROR,
        );
    }

    let body = read_json_body(&raw);
    let Some(messages) = body.get("messages").and_then(Value::as_array) else {
        return respond(error_body("Missing messages"), StatusCode::BAD_REQUEST);
    };
    let temperature = body.get("temperature").cloned();

    match state.chat.complete(messages, temperature).await {
        Ok(content) => respond(json!({ "content": content }), StatusCode::OK),
        Err(err) => {
            warn!(name: "chat.relay_failed", error = %err, "Chat relay failed");
            respond(error_body(&err.to_string()), err.status_code())
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn respond<T: Serialize>(payload: T, status: StatusCode) -> Response {
    (status, Json(payload)).into_response()
}

fn respond_with_cookies<T: Serialize>(payload: T, status: StatusCode, jar: CookieJar) -> Response {
    (status, jar, Json(payload)).into_response()
}

fn error_body(message: &str) -> Value {
    json!({ "error": message })
}

/// Parse the request body as a JSON object; absent or malformed bodies
/// count as an empty object.
fn read_json_body(raw: &[u8]) -> Value {
    if raw.is_empty() {
        return json!({});
    }
    match serde_json::from_slice::<Value>(raw) {
        Ok(body @ Value::Object(_)) => body,
        _ => json!({}),
    }
}

/// Resolve the target id: nested body field, then flat body field, then the
/// configured default. The winning candidate must trim to a non-empty string.
fn resolve_target_id(body: &Value, settings: &UpstreamSettings) -> Option<String> {
    let target = settings.target;
    let nested = body
        .get(target.nested_key())
        .and_then(|v| v.get("id"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());
    let flat = body
        .get(target.flat_key())
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty());

    nested
        .or(flat)
        .or(settings.default_target_id.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
