//! ChatKit Session Proxy
//!
//! A small backend that exchanges a workflow/assistant id for a short-lived
//! ChatKit client secret, so the browser never sees the long-lived API key.
//! The server holds the real secret and mints scoped credentials per browser
//! session, tracked via an opaque cookie.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP server with CORS and request tracing
//! - **Upstream**: Thin reqwest drivers for the ChatKit session endpoint and
//!   the chat completions relay
//! - **Session identity**: Cookie-carried opaque id, resolved by a pure
//!   function with no server-side state
//!
//! # Modules
//!
//! - [`config`]: Process configuration and upstream settings loading
//! - [`session`]: Session identity resolution and cookie construction
//! - [`server`]: Router, middleware, and HTTP handlers
//! - [`upstream`]: Upstream API drivers and error normalization

#![allow(clippy::unused_async)]

pub mod config;
pub mod server;
pub mod session;
pub mod upstream;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::upstream::{ChatDriver, SessionsDriver, UpstreamSettings};

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Global configuration.
    pub config: Arc<AppConfig>,
    /// Upstream connection settings.
    pub upstream: UpstreamSettings,
    /// Driver for the ChatKit session-creation endpoint.
    pub sessions: SessionsDriver,
    /// Driver for the chat completions relay.
    pub chat: ChatDriver,
}
