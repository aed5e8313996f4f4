//! Process configuration.
//!
//! Two layers, loaded once at startup and passed into the server by
//! reference: [`AppConfig`] covers the HTTP surface (binding, CORS, runtime
//! environment) and is built through defaults, CLI flags, and environment
//! overrides; [`load_upstream_settings`] reads the flat environment
//! variables naming the upstream API and its credentials. Handlers never
//! read ambient environment state.

use clap::Parser;
use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::env;

use crate::upstream::{TargetField, UpstreamSettings};

/// Upstream base URL used when no override is configured.
pub const DEFAULT_CHATKIT_API_BASE: &str = "https://api.mtda.cloud/api/ai";

/// Model used by the chat relay when no override is configured.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Host address to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub runtime: RuntimeConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// Deployment environment name (`production` enables the locked-down
    /// CORS default and the `Secure` cookie attribute).
    pub environment: String,
}

impl RuntimeConfig {
    #[must_use]
    pub fn production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    /// Raw `CORS_ALLOW_ORIGINS` value; empty means unset.
    pub allow_origins: String,
}

/// Effective CORS posture derived from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    /// `CORS_ALLOW_ORIGINS=*`: any origin, no credentials.
    AnyOrigin,
    /// Explicit comma-separated allow-list, with credentials.
    AllowList(Vec<String>),
    /// Development default: localhost/127.0.0.1 on any port, with credentials.
    DevLocalhost,
    /// Production default with no allow-list configured: no cross-origin access.
    Disabled,
}

impl AppConfig {
    /// Load configuration from process arguments and environment.
    ///
    /// # Errors
    ///
    /// Returns an error when CLI parsing or value deserialization fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_args(env::args())
    }

    /// Load configuration from explicit arguments (testable entry point).
    ///
    /// Priority: CLI flag / CLI env var > named env overrides > `PROXY_`
    /// prefixed env vars > defaults.
    ///
    /// # Errors
    ///
    /// Returns an error when CLI parsing or value deserialization fails.
    pub fn load_from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder();

        builder = builder
            .set_default("server.port", 8000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("runtime.environment", "development")?
            .set_default("cors.allow_origins", "")?;

        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }

        // ENVIRONMENT wins over NODE_ENV; empty values count as unset.
        let environment = env::var("ENVIRONMENT")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| env::var("NODE_ENV").ok().filter(|v| !v.trim().is_empty()));
        if let Some(val) = environment {
            builder = builder.set_override("runtime.environment", val.to_lowercase())?;
        }

        if let Ok(val) = env::var("CORS_ALLOW_ORIGINS") {
            builder = builder.set_override("cors.allow_origins", val)?;
        }

        // Generic prefixed overrides, e.g. PROXY_SERVER__PORT=8080.
        builder = builder.add_source(
            Environment::with_prefix("PROXY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }

    /// Derive the CORS posture from the raw allow-origins value and the
    /// runtime environment.
    #[must_use]
    pub fn cors_policy(&self) -> CorsPolicy {
        let raw = self.cors.allow_origins.trim();
        if !raw.is_empty() {
            if raw == "*" {
                return CorsPolicy::AnyOrigin;
            }
            let origins = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            return CorsPolicy::AllowList(origins);
        }

        if self.runtime.production() {
            CorsPolicy::Disabled
        } else {
            CorsPolicy::DevLocalhost
        }
    }
}

/// Load upstream API settings from the environment.
///
/// A missing secret key is kept as `None` rather than failing startup; the
/// handlers surface it as a per-request configuration error.
#[must_use]
pub fn load_upstream_settings() -> UpstreamSettings {
    let api_key = non_empty_env("CHATKIT_API_KEY");
    let chat_api_key = api_key.clone().or_else(|| non_empty_env("OPENAI_API_KEY"));

    let base_url = non_empty_env("CHATKIT_API_BASE")
        .or_else(|| non_empty_env("VITE_CHATKIT_API_BASE"))
        .unwrap_or_else(|| DEFAULT_CHATKIT_API_BASE.to_string());

    let target = match non_empty_env("CHATKIT_TARGET")
        .map(|v| v.to_lowercase())
        .as_deref()
    {
        Some("workflow") => TargetField::Workflow,
        _ => TargetField::Assistant,
    };

    let default_target_id = match target {
        TargetField::Assistant => non_empty_env("CHATKIT_ASSISTANT_ID")
            .or_else(|| non_empty_env("VITE_CHATKIT_ASSISTANT_ID")),
        TargetField::Workflow => non_empty_env("CHATKIT_WORKFLOW_ID")
            .or_else(|| non_empty_env("VITE_CHATKIT_WORKFLOW_ID")),
    };

    let model = non_empty_env("CHAT_MODEL")
        .or_else(|| non_empty_env("OPENAI_MODEL"))
        .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());

    UpstreamSettings {
        api_key,
        chat_api_key,
        base_url,
        target,
        default_target_id,
        model,
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
