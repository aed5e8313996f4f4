//! ChatKit Session Proxy Server
//!
//! Entry point: loads environment and configuration, then serves the proxy.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use dotenvy::dotenv;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use chatkit_session_proxy::config::{AppConfig, load_upstream_settings};
use chatkit_session_proxy::server;

#[tokio::main]
async fn main() {
    // Initialize tracing (M-LOG-STRUCTURED)
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // Load .env then .env.local; values already in the process env win.
    let _ = dotenv();
    let _ = dotenvy::from_filename(".env.local");

    let config = match AppConfig::load() {
        Ok(config) => Arc::new(config),
        Err(msg) => {
            eprintln!("Configuration error: {msg}");
            std::process::exit(1);
        }
    };

    let settings = load_upstream_settings();

    if let Err(err) = server::start_server(config, settings).await {
        eprintln!("Server error: {err:?}");
        std::process::exit(1);
    }
}
