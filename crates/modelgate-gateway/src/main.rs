//! Model-integration gateway — entry point.
//!
//! Reads configuration from a JSON file plus environment overrides and
//! starts the axum-based HTTP service.
//!
//! # Environment variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MODELGATE_CONFIG` | *(none)* | Path to a JSON [`GatewayConfig`] file. |
//! | `MODELGATE_PORT` | `8080` | TCP port to listen on (overrides the file). |
//! | `MODELGATE_API_KEYS` | *(none)* | Comma-separated gateway API keys. |
//! | `MODELGATE_VECTOR_STORE_URL` | `http://127.0.0.1:6333` | Vector store base URL. |

use modelgate_core::GatewayConfig;
use modelgate_gateway::GatewayServer;
use tracing_subscriber::EnvFilter;

fn load_config() -> Result<GatewayConfig, String> {
    let mut config = match std::env::var("MODELGATE_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| format!("failed to read config file '{path}': {e}"))?;
            serde_json::from_str(&raw)
                .map_err(|e| format!("failed to parse config file '{path}': {e}"))?
        }
        Err(_) => GatewayConfig::default(),
    };

    if let Some(port) = std::env::var("MODELGATE_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        config.port = port;
    }
    if let Ok(keys) = std::env::var("MODELGATE_API_KEYS") {
        config.api_keys = keys
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
            .collect();
    }
    if let Ok(url) = std::env::var("MODELGATE_VECTOR_STORE_URL") {
        config.vector_store_url = url;
    }

    Ok(config)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("modelgate_gateway=info,modelgate_core=info")),
        )
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = GatewayServer::new(config).start().await {
        eprintln!("gateway error: {err}");
        std::process::exit(1);
    }
}
