//! Ferry HTTP gateway binary.

use anyhow::{Context, Result};
use clap::Parser;
use ferry_core::config::GatewayConfig;
use ferry_gateway::{AppState, create_router};
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Ferry gateway - REST front end for the file relay service
#[derive(Parser, Debug)]
#[command(name = "ferry-gateway")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "FERRY_GATEWAY_CONFIG",
        default_value = "config/gateway.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Ferry gateway v{}", env!("CARGO_PKG_VERSION"));

    // File is optional; env vars can provide or override everything
    let mut figment = Figment::new();
    if std::path::Path::new(&args.config).exists() {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let config: GatewayConfig = figment
        .merge(Env::prefixed("FERRY_GATEWAY_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    tracing::info!(
        file_service = %config.file_service_url,
        auth_service = %config.auth_service_url,
        "Connecting to upstream services"
    );
    // Lazy channels: upstreams may come up after the gateway does
    let state = AppState::connect_lazy(config.clone()).context("invalid upstream URL")?;

    let addr: SocketAddr = config.bind.parse().context("invalid bind address")?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;
    axum::serve(listener, create_router(state))
        .await
        .context("HTTP server failed")?;

    Ok(())
}
