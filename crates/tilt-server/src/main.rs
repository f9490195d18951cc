//! # tilt-relay
//!
//! Orientation relay server.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! tilt-relay
//!
//! # Run with custom config
//! tilt-relay --config /path/to/tilt-relay.toml
//!
//! # Run with environment variables
//! TILT_PORT=8080 TILT_HOST=0.0.0.0 tilt-relay
//! ```

use anyhow::{bail, Result};
use tilt_server::{config::Config, handlers, metrics};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tilt_relay=debug,tilt_server=debug,tilt_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config()?;

    tracing::info!("Starting tilt-relay on {}:{}", config.host, config.port);

    metrics::init_metrics();

    handlers::run_server(config).await?;

    Ok(())
}

fn load_config() -> Result<Config> {
    let mut args = std::env::args().skip(1);
    match (args.next().as_deref(), args.next()) {
        (None, _) => Config::load(),
        (Some("--config"), Some(path)) => Config::from_file(path),
        (Some(arg), _) => bail!("usage: tilt-relay [--config <path>] (got {:?})", arg),
    }
}
