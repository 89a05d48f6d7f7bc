//! Shellhub Daemon
//!
//! Background process that keeps an index of asset administration shells
//! in sync with their sources and serves it over a Unix socket.

mod daemon;
mod handler;
mod signals;

use anyhow::Result;
use shellhub_core::DaemonConfig;
use tracing_subscriber::EnvFilter;

pub use daemon::Daemon;

/// Run the daemon
pub async fn run(config: DaemonConfig) -> Result<()> {
    let daemon = Daemon::new(config)?;
    daemon.run().await
}

fn main() -> Result<()> {
    let config = match std::env::var_os("SHELLHUB_CONFIG") {
        Some(path) => DaemonConfig::load_from(path.as_ref())?,
        None => DaemonConfig::load(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting Shellhub daemon v{}", env!("CARGO_PKG_VERSION"));

    // Run async runtime
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}
