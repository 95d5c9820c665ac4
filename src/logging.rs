use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over the configured level.
pub fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}
