//! Log setup for the binaries.
//!
//! The libraries log through the `log` facade; `tracing_log::LogTracer`
//! forwards those records to a `tracing-subscriber` formatter on stderr.
//! `RUST_LOG` wins over `--log-level` when set.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Filter directives for a base level.
///
/// # Errors
///
/// Returns an error if `level` is not a valid directive.
pub fn env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return Ok(from_env);
    }
    EnvFilter::try_new(level).map_err(|e| anyhow!("Invalid log level '{level}': {e}"))
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns an error if `level` is invalid or a logger is already installed.
pub fn init(level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level)?)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("Failed to install log subscriber: {e}"))?;
    tracing_log::LogTracer::init().map_err(|e| anyhow!("Failed to bridge log records: {e}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn level_directives() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(env_filter("debug").is_ok());
        assert!(env_filter("dms_compiler=trace,warn").is_ok());
        assert!(env_filter("dms_compiler=loud").is_err());
    }
}
