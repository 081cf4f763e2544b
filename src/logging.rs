//! Logging setup for binaries and tests embedding tabscrub.
//!
//! The library itself only emits records through the `log` facade: `debug` for per-operation
//! counts, `warn` when an operation surfaces anomalies. Nothing is printed unless the host
//! installs a logger, which [`init`] does with `env_logger`.
//!
//! ```no_run
//! tabscrub::logging::init().expect("Failed to initialize logging");
//! log::info!("cleaning started");
//! ```

use anyhow::{Context as _, Result};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info";

/// Install `env_logger`, defaulting to `info` and honouring `RUST_LOG` overrides.
///
/// # Errors
///
/// Returns error if a global logger has already been installed.
pub fn init() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_FILTER))
        .format_timestamp_millis()
        .try_init()
        .context("Failed to install env_logger")?;

    log::debug!("Logging initialized with default filter '{DEFAULT_FILTER}'");
    Ok(())
}

/// Test-friendly logger: output goes through the test harness capture and repeated calls are
/// ignored.
pub fn init_for_tests() {
    env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_for_tests_is_idempotent() {
        init_for_tests();
        init_for_tests();
        log::debug!("still fine after two inits");
    }

    #[test]
    fn test_init_after_test_logger_reports_error() {
        init_for_tests();
        assert!(init().is_err(), "second global logger must be refused");
    }
}
