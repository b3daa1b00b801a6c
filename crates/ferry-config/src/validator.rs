//! Configuration validation
//!
//! Only the `core` section is validated here. Plugin entries are checked one
//! by one when plugins are resolved, so a bad entry never rejects the file.

use crate::Config;
use ferry_core::{Error, Result};

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_core(config)?;

    validate_roles(config);

    Ok(())
}

fn validate_core(config: &Config) -> Result<()> {
    let core = &config.core;

    if let Some(timeout) = core.rebind_timeout {
        if timeout.is_zero() {
            return Err(Error::Config("rebind_timeout must be > 0".to_string()));
        }
    }

    if core.retry.initial_delay.is_zero() {
        return Err(Error::Config("retry.initial_delay must be > 0".to_string()));
    }

    if core.retry.max_delay < core.retry.initial_delay {
        return Err(Error::Config(
            "retry.max_delay must be >= retry.initial_delay".to_string(),
        ));
    }

    if core.retry.multiplier.is_nan() || core.retry.multiplier < 1.0 {
        return Err(Error::Config(format!(
            "retry.multiplier must be >= 1.0 (got {})",
            core.retry.multiplier
        )));
    }

    if core.shutdown_timeout.as_secs() > 300 {
        tracing::warn!("shutdown_timeout is very high (>5 minutes)");
    }

    Ok(())
}

fn validate_roles(config: &Config) {
    if config.entry_count() == 0 {
        tracing::warn!("No input, output or tunnel plugins configured");
    }
}
