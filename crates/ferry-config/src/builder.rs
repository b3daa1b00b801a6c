//! Configuration builder

use crate::types::{Config, RetryConfig};
use ferry_core::Capability;
use serde_json::Value;
use std::time::Duration;

/// Builder for constructing configuration programmatically
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind retry budget
    pub fn rebind_timeout(mut self, timeout: Duration) -> Self {
        self.config.core.rebind_timeout = Some(timeout);
        self
    }

    /// Set backoff settings
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.core.retry = retry;
        self
    }

    /// Set the shutdown grace period
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.core.shutdown_timeout = timeout;
        self
    }

    /// Append a plugin entry to a role
    pub fn entry(mut self, capability: Capability, entry: Value) -> Self {
        self.config.role_mut(capability).push(entry);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> ferry_core::Result<Config> {
        crate::validator::validate_config(&self.config)?;
        Ok(self.config)
    }
}
