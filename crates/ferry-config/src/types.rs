//! Configuration types

use ferry_core::Capability;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Main configuration
///
/// Role sections are kept as raw JSON values so that a malformed entry is
/// reported against its own index instead of failing the whole document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Daemon-wide settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Input plugin entries
    #[serde(default)]
    pub input: Option<Vec<Value>>,

    /// Output plugin entries
    #[serde(default)]
    pub output: Option<Vec<Value>>,

    /// Tunnel plugin entries
    #[serde(default)]
    pub tunnel: Option<Vec<Value>>,
}

impl Config {
    /// Entries configured for a role, if the section is present
    pub fn role(&self, capability: Capability) -> Option<&[Value]> {
        match capability {
            Capability::Input => self.input.as_deref(),
            Capability::Output => self.output.as_deref(),
            Capability::Tunnel => self.tunnel.as_deref(),
        }
    }

    /// Mutable access to a role's entry list, creating it when absent
    pub fn role_mut(&mut self, capability: Capability) -> &mut Vec<Value> {
        let slot = match capability {
            Capability::Input => &mut self.input,
            Capability::Output => &mut self.output,
            Capability::Tunnel => &mut self.tunnel,
        };
        slot.get_or_insert_with(Vec::new)
    }

    /// Total number of plugin entries across all roles
    pub fn entry_count(&self) -> usize {
        Capability::ALL
            .iter()
            .map(|c| self.role(*c).map_or(0, <[Value]>::len))
            .sum()
    }
}

/// Daemon-wide settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoreConfig {
    /// Give up binding a listener after this long (unset = retry forever)
    #[serde(default, with = "humantime_serde")]
    pub rebind_timeout: Option<Duration>,

    /// Backoff between bind attempts
    #[serde(default)]
    pub retry: RetryConfig,

    /// How long to wait for listeners to close on shutdown
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            rebind_timeout: None,
            retry: RetryConfig::default(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Exponential backoff settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay after the first failed attempt
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Upper bound for any single delay
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,

    /// Growth factor applied after each failure
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}
