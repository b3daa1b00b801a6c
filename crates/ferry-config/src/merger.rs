//! Configuration file merging
//!
//! Supports loading and merging multiple configuration files.
//! Later files override earlier files, allowing for layered configuration:
//! - base.yaml (shared outputs)
//! - host.yaml (host-specific inputs)

use crate::types::{Config, CoreConfig};
use ferry_core::Result;
use serde_json::Value;

/// Merge multiple configurations together
///
/// A later `core` section replaces an earlier one unless it is entirely
/// default. Role entry lists are concatenated in file order.
pub fn merge_configs(configs: Vec<Config>) -> Result<Config> {
    let mut configs = configs.into_iter();

    let Some(mut result) = configs.next() else {
        return Err(ferry_core::Error::Config(
            "No configurations to merge".to_string(),
        ));
    };

    for config in configs {
        result = merge_two_configs(result, config);
    }

    Ok(result)
}

fn merge_two_configs(mut base: Config, overlay: Config) -> Config {
    if overlay.core != CoreConfig::default() {
        base.core = overlay.core;
    }

    base.input = merge_entries(base.input, overlay.input);
    base.output = merge_entries(base.output, overlay.output);
    base.tunnel = merge_entries(base.tunnel, overlay.tunnel);

    base
}

fn merge_entries(base: Option<Vec<Value>>, overlay: Option<Vec<Value>>) -> Option<Vec<Value>> {
    match (base, overlay) {
        (Some(mut base), Some(overlay)) => {
            base.extend(overlay);
            Some(base)
        }
        (base, None) => base,
        (None, overlay) => overlay,
    }
}
