//! Role binding
//!
//! Turns the configuration entries of one role into plugin instances. Every
//! entry is checked on its own; a bad entry is reported and skipped, and the
//! remaining entries are still processed.

use crate::registry::PluginRegistry;
use crate::setup::{PluginConfig, PluginSetup};
use ferry_core::Capability;
use serde_json::Value;
use thiserror::Error;

/// Why a configuration entry produced no instance
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    /// Entry is not a mapping or has no `type` key
    #[error("missing type attribute")]
    MissingType,

    /// No loaded plugin has the requested name
    #[error("not an available plugin")]
    UnknownPlugin,

    /// The plugin has no setup function for the requested role
    #[error("not an {0} plugin")]
    WrongCapability(Capability),

    /// A value does not match the type of its declared option
    #[error("invalid option: {0}")]
    InvalidOption(String),
}

/// A configuration entry that was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// 0-based position of the entry in its role list
    pub index: usize,
    /// Plugin named by the entry, if any
    pub plugin: Option<String>,
    /// Why the entry was skipped
    pub reason: SkipReason,
}

/// Outcome of resolving one role
#[derive(Debug, Default)]
pub struct Resolved {
    /// Instances in configuration order
    pub setups: Vec<PluginSetup>,
    /// Entries that produced no instance
    pub skipped: Vec<Skipped>,
}

/// Resolve the entries of one role against the loaded plugins
///
/// `role` only labels diagnostics. An absent entry list resolves to nothing.
pub fn resolve(
    registry: &PluginRegistry,
    role: &str,
    entries: Option<&[Value]>,
    capability: Capability,
) -> Resolved {
    let mut resolved = Resolved::default();

    for (index, entry) in entries.unwrap_or_default().iter().enumerate() {
        match resolve_entry(registry, entry, capability) {
            Ok(setup) => {
                tracing::debug!(role = %role, index, plugin = %setup.name(), "Plugin entry resolved");
                resolved.setups.push(setup);
            }
            Err(skipped) => {
                let skipped = Skipped { index, ..skipped };
                match &skipped.plugin {
                    Some(plugin) => tracing::error!(
                        role = %role,
                        index,
                        plugin = %plugin,
                        "{} plugin #{} ({}): {}",
                        role,
                        index,
                        plugin,
                        skipped.reason
                    ),
                    None => tracing::error!(
                        role = %role,
                        index,
                        "{} plugin #{}: {}",
                        role,
                        index,
                        skipped.reason
                    ),
                }
                resolved.skipped.push(skipped);
            }
        }
    }

    resolved
}

/// Resolve a role and keep only the instances
pub fn load_plugins(
    registry: &PluginRegistry,
    role: &str,
    entries: Option<&[Value]>,
    capability: Capability,
) -> Vec<PluginSetup> {
    resolve(registry, role, entries, capability).setups
}

fn resolve_entry(
    registry: &PluginRegistry,
    entry: &Value,
    capability: Capability,
) -> Result<PluginSetup, Skipped> {
    let skip = |plugin: Option<&str>, reason| Skipped {
        index: 0,
        plugin: plugin.map(str::to_string),
        reason,
    };

    let Value::Object(map) = entry else {
        return Err(skip(None, SkipReason::MissingType));
    };
    // A present but non-string `type` names no plugin
    let name = match map.get("type") {
        None | Some(Value::Null) => return Err(skip(None, SkipReason::MissingType)),
        Some(Value::String(name)) => name.clone(),
        Some(other) => return Err(skip(Some(other.to_string().as_str()), SkipReason::UnknownPlugin)),
    };
    let mut config = PluginConfig::new(map.clone());

    let plugin = registry
        .lookup(&name)
        .ok_or_else(|| skip(Some(name.as_str()), SkipReason::UnknownPlugin))?;

    let setup = plugin
        .get(capability)
        .cloned()
        .ok_or_else(|| skip(Some(name.as_str()), SkipReason::WrongCapability(capability)))?;

    config
        .apply_options(plugin.options(), capability)
        .map_err(|e| skip(Some(name.as_str()), SkipReason::InvalidOption(e.to_string())))?;

    Ok(PluginSetup::new(name, capability, config, setup))
}
