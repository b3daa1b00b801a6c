//! Plugin registry
//!
//! Plugins are registered as pending descriptors and become usable only
//! after [`PluginRegistry::activate`]. A name is either pending or loaded,
//! never both. The registry is built during startup and only read
//! afterwards.

use crate::traits::{PluginDescriptor, SetupFn};
use ferry_core::{Capability, PluginOption};
use std::collections::{BTreeMap, BTreeSet};

/// A plugin that went through activation
#[derive(Debug, Clone)]
pub struct LoadedPlugin {
    source: String,
    descriptor: PluginDescriptor,
}

impl LoadedPlugin {
    fn new(source: impl Into<String>, descriptor: PluginDescriptor) -> Self {
        Self {
            source: source.into(),
            descriptor,
        }
    }

    /// Plugin name
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    /// Where the plugin was activated from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Human readable description
    pub fn description(&self) -> &str {
        &self.descriptor.description
    }

    /// Declared configuration options
    pub fn options(&self) -> &[PluginOption] {
        &self.descriptor.options
    }

    /// Capabilities the plugin can fulfill
    pub fn capabilities(&self) -> BTreeSet<Capability> {
        self.descriptor.capabilities().into_iter().collect()
    }

    /// Whether the plugin can fulfill `capability`
    pub fn can(&self, capability: Capability) -> bool {
        self.get(capability).is_some()
    }

    /// Setup function for `capability`
    pub fn get(&self, capability: Capability) -> Option<&SetupFn> {
        self.descriptor.handler(capability)
    }
}

/// Registry of pending and loaded plugins
#[derive(Debug, Default)]
pub struct PluginRegistry {
    discovered: BTreeMap<String, PluginDescriptor>,
    loaded: BTreeMap<String, LoadedPlugin>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a pending descriptor
    ///
    /// Slots are not validated here. Re-registering a loaded name moves it
    /// back to pending until the next activation.
    pub fn register(&mut self, descriptor: PluginDescriptor) {
        let name = descriptor.name.clone();

        if self.loaded.remove(&name).is_some() {
            tracing::debug!(plugin = %name, "Replacing loaded plugin");
        }

        tracing::debug!(
            plugin = %name,
            capabilities = ?descriptor.capabilities(),
            "Plugin discovered"
        );
        self.discovered.insert(name, descriptor);
    }

    /// Load every pending descriptor, recording `source` as its origin
    ///
    /// Returns the number of plugins loaded by this call.
    pub fn activate(&mut self, source: &str) -> usize {
        let pending = std::mem::take(&mut self.discovered);
        let count = pending.len();

        for (name, descriptor) in pending {
            tracing::info!(plugin = %name, source = %source, "Plugin loaded");
            self.loaded.insert(name, LoadedPlugin::new(source, descriptor));
        }

        count
    }

    /// Loaded plugin by name
    pub fn lookup(&self, name: &str) -> Option<&LoadedPlugin> {
        self.loaded.get(name)
    }

    /// Capabilities of a loaded plugin
    pub fn capabilities_of(&self, name: &str) -> Option<BTreeSet<Capability>> {
        self.lookup(name).map(LoadedPlugin::capabilities)
    }

    /// Names waiting for activation
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.discovered.keys().map(String::as_str)
    }

    /// Loaded plugins, ordered by name
    pub fn loaded(&self) -> impl Iterator<Item = &LoadedPlugin> {
        self.loaded.values()
    }

    /// Number of loaded plugins
    pub fn count(&self) -> usize {
        self.loaded.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn noop(_: &crate::PluginConfig, _: &crate::SetupContext) -> ferry_core::Result<()> {
        Ok(())
    }

    #[test]
    fn test_registry_new() {
        let registry = PluginRegistry::new();
        assert_eq!(registry.count(), 0);
        assert_eq!(registry.pending().count(), 0);
    }

    #[test]
    fn test_register_is_pending_until_activated() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginDescriptor::new("echo").output(noop));

        assert!(registry.lookup("echo").is_none());
        assert_eq!(registry.pending().collect::<Vec<_>>(), vec!["echo"]);

        assert_eq!(registry.activate("builtin"), 1);
        assert_eq!(registry.pending().count(), 0);

        let echo = registry.lookup("echo").unwrap();
        assert_eq!(echo.source(), "builtin");
        assert!(echo.can(Capability::Output));
        assert!(!echo.can(Capability::Input));
    }

    #[test]
    fn test_activate_twice_is_noop() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginDescriptor::new("echo"));

        assert_eq!(registry.activate("first"), 1);
        assert_eq!(registry.activate("second"), 0);
        assert_eq!(registry.lookup("echo").unwrap().source(), "first");
    }

    #[test]
    fn test_register_overwrites_pending() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginDescriptor::new("echo").input(noop));
        registry.register(PluginDescriptor::new("echo").output(noop));
        registry.activate("builtin");

        assert_eq!(registry.count(), 1);
        assert_eq!(
            registry.capabilities_of("echo"),
            Some(BTreeSet::from([Capability::Output]))
        );
    }

    #[test]
    fn test_reregister_loaded_name_moves_back_to_pending() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginDescriptor::new("echo").input(noop));
        registry.activate("builtin");

        registry.register(PluginDescriptor::new("echo").tunnel(noop));
        assert!(registry.lookup("echo").is_none());
        assert_eq!(registry.pending().count(), 1);

        registry.activate("reload");
        assert_eq!(
            registry.capabilities_of("echo"),
            Some(BTreeSet::from([Capability::Tunnel]))
        );
    }

    #[test]
    fn test_plugin_without_capabilities_is_loaded() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginDescriptor::new("empty"));
        registry.activate("builtin");

        assert_eq!(registry.capabilities_of("empty"), Some(BTreeSet::new()));
        assert_eq!(registry.capabilities_of("missing"), None);
    }

    proptest! {
        #[test]
        fn prop_loaded_names_match_registered(names in proptest::collection::btree_set("[a-z]{1,8}", 0..16)) {
            let mut registry = PluginRegistry::new();
            for name in &names {
                registry.register(PluginDescriptor::new(name.clone()));
            }
            registry.activate("builtin");

            let loaded: BTreeSet<String> = registry.loaded().map(|p| p.name().to_string()).collect();
            prop_assert_eq!(loaded, names);
            prop_assert_eq!(registry.pending().count(), 0);
        }

        #[test]
        fn prop_capabilities_are_exact(input: bool, output: bool, tunnel: bool) {
            let mut descriptor = PluginDescriptor::new("p");
            let mut declared = BTreeSet::new();
            for (wanted, capability) in [(input, Capability::Input), (output, Capability::Output), (tunnel, Capability::Tunnel)] {
                if wanted {
                    descriptor = descriptor.with_handler(capability, std::sync::Arc::new(noop));
                    declared.insert(capability);
                }
            }

            let mut registry = PluginRegistry::new();
            registry.register(descriptor);
            registry.activate("builtin");

            let plugin = registry.lookup("p").unwrap();
            for capability in Capability::ALL {
                prop_assert_eq!(plugin.get(capability).is_some(), declared.contains(&capability));
            }
            prop_assert_eq!(plugin.capabilities(), declared);
        }
    }
}
