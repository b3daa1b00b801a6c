//! Plugin manager

use crate::loader::{resolve, Resolved};
use crate::registry::PluginRegistry;
use crate::traits::SetupContext;
use ferry_config::Config;
use ferry_core::Capability;

/// Roles in setup order; inputs come last so that their listeners start
/// receiving only once outputs and tunnels exist.
const SETUP_ORDER: [Capability; 3] = [Capability::Output, Capability::Tunnel, Capability::Input];

/// Result of setting up every configured role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetupSummary {
    /// Instances whose setup function returned `Ok`
    pub started: usize,
    /// Instances whose setup function failed
    pub failed: usize,
    /// Entries skipped during resolution
    pub skipped: usize,
}

/// Plugin manager
///
/// Owns the registry once activation is done and drives role resolution and
/// setup from a loaded configuration.
#[derive(Debug, Default)]
pub struct PluginManager {
    registry: PluginRegistry,
}

impl PluginManager {
    /// Create a manager over an activated registry
    pub fn new(registry: PluginRegistry) -> Self {
        Self { registry }
    }

    /// Get the plugin registry
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Resolve every role of `config`, in setup order
    pub fn resolve_all(&self, config: &Config) -> Vec<(Capability, Resolved)> {
        SETUP_ORDER
            .into_iter()
            .map(|capability| {
                let resolved = resolve(
                    &self.registry,
                    capability.as_str(),
                    config.role(capability),
                    capability,
                );
                (capability, resolved)
            })
            .collect()
    }

    /// Resolve and set up every configured plugin instance
    ///
    /// A failing setup is logged and counted; it never stops the other
    /// instances. Binds started by an instance report their failures through
    /// the context tagged with that instance's plugin and role.
    pub fn setup_all(&self, config: &Config, ctx: &SetupContext) -> SetupSummary {
        let mut summary = SetupSummary::default();

        for (capability, resolved) in self.resolve_all(config) {
            summary.skipped += resolved.skipped.len();

            for setup in resolved.setups {
                match setup.setup(&ctx.for_instance(setup.name(), capability)) {
                    Ok(()) => {
                        tracing::info!(role = %capability, plugin = %setup.name(), "Plugin set up");
                        summary.started += 1;
                    }
                    Err(e) => {
                        tracing::error!(
                            role = %capability,
                            plugin = %setup.name(),
                            error = %e,
                            "Plugin setup failed"
                        );
                        summary.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            started = summary.started,
            failed = summary.failed,
            skipped = summary.skipped,
            "Plugin setup complete"
        );
        summary
    }
}
