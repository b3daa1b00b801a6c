//! Plugin descriptors and setup functions

use crate::setup::PluginConfig;
use ferry_core::{Capability, PluginOption, Result};
use ferry_protocols::{BindContext, BindOwner};
use std::fmt;
use std::sync::Arc;

/// Setup routine for one capability
///
/// Receives the entry's configuration (with declared defaults applied) and
/// the daemon's setup context. Long-running work such as listeners is
/// spawned onto the context's task tracker; the function itself returns
/// right away.
pub type SetupFn = Arc<dyn Fn(&PluginConfig, &SetupContext) -> Result<()> + Send + Sync>;

/// What a setup routine can reach from the daemon
#[derive(Debug, Clone)]
pub struct SetupContext {
    /// Lifecycle signals, retry policy and task tracker for binds
    pub bind: BindContext,
}

impl SetupContext {
    /// Create a setup context
    pub fn new(bind: BindContext) -> Self {
        Self { bind }
    }

    /// Context for one plugin instance; its binds report failures as
    /// belonging to `plugin` in `role`
    pub fn for_instance(&self, plugin: &str, role: Capability) -> Self {
        Self {
            bind: self.bind.with_owner(BindOwner::new(plugin, role)),
        }
    }
}

/// Declared shape of a plugin before activation
///
/// The three capability slots are filled explicitly; a descriptor with no
/// slots is accepted but cannot be instantiated for any role.
#[derive(Clone)]
pub struct PluginDescriptor {
    /// Unique plugin name, matched against the `type` of config entries
    pub name: String,

    /// Human readable description
    pub description: String,

    /// Declared configuration options
    pub options: Vec<PluginOption>,

    input: Option<SetupFn>,
    output: Option<SetupFn>,
    tunnel: Option<SetupFn>,
}

impl fmt::Debug for PluginDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("options", &self.options)
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

impl PluginDescriptor {
    /// Create a descriptor with no capabilities
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            options: Vec::new(),
            input: None,
            output: None,
            tunnel: None,
        }
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declare a configuration option
    pub fn option(mut self, option: PluginOption) -> Self {
        self.options.push(option);
        self
    }

    /// Fill the input slot
    pub fn input<F>(self, setup: F) -> Self
    where
        F: Fn(&PluginConfig, &SetupContext) -> Result<()> + Send + Sync + 'static,
    {
        self.with_handler(Capability::Input, Arc::new(setup))
    }

    /// Fill the output slot
    pub fn output<F>(self, setup: F) -> Self
    where
        F: Fn(&PluginConfig, &SetupContext) -> Result<()> + Send + Sync + 'static,
    {
        self.with_handler(Capability::Output, Arc::new(setup))
    }

    /// Fill the tunnel slot
    pub fn tunnel<F>(self, setup: F) -> Self
    where
        F: Fn(&PluginConfig, &SetupContext) -> Result<()> + Send + Sync + 'static,
    {
        self.with_handler(Capability::Tunnel, Arc::new(setup))
    }

    /// Fill the slot for `capability`
    pub fn with_handler(mut self, capability: Capability, setup: SetupFn) -> Self {
        *self.slot_mut(capability) = Some(setup);
        self
    }

    /// Setup function for `capability`, if declared
    pub fn handler(&self, capability: Capability) -> Option<&SetupFn> {
        match capability {
            Capability::Input => self.input.as_ref(),
            Capability::Output => self.output.as_ref(),
            Capability::Tunnel => self.tunnel.as_ref(),
        }
    }

    /// Capabilities with a filled slot, in declaration order
    pub fn capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.handler(*c).is_some())
            .collect()
    }

    fn slot_mut(&mut self, capability: Capability) -> &mut Option<SetupFn> {
        match capability {
            Capability::Input => &mut self.input,
            Capability::Output => &mut self.output,
            Capability::Tunnel => &mut self.tunnel,
        }
    }
}
