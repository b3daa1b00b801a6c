//! # Ferry Plugin System
//!
//! Capability registry and role binding:
//! - Plugins declare input, output and tunnel setup functions explicitly
//! - Registration keeps descriptors pending until activation
//! - Configuration entries are resolved per role, one bad entry never
//!   blocks the rest
//! - Declared option defaults are applied and checked at load time

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod loader;
pub mod manager;
pub mod registry;
pub mod setup;
pub mod traits;

pub use loader::{load_plugins, resolve, Resolved, SkipReason, Skipped};
pub use manager::{PluginManager, SetupSummary};
pub use registry::{LoadedPlugin, PluginRegistry};
pub use setup::{PluginConfig, PluginSetup};
pub use traits::{PluginDescriptor, SetupContext, SetupFn};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::manager::PluginManager;
    pub use crate::registry::PluginRegistry;
    pub use crate::setup::PluginConfig;
    pub use crate::traits::{PluginDescriptor, SetupContext};
}
