//! # collectd Input Plugin
//!
//! Listens for the collectd binary protocol on a UDP (or TCP) socket.
//!
//! ## Options
//!
//! - `host`: address to bind to (default `localhost`)
//! - `port`: port to bind to (default `25826`)
//! - `types_db`: collectd type definitions (default
//!   `/usr/share/collectd/types.db`)
//! - `protocol`: `udp` or `tcp` (default `udp`)
//!
//! ## Example
//!
//! ```yaml
//! input:
//!   - type: collectd
//!     port: 25826
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

mod handler;

pub use handler::{CollectdHandler, CollectdStats};

use ferry_core::{Capability, Error, PluginOption, Result};
use ferry_plugins::{PluginConfig, PluginDescriptor, PluginRegistry, SetupContext};
use ferry_protocols::Protocol;
use std::sync::Arc;

/// Name matched against the `type` of configuration entries
pub const NAME: &str = "collectd";

/// Default bind host
pub const DEFAULT_HOST: &str = "localhost";

/// Default collectd network port
pub const DEFAULT_PORT: u16 = 25826;

/// Default location of the collectd types database
pub const DEFAULT_TYPES_DB: &str = "/usr/share/collectd/types.db";

/// Default transport
pub const DEFAULT_PROTOCOL: &str = "udp";

/// Describe the plugin
pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::new(NAME)
        .description("A plugin for the collectd binary protocol.")
        .option(
            PluginOption::new("host")
                .default_value(DEFAULT_HOST)
                .modes([Capability::Input])
                .help("Host to bind to."),
        )
        .option(
            PluginOption::new("port")
                .default_value(DEFAULT_PORT)
                .help("Port to bind to."),
        )
        .option(
            PluginOption::new("types_db")
                .default_value(DEFAULT_TYPES_DB)
                .help("TypesDB to load containing collectd type definitions."),
        )
        .option(
            PluginOption::new("protocol")
                .default_value(DEFAULT_PROTOCOL)
                .help("Transport to listen on, udp or tcp."),
        )
        .input(|config, ctx| setup_input(config, ctx).map(drop))
}

/// Add the plugin to `registry` as a pending descriptor
pub fn register(registry: &mut PluginRegistry) {
    registry.register(descriptor());
}

/// Start a listener for one input entry
///
/// Missing keys fall back to the plugin defaults. The bind itself runs in
/// the background under the context's lifecycle and reports a failed bind
/// through the context's failure channel; the returned handler exposes what
/// the listener has received so far.
pub fn setup_input(config: &PluginConfig, ctx: &SetupContext) -> Result<Arc<CollectdHandler>> {
    let host = config.str("host")?.unwrap_or(DEFAULT_HOST).to_string();
    let port = config.port("port")?.unwrap_or(DEFAULT_PORT);
    let types_db = config.str("types_db")?.unwrap_or(DEFAULT_TYPES_DB);
    let protocol = Protocol::parse(config.str("protocol")?.unwrap_or(DEFAULT_PROTOCOL))?;

    if types_db.is_empty() {
        return Err(Error::plugin(NAME, "types_db must not be empty"));
    }

    tracing::info!(
        host = %host,
        port,
        protocol = %protocol,
        types_db = %types_db,
        "Starting collectd input"
    );

    let handler = Arc::new(CollectdHandler::new(types_db));
    protocol.bind(&ctx.bind, host, port, handler.clone());

    Ok(handler)
}
