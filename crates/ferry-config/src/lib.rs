//! # Ferry Configuration
//!
//! Loads the daemon configuration from YAML, TOML or JSON, expands
//! `${VAR}` / `${VAR:-default}` references, merges layered files and
//! validates the `core` section. Plugin entries are kept as raw values and
//! checked per entry when plugins are resolved.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod builder;
pub mod loader;
pub mod merger;
pub mod types;
pub mod validator;

pub use builder::ConfigBuilder;
pub use loader::{load_and_merge, load_config, load_from_file, load_from_str, ConfigFormat};
pub use merger::merge_configs;
pub use types::{Config, CoreConfig, RetryConfig};
pub use validator::validate_config;
