//! Plugin instances bound to a configuration entry

use crate::traits::{SetupContext, SetupFn};
use ferry_core::{Capability, Error, PluginOption, Result};
use serde_json::{Map, Value};
use std::fmt;

/// Configuration block of one plugin entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginConfig {
    values: Map<String, Value>,
}

impl PluginConfig {
    /// Wrap a JSON object
    pub fn new(values: Map<String, Value>) -> Self {
        Self { values }
    }

    /// Raw value for `key`
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Set `key` to `value`
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// String value of `key`
    pub fn str(&self, key: &str) -> Result<Option<&str>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(Error::Config(format!("'{key}' must be a string, got {other}"))),
        }
    }

    /// Port number stored under `key`
    pub fn port(&self, key: &str) -> Result<Option<u16>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|n| u16::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| Error::Config(format!("'{key}' must be a port number, got {value}"))),
        }
    }

    /// Check values against declared options and fill in defaults
    ///
    /// Only options that apply to `capability` are considered. Keys that no
    /// option declares are kept as they are.
    pub fn apply_options(&mut self, options: &[PluginOption], capability: Capability) -> Result<()> {
        for option in options.iter().filter(|o| o.applies_to(capability)) {
            match self.values.get(&option.name) {
                Some(Value::Null) | None => {
                    if let Some(default) = &option.default {
                        self.values.insert(option.name.clone(), default.clone());
                    }
                }
                Some(value) if !option.accepts(value) => {
                    return Err(Error::Config(format!(
                        "option '{}' has the wrong type: {}",
                        option.name, value
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }
}

impl From<Map<String, Value>> for PluginConfig {
    fn from(values: Map<String, Value>) -> Self {
        Self::new(values)
    }
}

/// A loaded plugin's setup function bound to one configuration entry
#[derive(Clone)]
pub struct PluginSetup {
    name: String,
    capability: Capability,
    config: PluginConfig,
    setup: SetupFn,
}

impl fmt::Debug for PluginSetup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginSetup")
            .field("name", &self.name)
            .field("capability", &self.capability)
            .field("config", &self.config)
            .finish()
    }
}

impl PluginSetup {
    pub(crate) fn new(
        name: impl Into<String>,
        capability: Capability,
        config: PluginConfig,
        setup: SetupFn,
    ) -> Self {
        Self {
            name: name.into(),
            capability,
            config,
            setup,
        }
    }

    /// Plugin name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role this instance was resolved for
    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Entry configuration
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Whether this instance calls exactly `setup`
    pub fn is_bound_to(&self, setup: &SetupFn) -> bool {
        std::sync::Arc::ptr_eq(&self.setup, setup)
    }

    /// Run the plugin's setup function with this entry's configuration
    pub fn setup(&self, ctx: &SetupContext) -> Result<()> {
        (self.setup)(&self.config, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: Value) -> PluginConfig {
        match value {
            Value::Object(map) => PluginConfig::new(map),
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_typed_getters() {
        let cfg = config(json!({"host": "x", "port": 9, "big": 70000, "neg": -1}));

        assert_eq!(cfg.str("host").unwrap(), Some("x"));
        assert_eq!(cfg.str("missing").unwrap(), None);
        assert!(cfg.str("port").is_err());

        assert_eq!(cfg.port("port").unwrap(), Some(9));
        assert!(cfg.port("big").is_err());
        assert!(cfg.port("neg").is_err());
        assert!(cfg.port("host").is_err());
    }

    #[test]
    fn test_apply_options_fills_defaults() {
        let options = vec![
            PluginOption::new("host").default_value("localhost"),
            PluginOption::new("port").default_value(25826),
            PluginOption::new("only_output")
                .default_value(true)
                .modes([Capability::Output]),
        ];

        let mut cfg = config(json!({"type": "collectd", "port": 9, "extra": [1]}));
        cfg.apply_options(&options, Capability::Input).unwrap();

        assert_eq!(cfg.get("host"), Some(&json!("localhost")));
        assert_eq!(cfg.get("port"), Some(&json!(9)));
        assert_eq!(cfg.get("extra"), Some(&json!([1])));
        assert_eq!(cfg.get("only_output"), None);
    }

    #[test]
    fn test_apply_options_rejects_wrong_type() {
        let options = vec![PluginOption::new("port").default_value(25826)];
        let mut cfg = config(json!({"port": "nine"}));

        let err = cfg.apply_options(&options, Capability::Input).unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_setup_calls_bound_function() {
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(None));
        let captured = seen.clone();
        let setup: SetupFn = std::sync::Arc::new(move |cfg: &PluginConfig, _: &SetupContext| {
            *captured.lock() = cfg.str("host")?.map(str::to_string);
            Ok(())
        });

        let instance = PluginSetup::new(
            "echo",
            Capability::Output,
            config(json!({"type": "echo", "host": "x"})),
            setup.clone(),
        );
        assert!(instance.is_bound_to(&setup));

        let ctx = SetupContext::new(ferry_protocols::BindContext::new(
            ferry_runtime::Lifecycle::new(),
            ferry_runtime::RetryPolicy::default(),
        ));
        instance.setup(&ctx).unwrap();

        assert_eq!(seen.lock().as_deref(), Some("x"));
    }
}
