//! Common types used throughout Ferry

use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// A role a plugin can fulfill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Receives metrics from the outside world
    Input,
    /// Ships metrics to a downstream system
    Output,
    /// Forwards raw traffic through a tunnel
    Tunnel,
}

impl Capability {
    /// Every capability, in declaration order
    pub const ALL: [Capability; 3] = [Capability::Input, Capability::Output, Capability::Tunnel];

    /// Lowercase name used in configuration and diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Tunnel => "tunnel",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            "tunnel" => Ok(Self::Tunnel),
            other => Err(Error::Config(format!("Unknown capability: {other}"))),
        }
    }
}

/// Declared configuration option of a plugin
///
/// Options document what a plugin accepts. The declared default also fixes
/// the JSON type a user supplied value must have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginOption {
    /// Option key inside a plugin's configuration block
    pub name: String,

    /// Value used when the key is absent
    #[serde(default)]
    pub default: Option<Value>,

    /// Help text, one entry per line
    #[serde(default)]
    pub help: Vec<String>,

    /// Capabilities this option applies to (empty = all)
    #[serde(default)]
    pub modes: Vec<Capability>,
}

impl PluginOption {
    /// Create an option with no default and no help
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            help: Vec::new(),
            modes: Vec::new(),
        }
    }

    /// Set the default value
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Append a line of help text
    pub fn help(mut self, line: impl Into<String>) -> Self {
        self.help.push(line.into());
        self
    }

    /// Restrict the option to the given capabilities
    pub fn modes(mut self, modes: impl IntoIterator<Item = Capability>) -> Self {
        self.modes = modes.into_iter().collect();
        self
    }

    /// Whether the option is relevant for `capability`
    pub fn applies_to(&self, capability: Capability) -> bool {
        self.modes.is_empty() || self.modes.contains(&capability)
    }

    /// Check that `value` has the same JSON type as the declared default
    ///
    /// Options without a default, or with a `null` default, accept anything.
    /// Integers and floats are both accepted where the default is a number.
    pub fn accepts(&self, value: &Value) -> bool {
        match &self.default {
            None | Some(Value::Null) => true,
            Some(Value::Bool(_)) => value.is_boolean(),
            Some(Value::Number(_)) => value.is_number(),
            Some(Value::String(_)) => value.is_string(),
            Some(Value::Array(_)) => value.is_array(),
            Some(Value::Object(_)) => value.is_object(),
        }
    }
}
