//! Error types for Ferry

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for Ferry
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Plugin error
    #[error("Plugin error in '{plugin}': {message}")]
    Plugin {
        /// Plugin name
        plugin: String,
        /// Error message
        message: String,
    },

    /// Protocol identifier that no binder handles
    #[error("Unknown protocol: {0}")]
    UnknownProtocol(String),

    /// Failed to acquire a listening socket
    #[error("Failed to bind {address}: {source}")]
    Bind {
        /// Target in `proto://host:port` form
        address: String,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// Retry budget exhausted, carrying the last attempt's error
    #[error("Gave up after {attempts} attempts: {source}")]
    RetryExhausted {
        /// Number of attempts made
        attempts: u32,
        /// Error of the last attempt
        #[source]
        source: Box<Error>,
    },

    /// Runtime error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a plugin error
    pub fn plugin(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Plugin {
            plugin: plugin.into(),
            message: message.into(),
        }
    }

    /// Create a bind error
    pub fn bind(address: impl Into<String>, source: std::io::Error) -> Self {
        Error::Bind {
            address: address.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_error() {
        let err = Error::plugin("collectd", "port must be a number");
        assert!(matches!(err, Error::Plugin { .. }));
        assert!(err.to_string().contains("collectd"));
    }

    #[test]
    fn test_bind_error_display() {
        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = Error::bind("tcp://127.0.0.1:9", io);
        assert_eq!(err.to_string(), "Failed to bind tcp://127.0.0.1:9: address in use");
    }

    #[test]
    fn test_retry_exhausted_keeps_source() {
        let last = Error::Runtime("boom".to_string());
        let err = Error::RetryExhausted {
            attempts: 3,
            source: Box::new(last),
        };
        assert!(err.to_string().contains("3 attempts"));

        let source = std::error::Error::source(&err).map(|e| e.to_string());
        assert_eq!(source.as_deref(), Some("Runtime error: boom"));
    }
}
