//! # Error Types Module
//!
//! Structured errors for content persistence and startup configuration.
//! Handlers wrap these in `anyhow::Error`; the variants exist so storage and
//! configuration failures can be told apart in logs and tests.

/// Errors raised by content store backends
#[derive(Debug, Clone)]
pub enum StoreError {
    /// File system errors (open, write, rename)
    Io(String),
    /// JSON encoding or decoding errors
    Serialization(String),
    /// Database errors
    Database(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io(msg) => write!(f, "Storage I/O error: {msg}"),
            StoreError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            StoreError::Database(msg) => write!(f, "Database error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Errors raised while loading the bot configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is not set
    Missing(&'static str),
    /// A variable is set but cannot be used
    Invalid { key: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "Configuration error: {key} must be set"),
            ConfigError::Invalid { key, reason } => {
                write!(f, "Configuration error: invalid {key}: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_formatting() {
        let err = StoreError::Io("disk full".to_string());
        assert_eq!(format!("{err}"), "Storage I/O error: disk full");

        let err = StoreError::Database("connection refused".to_string());
        assert_eq!(format!("{err}"), "Database error: connection refused");
    }

    #[test]
    fn test_config_error_formatting() {
        let err = ConfigError::Missing("ADMIN_IDS");
        assert_eq!(format!("{err}"), "Configuration error: ADMIN_IDS must be set");

        let err = ConfigError::Invalid {
            key: "APPEALS_PAGE_SIZE",
            reason: "not a number".to_string(),
        };
        assert!(format!("{err}").contains("APPEALS_PAGE_SIZE"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: StoreError = io.into();
        assert!(matches!(err, StoreError::Io(msg) if msg.contains("denied")));
    }
}
