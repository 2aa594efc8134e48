//! Error types for bgpsyncd.
//!
//! All errors implement `std::error::Error` via `thiserror`. Malformed rows
//! coming back from a device are not errors at all: they are logged and
//! skipped at the call site, so the variants here cover the transport, the
//! store and configuration only.

use thiserror::Error;

/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors that can occur during BGP peer discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// SNMP request/walk against the device failed.
    ///
    /// During schema probing this is treated as "schema unsupported" and
    /// triggers fallback rather than aborting the device.
    #[error("SNMP transport failed: {operation}: {message}")]
    Transport {
        /// The request that failed (e.g. "walk bgpPeerRemoteAs").
        operation: String,
        /// Error message.
        message: String,
    },

    /// Persistent store operation failed. Fatal for the device+context
    /// being processed.
    #[error("Store operation failed: {operation}: {message}")]
    Store {
        /// The operation that failed (e.g. "upsert_peer").
        operation: String,
        /// Error message.
        message: String,
    },

    /// Redis connection or command failed.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Configuration file missing, unreadable or invalid.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    /// IO error (config file access, subprocess spawn).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiscoveryError {
    /// Creates a transport error.
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a store error.
    pub fn store(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Store {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DiscoveryError::transport("walk bgpPeerRemoteAs", "timeout");
        assert_eq!(
            err.to_string(),
            "SNMP transport failed: walk bgpPeerRemoteAs: timeout"
        );
    }

    #[test]
    fn test_store_error_display() {
        let err = DiscoveryError::store("upsert_peer", "connection refused");
        assert_eq!(
            err.to_string(),
            "Store operation failed: upsert_peer: connection refused"
        );
    }
}
