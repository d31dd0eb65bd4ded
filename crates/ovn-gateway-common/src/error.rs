//! Error types for gateway reconciliation.
//!
//! Every fallible operation in the gateway crates returns [`GatewayResult`].
//! The reconciler decides per call site whether an error is fatal (startup)
//! or transient (a single skipped tick).

use std::io;
use thiserror::Error;

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors that can occur while reconciling the gateway sets and rule.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Failed to spawn a shell command.
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Shell command returned non-zero exit code.
    #[error("Shell command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// The overlay northbound query failed.
    #[error("OVN query failed: {message}")]
    OvnQuery {
        /// Error message.
        message: String,
    },

    /// The router port listing did not consist of (name, networks) pairs.
    #[error("Malformed logical router port listing: {message}")]
    MalformedRouterPorts {
        /// What was wrong with the listing.
        message: String,
    },

    /// Reading the pod inventory failed.
    #[error("Pod inventory read failed: {message}")]
    PodInventory {
        /// Error message.
        message: String,
    },

    /// An ipset stage or apply operation failed.
    #[error("ipset operation failed for '{set}': {message}")]
    IpSet {
        /// The set identifier (or "*" for a whole batch).
        set: String,
        /// Error message.
        message: String,
    },

    /// An iptables check or append failed.
    #[error("iptables operation failed: {message}")]
    Iptables {
        /// Error message.
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// IO error outside of command execution.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl GatewayError {
    /// Creates an OVN query error.
    pub fn ovn_query(message: impl Into<String>) -> Self {
        Self::OvnQuery {
            message: message.into(),
        }
    }

    /// Creates a malformed router port listing error.
    pub fn malformed_router_ports(message: impl Into<String>) -> Self {
        Self::MalformedRouterPorts {
            message: message.into(),
        }
    }

    /// Creates a pod inventory error.
    pub fn pod_inventory(message: impl Into<String>) -> Self {
        Self::PodInventory {
            message: message.into(),
        }
    }

    /// Creates an ipset error.
    pub fn ip_set(set: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IpSet {
            set: set.into(),
            message: message.into(),
        }
    }

    /// Creates an iptables error.
    pub fn iptables(message: impl Into<String>) -> Self {
        Self::Iptables {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on the next reconciliation tick.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::ShellCommandFailed { .. }
                | GatewayError::OvnQuery { .. }
                | GatewayError::MalformedRouterPorts { .. }
                | GatewayError::PodInventory { .. }
                | GatewayError::IpSet { .. }
                | GatewayError::Iptables { .. }
        )
    }
}
