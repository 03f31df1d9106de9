//! Error types for cligate.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Gateway-level error taxonomy surfaced to callers of
/// [`Gateway`](crate::Gateway) and [`CommandExecutor`](crate::CommandExecutor).
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The device does not exist in inventory, or the caller is not
    /// authorized to see it. The two cases are deliberately
    /// indistinguishable.
    #[error("Unknown or unauthorized device: {device}")]
    NotFound { device: String },

    /// The command failed the read-only allow-list.
    #[error("Command rejected: {reason}")]
    Rejected { reason: String },

    /// Every transport attempt to the device was exhausted.
    #[error("Connection to {device} failed: {source}")]
    ConnectionFailed {
        device: String,
        #[source]
        source: TransportError,
    },

    /// The command was issued but the device or transport failed.
    #[error("Command execution on {device} failed: {source}")]
    ExecutionFailed {
        device: String,
        #[source]
        source: TransportError,
    },

    /// Inventory could not be loaded. Only reachable at startup; after a
    /// first successful load, stale inventory is served fail-closed.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),
}

/// Transport layer errors (socket connect, negotiation, authentication,
/// command send/receive).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// Device requires a login but no credentials are configured
    #[error("Device prompted for login but no credentials are configured")]
    CredentialsRequired,

    /// Connection was closed unexpectedly
    #[error("Connection disconnected")]
    Disconnected,

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Prompt was not seen within the deadline
    #[error("Prompt not found within {0:?}")]
    PromptTimeout(std::time::Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether a connect attempt that failed with this error should fall
    /// through to the next transport in the ordering policy.
    ///
    /// Socket connect failures, authentication failures and timeouts mean
    /// "this transport is not usable on this device, try the next one";
    /// anything else (protocol violations, mid-session I/O errors) aborts
    /// the whole acquisition.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionFailed { .. }
                | TransportError::AuthenticationFailed { .. }
                | TransportError::CredentialsRequired
                | TransportError::Timeout(_)
                | TransportError::PromptTimeout(_)
        )
    }
}

/// Inventory loading and validation errors.
#[derive(Error, Debug)]
pub enum InventoryError {
    /// Inventory file does not exist
    #[error("Inventory file missing: {0}")]
    Missing(PathBuf),

    /// YAML syntax error
    #[error("Inventory YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A device entry failed validation; the whole reload is rejected
    #[error("Invalid device entry '{hostname}': {message}")]
    InvalidRecord { hostname: String, message: String },

    /// I/O error reading the inventory file
    #[error("I/O error reading inventory: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias using cligate's gateway error.
pub type Result<T> = std::result::Result<T, GatewayError>;
