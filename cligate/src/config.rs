//! Gateway configuration.

use std::time::Duration;

/// Default SSH port when a device has no port override.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default Telnet port when a device has no port override.
pub const DEFAULT_TELNET_PORT: u16 = 23;

/// Timeouts and terminal parameters shared by all device connections.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Socket connect + transport negotiation timeout per attempt.
    pub connect_timeout: Duration,

    /// Per-command execution timeout (send to prompt).
    pub command_timeout: Duration,

    /// Cached sessions idle longer than this are reopened on next use.
    pub max_idle: Duration,

    /// Terminal width for PTY requests.
    pub terminal_width: u32,

    /// Terminal height for PTY requests.
    pub terminal_height: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            command_timeout: Duration::from_secs(30),
            max_idle: Duration::from_secs(300),
            terminal_width: 511,
            terminal_height: 24,
        }
    }
}
