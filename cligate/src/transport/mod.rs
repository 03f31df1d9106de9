//! Device transports: SSH (primary) and Telnet (fallback).
//!
//! A [`Transport`] is a live remote shell bound to one device, able to issue
//! a CLI command and return its output. Transports are opened by a
//! [`TransportFactory`], which the session pool drives through the per-device
//! transport ordering policy; tests substitute a mock factory.

mod buffer;
pub mod ssh;
pub mod telnet;

#[cfg(test)]
pub(crate) mod mock;

pub use buffer::PatternBuffer;

use std::time::Duration;

use async_trait::async_trait;
use regex::bytes::Regex;
use secrecy::SecretString;

use crate::config::{DEFAULT_SSH_PORT, DEFAULT_TELNET_PORT};
use crate::error::TransportError;

/// Remote-shell protocol used to reach a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Ssh,
    Telnet,
}

impl TransportKind {
    /// Default TCP port for this transport.
    pub fn default_port(self) -> u16 {
        match self {
            TransportKind::Ssh => DEFAULT_SSH_PORT,
            TransportKind::Telnet => DEFAULT_TELNET_PORT,
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Ssh => write!(f, "ssh"),
            TransportKind::Telnet => write!(f, "telnet"),
        }
    }
}

/// Everything a transport needs to open a shell on one device.
#[derive(Clone)]
pub struct ConnectParams {
    /// DNS name or management IP.
    pub host: String,

    /// TCP port override; `None` means the transport's default.
    pub port: Option<u16>,

    /// Login username; absent for credential-less console access.
    pub username: Option<String>,

    /// Login password; only exposed inside the transport.
    pub password: Option<SecretString>,

    /// Prompt pattern for this device's platform family.
    pub prompt: Regex,

    /// Socket connect + negotiation timeout.
    pub connect_timeout: Duration,

    /// Per-command execution timeout.
    pub command_timeout: Duration,

    /// Terminal width for PTY requests.
    pub terminal_width: u32,

    /// Terminal height for PTY requests.
    pub terminal_height: u32,
}

impl ConnectParams {
    /// Resolved TCP port for the given transport.
    pub fn port_for(&self, kind: TransportKind) -> u16 {
        self.port.unwrap_or_else(|| kind.default_port())
    }
}

impl std::fmt::Debug for ConnectParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

/// A live remote shell on one device.
#[async_trait]
pub trait Transport: Send {
    /// Which protocol this shell runs over.
    fn kind(&self) -> TransportKind;

    /// Cheap liveness check; `false` means the session must be reopened.
    fn is_alive(&self) -> bool;

    /// Issue a command and return its output with the command echo and
    /// trailing prompt stripped. Bounded by the per-command timeout.
    async fn send_command(&mut self, command: &str) -> Result<String, TransportError>;

    /// Close the underlying connection. Best-effort; errors are for logging.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens transports. The pool holds one factory; tests inject a mock.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(
        &self,
        kind: TransportKind,
        params: ConnectParams,
    ) -> Result<Box<dyn Transport>, TransportError>;
}

/// Factory dispatching to the real SSH and Telnet transports.
#[derive(Debug, Default)]
pub struct NetworkFactory;

#[async_trait]
impl TransportFactory for NetworkFactory {
    async fn open(
        &self,
        kind: TransportKind,
        params: ConnectParams,
    ) -> Result<Box<dyn Transport>, TransportError> {
        match kind {
            TransportKind::Ssh => Ok(Box::new(ssh::SshTransport::connect(params).await?)),
            TransportKind::Telnet => Ok(Box::new(telnet::TelnetTransport::connect(params).await?)),
        }
    }
}

/// Strip the leading command echo and the trailing prompt line from raw
/// shell output.
pub(crate) fn normalize_output(raw: &str, command: &str) -> String {
    let output = raw
        .strip_prefix(command)
        .unwrap_or(raw)
        .trim_start_matches(['\r', '\n']);

    if let Some(pos) = output.rfind('\n') {
        output[..pos].trim_end_matches('\r').to_string()
    } else {
        output.to_string()
    }
}
