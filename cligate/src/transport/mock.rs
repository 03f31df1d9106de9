//! Mock transport factory for pool and executor tests.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{ConnectParams, Transport, TransportFactory, TransportKind};
use crate::error::TransportError;

/// Scripted factory: counts opens, can reject transports, can delay opens
/// to widen race windows, and tracks how many connections are open at once.
pub(crate) struct MockFactory {
    /// Total successful opens.
    pub opens: AtomicUsize,

    /// Connect attempts, including rejected ones.
    pub attempts: AtomicUsize,

    /// Currently open connections.
    pub live: Arc<AtomicUsize>,

    /// High-water mark of simultaneously open connections.
    pub max_live: Arc<AtomicUsize>,

    /// Reject SSH attempts with an authentication failure.
    pub reject_ssh: bool,

    /// Reject SSH attempts with a refused socket connect, the shape the
    /// real transport produces for a device with no SSH daemon.
    pub reject_ssh_connect: bool,

    /// Reject Telnet attempts with a connect failure.
    pub reject_telnet: bool,

    /// Artificial delay inside each open.
    pub open_delay: Duration,

    /// Output returned by every `send_command`.
    pub output: String,

    /// When set, the next `send_command` on any session fails once.
    pub fail_next_send: Arc<AtomicBool>,
}

impl MockFactory {
    pub fn returning(output: &str) -> Self {
        Self {
            opens: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
            live: Arc::new(AtomicUsize::new(0)),
            max_live: Arc::new(AtomicUsize::new(0)),
            reject_ssh: false,
            reject_ssh_connect: false,
            reject_telnet: false,
            open_delay: Duration::ZERO,
            output: output.to_string(),
            fail_next_send: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl TransportFactory for MockFactory {
    async fn open(
        &self,
        kind: TransportKind,
        params: ConnectParams,
    ) -> Result<Box<dyn Transport>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.open_delay > Duration::ZERO {
            tokio::time::sleep(self.open_delay).await;
        }

        match kind {
            TransportKind::Ssh if self.reject_ssh => {
                return Err(TransportError::AuthenticationFailed {
                    user: params.username.unwrap_or_default(),
                });
            }
            TransportKind::Ssh if self.reject_ssh_connect => {
                return Err(TransportError::ConnectionFailed {
                    port: params.port_for(kind),
                    host: params.host,
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
                });
            }
            TransportKind::Telnet if self.reject_telnet => {
                return Err(TransportError::ConnectionFailed {
                    port: params.port_for(kind),
                    host: params.host,
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
                });
            }
            _ => {}
        }

        self.opens.fetch_add(1, Ordering::SeqCst);
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(MockTransport {
            kind,
            alive: true,
            output: self.output.clone(),
            fail_next_send: Arc::clone(&self.fail_next_send),
            live: Arc::clone(&self.live),
        }))
    }
}

struct MockTransport {
    kind: TransportKind,
    alive: bool,
    output: String,
    fail_next_send: Arc<AtomicBool>,
    live: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for MockTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    async fn send_command(&mut self, _command: &str) -> Result<String, TransportError> {
        if self.fail_next_send.swap(false, Ordering::SeqCst) {
            self.alive = false;
            return Err(TransportError::Disconnected);
        }
        Ok(self.output.clone())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.alive {
            self.alive = false;
        }
        Ok(())
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}
