//! Device session pool: one logical connection per device key.
//!
//! The pool owns every live transport. Callers go through
//! [`SessionPool::acquire`], which hands back a [`ScopedSession`] — an
//! exclusive, scope-bound hold on the device's session slot. Holding the
//! slot for the whole command serializes opens *and* execution per device,
//! so two callers can never race to open duplicate connections or
//! interleave reads on one shell.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;

use crate::config::GatewayConfig;
use crate::error::{GatewayError, TransportError};
use crate::inventory::DeviceRecord;
use crate::transport::{ConnectParams, Transport, TransportFactory, TransportKind};

/// A pooled connection bound to one device key.
pub struct SessionHandle {
    transport: Box<dyn Transport>,
    kind: TransportKind,
    last_used: Instant,
}

/// Per-device slot. Empty when no session is cached.
type Slot = Option<SessionHandle>;

/// Owns, reuses and purges device sessions.
///
/// At most one session exists per hostname at any instant; acquisition is
/// single-flight per key.
pub struct SessionPool {
    config: GatewayConfig,
    factory: Arc<dyn TransportFactory>,
    slots: Mutex<HashMap<String, Arc<AsyncMutex<Slot>>>>,
}

impl SessionPool {
    pub fn new(config: GatewayConfig, factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            config,
            factory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the device's session, opening one if needed.
    ///
    /// May block for a full network round trip (bounded by the configured
    /// timeouts) while an open is in flight, and queues behind any caller
    /// currently executing on the same device. A cached session that fails
    /// its liveness or idle check is closed and reopened exactly once.
    pub async fn acquire(&self, device: &DeviceRecord) -> Result<ScopedSession, GatewayError> {
        let slot = self.slot_for(&device.hostname);
        let mut guard = slot.lock_owned().await;

        if let Some(handle) = guard.as_mut() {
            let idle = handle.last_used.elapsed();
            if handle.transport.is_alive() && idle < self.config.max_idle {
                debug!("Reusing cached {} session for {}", handle.kind, device.hostname);
                return Ok(ScopedSession {
                    guard,
                    hostname: device.hostname.clone(),
                });
            }
            debug!(
                "Cached session for {} is stale (alive={}, idle={idle:?}); reopening",
                device.hostname,
                handle.transport.is_alive()
            );
            if let Some(mut stale) = guard.take() {
                if let Err(e) = stale.transport.close().await {
                    debug!("Closing stale session for {} failed: {e}", device.hostname);
                }
            }
        }

        let handle = self.open_with_failover(device).await.map_err(|source| {
            GatewayError::ConnectionFailed {
                device: device.hostname.clone(),
                source,
            }
        })?;

        // Stored before the per-key guard is released, so the next caller
        // sees and reuses it.
        *guard = Some(handle);

        Ok(ScopedSession {
            guard,
            hostname: device.hostname.clone(),
        })
    }

    /// Walk the device's transport ordering and return the first shell that
    /// opens. Connect refusals, auth failures and timeouts fall through to
    /// the next transport; other errors abort immediately.
    async fn open_with_failover(
        &self,
        device: &DeviceRecord,
    ) -> Result<SessionHandle, TransportError> {
        let order = transport_order(device);
        let mut last_error = None;

        for (i, &kind) in order.iter().enumerate() {
            debug!("Opening {kind} session to {} ({})", device.hostname, device.host);
            match self.factory.open(kind, self.connect_params(device)).await {
                Ok(transport) => {
                    return Ok(SessionHandle {
                        kind: transport.kind(),
                        transport,
                        last_used: Instant::now(),
                    });
                }
                Err(e) if e.is_fallback_eligible() && i + 1 < order.len() => {
                    warn!("{kind} attempt to {} failed: {e}; trying next transport", device.hostname);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(TransportError::Disconnected))
    }

    fn connect_params(&self, device: &DeviceRecord) -> ConnectParams {
        let prompt = device
            .platform_spec()
            .map(|spec| spec.prompt_pattern())
            .unwrap_or_else(crate::platform::default_prompt);

        ConnectParams {
            host: device.host.clone(),
            port: device.port,
            username: device.username.clone(),
            password: device.password.clone(),
            prompt,
            connect_timeout: self.config.connect_timeout,
            command_timeout: self.config.command_timeout,
            terminal_width: self.config.terminal_width,
            terminal_height: self.config.terminal_height,
        }
    }

    fn slot_for(&self, hostname: &str) -> Arc<AsyncMutex<Slot>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            slots
                .entry(hostname.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(None))),
        )
    }
}

/// Transport ordering policy.
///
/// Devices without credentials are console-server style boxes: Telnet
/// first, SSH as a long shot. Everything else is SSH first; only the IOS
/// family (flagged in the platform table) falls back to Telnet.
fn transport_order(device: &DeviceRecord) -> Vec<TransportKind> {
    if !device.has_credentials() {
        return vec![TransportKind::Telnet, TransportKind::Ssh];
    }
    match device.platform_spec() {
        Some(spec) if spec.telnet_fallback => vec![TransportKind::Ssh, TransportKind::Telnet],
        _ => vec![TransportKind::Ssh],
    }
}

/// Exclusive, scope-bound hold on one device's session.
///
/// The slot lock is released on every exit path when the guard drops. An
/// execution error purges the session from the pool (and closes it in the
/// background) before the error propagates, so a failed session is never
/// handed to a second caller.
pub struct ScopedSession {
    guard: OwnedMutexGuard<Slot>,
    hostname: String,
}

impl ScopedSession {
    /// Transport kind of the held session.
    pub fn kind(&self) -> Option<TransportKind> {
        self.guard.as_ref().map(|handle| handle.kind)
    }

    /// Run one command on the held session.
    pub async fn execute(&mut self, command: &str) -> Result<String, TransportError> {
        let handle = self.guard.as_mut().ok_or(TransportError::Disconnected)?;

        match handle.transport.send_command(command).await {
            Ok(output) => {
                handle.last_used = Instant::now();
                Ok(output)
            }
            Err(e) => {
                warn!("Session error on {}: {e}; purging", self.hostname);
                if let Some(mut failed) = self.guard.take() {
                    tokio::spawn(async move {
                        if let Err(close_err) = failed.transport.close().await {
                            debug!("Closing purged session failed: {close_err}");
                        }
                    });
                }
                Err(e)
            }
        }
    }
}
