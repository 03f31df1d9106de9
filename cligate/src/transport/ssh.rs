//! SSH transport implementation wrapping russh.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use russh::client::{self, Handle, Msg};
use russh::keys::PublicKey;
use russh::{Channel, ChannelMsg};
use secrecy::ExposeSecret;
use tokio::time::Instant;

use super::{ConnectParams, PatternBuffer, Transport, TransportKind, normalize_output};
use crate::error::TransportError;

/// SSH shell session on one device.
pub struct SshTransport {
    session: Handle<GatewayHandler>,
    channel: Channel<Msg>,
    params: ConnectParams,
}

impl SshTransport {
    /// Connect, authenticate and open a PTY shell, consuming the banner up
    /// to the first prompt. Every phase is bounded by the connect timeout.
    pub async fn connect(params: ConnectParams) -> Result<Self, TransportError> {
        let port = params.port_for(TransportKind::Ssh);
        let deadline = Instant::now() + params.connect_timeout;

        let config = Arc::new(client::Config {
            inactivity_timeout: Some(params.connect_timeout),
            ..Default::default()
        });

        let mut session = tokio::time::timeout_at(
            deadline,
            client::connect(config, (params.host.as_str(), port), GatewayHandler),
        )
        .await
        .map_err(|_| TransportError::Timeout(params.connect_timeout))?
        .map_err(|e| connect_error(&params.host, port, e))?;

        tokio::time::timeout_at(deadline, Self::authenticate(&mut session, &params))
            .await
            .map_err(|_| TransportError::Timeout(params.connect_timeout))??;

        let channel =
            tokio::time::timeout_at(deadline, Self::open_shell(&session, &params))
                .await
                .map_err(|_| TransportError::Timeout(params.connect_timeout))??;

        let mut transport = Self {
            session,
            channel,
            params,
        };

        // Drain the login banner and motd up to the first prompt.
        transport.read_until_prompt(deadline).await?;
        debug!("SSH shell ready on {}:{port}", transport.params.host);

        Ok(transport)
    }

    async fn authenticate(
        session: &mut Handle<GatewayHandler>,
        params: &ConnectParams,
    ) -> Result<(), TransportError> {
        let user = params.username.clone().unwrap_or_default();

        let success = match &params.password {
            Some(password) => session
                .authenticate_password(&user, password.expose_secret())
                .await?
                .success(),
            None => session.authenticate_none(&user).await?.success(),
        };

        if !success {
            return Err(TransportError::AuthenticationFailed { user });
        }
        Ok(())
    }

    async fn open_shell(
        session: &Handle<GatewayHandler>,
        params: &ConnectParams,
    ) -> Result<Channel<Msg>, TransportError> {
        let channel = session.channel_open_session().await?;

        channel
            .request_pty(
                true,
                "xterm",
                params.terminal_width,
                params.terminal_height,
                0,
                0,
                &[],
            )
            .await?;

        channel.request_shell(true).await?;

        Ok(channel)
    }

    /// Accumulate channel output until the prompt pattern matches the
    /// buffer tail, then return everything read.
    async fn read_until_prompt(&mut self, deadline: Instant) -> Result<Vec<u8>, TransportError> {
        let mut buffer = PatternBuffer::default();

        loop {
            if buffer.prompt_seen(&self.params.prompt) {
                return Ok(buffer.take());
            }

            let msg = tokio::time::timeout_at(deadline, self.channel.wait())
                .await
                .map_err(|_| TransportError::PromptTimeout(self.params.command_timeout))?;

            match msg {
                Some(ChannelMsg::Data { ref data }) => buffer.extend(data),
                Some(ChannelMsg::ExtendedData { ref data, .. }) => buffer.extend(data),
                Some(ChannelMsg::Eof | ChannelMsg::Close) | None => {
                    return Err(TransportError::Disconnected);
                }
                Some(_) => {}
            }
        }
    }
}

#[async_trait]
impl Transport for SshTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Ssh
    }

    fn is_alive(&self) -> bool {
        !self.session.is_closed()
    }

    async fn send_command(&mut self, command: &str) -> Result<String, TransportError> {
        let line = format!("{command}\n");
        self.channel.data(line.as_bytes()).await?;

        let deadline = Instant::now() + self.params.command_timeout;
        let data = self.read_until_prompt(deadline).await?;
        let raw = String::from_utf8_lossy(&data).to_string();

        Ok(normalize_output(&raw, command))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

/// Classify a failure from the connect phase, before any session exists.
///
/// A box with no SSH daemon refuses the TCP connect and russh reports it
/// as an I/O error; handshake failures mean the listener does not speak
/// SSH. Both say "this transport is not usable on this device", which is
/// what [`TransportError::ConnectionFailed`] carries through the
/// transport ordering walk.
fn connect_error(host: &str, port: u16, error: russh::Error) -> TransportError {
    let source = match error {
        russh::Error::IO(source) => source,
        other => io::Error::other(other),
    };
    TransportError::ConnectionFailed {
        host: host.to_string(),
        port,
        source,
    }
}

/// russh client handler. The gateway talks to lab inventory it owns, so
/// host keys are accepted without known_hosts tracking.
struct GatewayHandler;

impl client::Handler for GatewayHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::bytes::Regex;
    use std::time::Duration;

    fn params(host: &str, port: u16) -> ConnectParams {
        ConnectParams {
            host: host.to_string(),
            port: Some(port),
            username: Some("admin".to_string()),
            password: None,
            prompt: Regex::new(r"[>#]\s*$").unwrap(),
            connect_timeout: Duration::from_secs(2),
            command_timeout: Duration::from_secs(2),
            terminal_width: 80,
            terminal_height: 24,
        }
    }

    #[test]
    fn test_connect_refusal_is_fallback_eligible() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = connect_error("10.0.0.1", 22, russh::Error::IO(refused));
        assert!(matches!(err, TransportError::ConnectionFailed { port: 22, .. }));
        assert!(err.is_fallback_eligible());
    }

    #[tokio::test]
    async fn test_refused_connect_surfaces_as_connection_failed() {
        // Bind then drop a listener so the chosen port is known to refuse.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = SshTransport::connect(params("127.0.0.1", port))
            .await
            .err()
            .expect("connect should fail");
        assert!(matches!(err, TransportError::ConnectionFailed { .. }));
        assert!(err.is_fallback_eligible());
    }
}
