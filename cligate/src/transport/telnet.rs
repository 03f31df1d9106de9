//! Telnet transport implementation over a raw TCP stream.
//!
//! Option negotiation is minimal: every DO is answered WONT and every WILL
//! is answered DONT, leaving the session in plain NVT mode, which is what
//! console servers and legacy IOS boxes expect from a scraper.

use async_trait::async_trait;
use log::debug;
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use secrecy::ExposeSecret;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;

use super::{ConnectParams, PatternBuffer, Transport, TransportKind, normalize_output};
use crate::error::TransportError;

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

static LOGIN_PROMPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(username|login)\s*:\s*$").unwrap());
static PASSWORD_PROMPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)password\s*:\s*$").unwrap());

/// Decoder state for in-band telnet command sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IacState {
    Data,
    Iac,
    Option(u8),
    Subnegotiation,
    SubnegotiationIac,
}

/// Strip IAC sequences from `input`, producing the plain data bytes and the
/// refusal replies to send back. `state` carries sequences split across
/// chunk boundaries.
fn decode_iac(state: &mut IacState, input: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut data = Vec::with_capacity(input.len());
    let mut replies = Vec::new();

    for &byte in input {
        *state = match *state {
            IacState::Data => {
                if byte == IAC {
                    IacState::Iac
                } else {
                    data.push(byte);
                    IacState::Data
                }
            }
            IacState::Iac => match byte {
                IAC => {
                    // Escaped literal 0xff
                    data.push(IAC);
                    IacState::Data
                }
                DO | DONT | WILL | WONT => IacState::Option(byte),
                SB => IacState::Subnegotiation,
                _ => IacState::Data,
            },
            IacState::Option(verb) => {
                match verb {
                    DO => replies.extend_from_slice(&[IAC, WONT, byte]),
                    WILL => replies.extend_from_slice(&[IAC, DONT, byte]),
                    _ => {}
                }
                IacState::Data
            }
            IacState::Subnegotiation => {
                if byte == IAC {
                    IacState::SubnegotiationIac
                } else {
                    IacState::Subnegotiation
                }
            }
            IacState::SubnegotiationIac => {
                if byte == SE {
                    IacState::Data
                } else {
                    IacState::Subnegotiation
                }
            }
        };
    }

    (data, replies)
}

/// Telnet shell session on one device.
pub struct TelnetTransport {
    stream: TcpStream,
    params: ConnectParams,
    state: IacState,
    alive: bool,
}

impl TelnetTransport {
    /// Connect, walk the login prompts if credentials are configured and
    /// wait for the first CLI prompt. Bounded by the connect timeout.
    pub async fn connect(params: ConnectParams) -> Result<Self, TransportError> {
        let port = params.port_for(TransportKind::Telnet);
        let deadline = Instant::now() + params.connect_timeout;

        let stream = tokio::time::timeout_at(
            deadline,
            TcpStream::connect((params.host.as_str(), port)),
        )
        .await
        .map_err(|_| TransportError::Timeout(params.connect_timeout))?
        .map_err(|source| TransportError::ConnectionFailed {
            host: params.host.clone(),
            port,
            source,
        })?;

        let mut transport = Self {
            stream,
            params,
            state: IacState::Data,
            alive: true,
        };

        transport.login(deadline).await?;
        debug!("Telnet shell ready on {}:{port}", transport.params.host);

        Ok(transport)
    }

    /// Answer login/password prompts until the CLI prompt appears.
    async fn login(&mut self, deadline: Instant) -> Result<(), TransportError> {
        let prompt = self.params.prompt.clone();
        let mut buffer = PatternBuffer::default();
        let mut sent_username = false;
        let mut sent_password = false;

        loop {
            if buffer.prompt_seen(&prompt) {
                return Ok(());
            }

            if buffer.prompt_seen(&PASSWORD_PROMPT) && !sent_password {
                let Some(password) = self.params.password.clone() else {
                    return Err(TransportError::CredentialsRequired);
                };
                self.write_line(password.expose_secret()).await?;
                sent_password = true;
                buffer.take();
            } else if buffer.prompt_seen(&LOGIN_PROMPT) && !sent_username {
                let Some(username) = self.params.username.clone() else {
                    return Err(TransportError::CredentialsRequired);
                };
                self.write_line(&username).await?;
                sent_username = true;
                buffer.take();
            }

            self.read_into(&mut buffer, deadline).await?;
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        let framed = format!("{line}\r\n");
        self.stream.write_all(framed.as_bytes()).await.map_err(|e| {
            self.alive = false;
            TransportError::Io(e)
        })
    }

    /// Read one chunk, answer any option negotiation in-band and append
    /// the remaining data bytes to `buffer`.
    async fn read_into(
        &mut self,
        buffer: &mut PatternBuffer,
        deadline: Instant,
    ) -> Result<(), TransportError> {
        let mut chunk = [0u8; 4096];
        let n = tokio::time::timeout_at(deadline, self.stream.read(&mut chunk))
            .await
            .map_err(|_| TransportError::PromptTimeout(self.params.command_timeout))?
            .map_err(|e| {
                self.alive = false;
                TransportError::Io(e)
            })?;

        if n == 0 {
            self.alive = false;
            return Err(TransportError::Disconnected);
        }

        let (data, replies) = decode_iac(&mut self.state, &chunk[..n]);
        if !replies.is_empty() {
            self.stream.write_all(&replies).await.map_err(|e| {
                self.alive = false;
                TransportError::Io(e)
            })?;
        }
        buffer.extend(&data);
        Ok(())
    }
}

#[async_trait]
impl Transport for TelnetTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Telnet
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    async fn send_command(&mut self, command: &str) -> Result<String, TransportError> {
        self.write_line(command).await?;

        let deadline = Instant::now() + self.params.command_timeout;
        let prompt = self.params.prompt.clone();
        let mut buffer = PatternBuffer::default();

        while !buffer.prompt_seen(&prompt) {
            self.read_into(&mut buffer, deadline).await?;
        }

        let raw = buffer.as_str_lossy().to_string();
        Ok(normalize_output(&raw, command))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.alive = false;
        self.stream.shutdown().await?;
        Ok(())
    }
}
