//! Audit trail for executed commands.
//!
//! Every executed command produces one [`AuditEvent`], emitted to two
//! independent sinks: a structured log line and a durable append-only JSONL
//! store. Neither sink can fail the command pipeline; sink errors are
//! logged and swallowed.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

/// Summary of one executed command.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Event time, UTC.
    pub ts: DateTime<Utc>,

    /// Caller identity.
    pub user: String,

    /// Device hostname the command ran on.
    pub device: String,

    /// The command as submitted.
    pub command: String,

    /// Length of the raw output in bytes.
    pub raw_len: usize,

    /// Whether a structured parse succeeded.
    pub has_json: bool,

    /// Whether the command itself succeeded.
    pub ok: bool,
}

/// Durable record: the event plus the full payload.
#[derive(Debug, Serialize)]
struct DurableRecord<'a> {
    #[serde(flatten)]
    event: &'a AuditEvent,
    stdout: &'a str,
    json: Option<&'a serde_json::Value>,
}

/// Append-only, line-oriented event store.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, line: &str) -> std::io::Result<()>;
}

/// File-backed JSONL sink.
pub struct JsonlFileSink {
    path: PathBuf,
}

impl JsonlFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AuditSink for JsonlFileSink {
    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }
}

/// Emits audit events. Infallible from the caller's point of view.
pub struct AuditRecorder {
    sink: Box<dyn AuditSink>,
}

impl AuditRecorder {
    /// Recorder writing JSONL to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            sink: Box::new(JsonlFileSink::new(path)),
        }
    }

    /// Recorder writing to a custom sink.
    pub fn with_sink(sink: Box<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Emit one event to both sinks.
    ///
    /// Never returns an error and never fails the pipeline that triggered
    /// it; sink failures are logged internally.
    pub async fn record(
        &self,
        event: &AuditEvent,
        stdout: &str,
        json: Option<&serde_json::Value>,
    ) {
        // Structured log line for console/SIEM collectors.
        match serde_json::to_string(event) {
            Ok(summary) => info!(target: "audit", "{summary}"),
            Err(e) => error!("Failed to serialize audit event: {e}"),
        }

        let record = DurableRecord {
            event,
            stdout,
            json,
        };
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize audit record: {e}");
                return;
            }
        };
        if let Err(e) = self.sink.append(&line).await {
            error!("Failed to write audit record: {e}");
        }
    }
}
