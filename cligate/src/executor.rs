//! Command execution pipeline.
//!
//! Ties the pieces together: authorize against inventory, validate the
//! command against the read-only allow-list, acquire a pooled session,
//! execute, best-effort parse, audit, return. Each step short-circuits with
//! a typed [`GatewayError`]; nothing touches the network before the
//! allow-list check passes.

use std::sync::Arc;

use chrono::Utc;
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::audit::{AuditEvent, AuditRecorder};
use crate::error::{GatewayError, Result};
use crate::inventory::{Caller, InventoryStore};
use crate::parser;
use crate::pool::SessionPool;

/// Commands must start with one of these read-only verbs. This is a
/// syntactic allow-list, not a semantic safety check; arguments are not
/// inspected.
static READ_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(show|ping|traceroute)\b").unwrap());

/// Outcome of one command run.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Raw CLI text output.
    pub raw: String,

    /// Structured parse of the output, when a parser matched and succeeded.
    pub parsed: Option<serde_json::Value>,
}

/// Orchestrates the full pipeline for one command request.
pub struct CommandExecutor {
    inventory: Arc<InventoryStore>,
    pool: Arc<SessionPool>,
    audit: Arc<AuditRecorder>,
}

impl CommandExecutor {
    pub fn new(
        inventory: Arc<InventoryStore>,
        pool: Arc<SessionPool>,
        audit: Arc<AuditRecorder>,
    ) -> Self {
        Self {
            inventory,
            pool,
            audit,
        }
    }

    /// Run `command` on `device` for `caller`.
    ///
    /// Fails with [`GatewayError::NotFound`] for unknown or unauthorized
    /// devices (indistinguishable by design), [`GatewayError::Rejected`]
    /// for commands outside the allow-list, and
    /// [`GatewayError::ConnectionFailed`] / [`GatewayError::ExecutionFailed`]
    /// for transport problems. A parse failure is never an error; the raw
    /// output is always returned.
    pub async fn run(&self, device: &str, command: &str, caller: &Caller) -> Result<CommandResult> {
        debug!(
            "Run-command requested: user={} device={device} cmd={command}",
            caller.identity
        );

        let record = self
            .inventory
            .resolve(device, caller)
            .await
            .ok_or_else(|| GatewayError::NotFound {
                device: device.to_string(),
            })?;

        let command = command.trim();
        if !READ_ONLY.is_match(command) {
            return Err(GatewayError::Rejected {
                reason: "only read-only 'show', 'ping' or 'traceroute' commands are allowed"
                    .to_string(),
            });
        }

        let mut scoped = self.pool.acquire(&record).await?;

        let raw = match scoped.execute(command).await {
            Ok(raw) => raw,
            Err(source) => {
                self.emit_audit(caller, device, command, "", None, false).await;
                return Err(GatewayError::ExecutionFailed {
                    device: device.to_string(),
                    source,
                });
            }
        };
        // Return the session to the pool before the post-processing steps.
        drop(scoped);

        let parsed = parser::try_parse(command, &raw, &record.platform);

        self.emit_audit(caller, device, command, &raw, parsed.as_ref(), true)
            .await;

        Ok(CommandResult { raw, parsed })
    }

    async fn emit_audit(
        &self,
        caller: &Caller,
        device: &str,
        command: &str,
        raw: &str,
        parsed: Option<&serde_json::Value>,
        ok: bool,
    ) {
        let event = AuditEvent {
            ts: Utc::now(),
            user: caller.identity.clone(),
            device: device.to_string(),
            command: command.to_string(),
            raw_len: raw.len(),
            has_json: parsed.is_some(),
            ok,
        };
        self.audit.record(&event, raw, parsed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditSink;
    use crate::config::GatewayConfig;
    use crate::transport::mock::MockFactory;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::Mutex;
    use std::sync::atomic::Ordering;

    const INVENTORY: &str = "\
devices:
  - hostname: r1
    host: 10.0.0.1
    platform: iosxe
    username: admin
    password: secret
    tags: [lab]
  - hostname: sw1
    host: 10.0.0.2
    platform: nxos
    username: admin
    password: secret
    tags: [prod]
";

    const IP_INT_BRIEF: &str = "\
Interface              IP-Address      OK? Method Status                Protocol
GigabitEthernet1       10.0.0.1        YES NVRAM  up                    up
GigabitEthernet2       10.0.0.2        YES NVRAM  up                    up
";

    /// Sink capturing appended lines; optionally failing every write.
    #[derive(Clone)]
    struct MemorySink {
        lines: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl MemorySink {
        fn new() -> Self {
            Self {
                lines: Arc::new(Mutex::new(Vec::new())),
                fail: false,
            }
        }

        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.lines.lock().unwrap())
        }
    }

    #[async_trait]
    impl AuditSink for MemorySink {
        async fn append(&self, line: &str) -> std::io::Result<()> {
            if self.fail {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "sink down"));
            }
            self.lines.lock().unwrap().push(line.to_string());
            Ok(())
        }
    }

    struct Fixture {
        executor: CommandExecutor,
        factory: Arc<MockFactory>,
        sink: MemorySink,
        _dir: tempfile::TempDir,
    }

    async fn fixture(factory: MockFactory, sink: MemorySink) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(INVENTORY.as_bytes()).unwrap();

        let inventory = Arc::new(InventoryStore::open(&path).await.unwrap());
        let factory = Arc::new(factory);
        let pool = Arc::new(SessionPool::new(
            GatewayConfig::default(),
            Arc::clone(&factory) as _,
        ));
        let audit = Arc::new(AuditRecorder::with_sink(Box::new(sink.clone())));

        Fixture {
            executor: CommandExecutor::new(inventory, pool, audit),
            factory,
            sink,
            _dir: dir,
        }
    }

    fn lab_caller() -> Caller {
        Caller {
            identity: "alice".to_string(),
            roles: vec![],
            tags: vec!["lab".to_string()],
        }
    }

    #[tokio::test]
    async fn test_rejected_before_any_network_io() {
        let fx = fixture(MockFactory::returning("ok"), MemorySink::new()).await;

        for cmd in ["reload", "configure terminal", "  delete flash:  ", "showicide"] {
            let err = fx.executor.run("r1", cmd, &lab_caller()).await.err().unwrap();
            assert!(matches!(err, GatewayError::Rejected { .. }), "cmd: {cmd}");
        }
        assert_eq!(fx.factory.attempts.load(Ordering::SeqCst), 0);
        assert!(fx.sink.take().is_empty());
    }

    #[tokio::test]
    async fn test_allow_list_is_case_insensitive_and_trims() {
        let fx = fixture(MockFactory::returning("ok"), MemorySink::new()).await;

        for cmd in ["  SHOW version ", "Ping 10.0.0.1", "traceroute 10.0.0.1"] {
            assert!(fx.executor.run("r1", cmd, &lab_caller()).await.is_ok(), "cmd: {cmd}");
        }
    }

    #[tokio::test]
    async fn test_unknown_and_unauthorized_look_identical() {
        let fx = fixture(MockFactory::returning("ok"), MemorySink::new()).await;

        let missing = fx.executor.run("nope", "show version", &lab_caller()).await;
        let hidden = fx.executor.run("sw1", "show version", &lab_caller()).await;
        assert!(matches!(missing, Err(GatewayError::NotFound { .. })));
        assert!(matches!(hidden, Err(GatewayError::NotFound { .. })));
        assert_eq!(fx.factory.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_with_structured_parse() {
        let fx = fixture(MockFactory::returning(IP_INT_BRIEF), MemorySink::new()).await;

        let result = fx
            .executor
            .run("r1", "show ip int brief", &lab_caller())
            .await
            .unwrap();

        assert_eq!(result.raw, IP_INT_BRIEF);
        let parsed = result.parsed.unwrap();
        assert_eq!(parsed["interfaces"].as_array().unwrap().len(), 2);

        let lines = fx.sink.take();
        assert_eq!(lines.len(), 1);
        let record: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record["user"], "alice");
        assert_eq!(record["device"], "r1");
        assert_eq!(record["has_json"], true);
        assert_eq!(record["ok"], true);
        assert_eq!(record["raw_len"], IP_INT_BRIEF.len());
        assert_eq!(record["stdout"], IP_INT_BRIEF);
    }

    #[tokio::test]
    async fn test_unparsed_output_still_returns_raw() {
        let fx = fixture(MockFactory::returning("IOS XE Software"), MemorySink::new()).await;

        let result = fx.executor.run("r1", "show version", &lab_caller()).await.unwrap();
        assert_eq!(result.raw, "IOS XE Software");
        assert!(result.parsed.is_none());

        let lines = fx.sink.take();
        let record: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record["has_json"], false);
    }

    #[tokio::test]
    async fn test_execution_failure_is_typed_and_audited() {
        let fx = fixture(MockFactory::returning("ok"), MemorySink::new()).await;
        fx.factory.fail_next_send.store(true, Ordering::SeqCst);

        let err = fx
            .executor
            .run("r1", "show version", &lab_caller())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GatewayError::ExecutionFailed { .. }));

        let lines = fx.sink.take();
        assert_eq!(lines.len(), 1);
        let record: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record["ok"], false);
        assert_eq!(record["raw_len"], 0);
    }

    #[tokio::test]
    async fn test_audit_sink_failure_does_not_change_result() {
        let mut sink = MemorySink::new();
        sink.fail = true;
        let fx = fixture(MockFactory::returning("output"), sink).await;

        let result = fx.executor.run("r1", "show version", &lab_caller()).await.unwrap();
        assert_eq!(result.raw, "output");
    }

    #[tokio::test]
    async fn test_connection_failure_has_no_audit_event() {
        let mut factory = MockFactory::returning("ok");
        factory.reject_ssh = true;
        factory.reject_telnet = true;
        let fx = fixture(factory, MemorySink::new()).await;

        let err = fx
            .executor
            .run("r1", "show version", &lab_caller())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GatewayError::ConnectionFailed { .. }));
        assert!(fx.sink.take().is_empty());
    }
}
