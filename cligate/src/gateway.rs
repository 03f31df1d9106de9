//! Gateway facade and builder.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::audit::AuditRecorder;
use crate::config::GatewayConfig;
use crate::error::Result;
use crate::executor::{CommandExecutor, CommandResult};
use crate::inventory::{Caller, DevicePublic, InventoryStore};
use crate::pool::SessionPool;
use crate::transport::{NetworkFactory, TransportFactory};

/// Builder for constructing a [`Gateway`].
///
/// # Example
///
/// ```rust,no_run
/// use cligate::{Caller, GatewayBuilder};
///
/// # async fn example() -> Result<(), cligate::GatewayError> {
/// let gateway = GatewayBuilder::new("inventory.yaml")
///     .audit_log("audit.log")
///     .command_timeout(std::time::Duration::from_secs(20))
///     .build()
///     .await?;
///
/// let caller = Caller {
///     identity: "alice".into(),
///     roles: vec![],
///     tags: vec!["lab".into()],
/// };
/// let result = gateway.run_command("r1", "show ip int brief", &caller).await?;
/// println!("{}", result.raw);
/// # Ok(())
/// # }
/// ```
pub struct GatewayBuilder {
    inventory_path: PathBuf,
    audit_path: PathBuf,
    config: GatewayConfig,
    factory: Option<Arc<dyn TransportFactory>>,
}

impl GatewayBuilder {
    /// Create a builder for the given inventory file. The audit log
    /// defaults to `audit.log` (or `CLIGATE_AUDIT_LOG` when set).
    pub fn new(inventory_path: impl Into<PathBuf>) -> Self {
        let audit_path = std::env::var("CLIGATE_AUDIT_LOG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("audit.log"));
        Self {
            inventory_path: inventory_path.into(),
            audit_path,
            config: GatewayConfig::default(),
            factory: None,
        }
    }

    /// Builder using the `CLIGATE_INVENTORY` environment variable for the
    /// inventory path, defaulting to `inventory.yaml`.
    pub fn from_env() -> Self {
        let inventory = std::env::var("CLIGATE_INVENTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("inventory.yaml"));
        Self::new(inventory)
    }

    /// Set the durable audit log path.
    pub fn audit_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_path = path.into();
        self
    }

    /// Set the socket connect + negotiation timeout per transport attempt.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the per-command execution timeout.
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = timeout;
        self
    }

    /// Set how long an idle cached session stays reusable.
    pub fn max_idle(mut self, max_idle: Duration) -> Self {
        self.config.max_idle = max_idle;
        self
    }

    /// Substitute the transport factory. Intended for tests and embedders
    /// with their own transports.
    pub fn transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Load the inventory and build the gateway.
    ///
    /// This is the only point where inventory errors are fatal; after a
    /// successful first load, a broken inventory edit keeps the
    /// last-known-good table serving.
    pub async fn build(self) -> Result<Gateway> {
        let inventory = Arc::new(InventoryStore::open(self.inventory_path).await?);
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(NetworkFactory) as Arc<dyn TransportFactory>);
        let pool = Arc::new(SessionPool::new(self.config, factory));
        let audit = Arc::new(AuditRecorder::new(self.audit_path));

        Ok(Gateway {
            inventory: Arc::clone(&inventory),
            executor: CommandExecutor::new(inventory, pool, audit),
        })
    }
}

/// The assembled gateway: inventory, pool, executor and audit behind the
/// two operations the (external) HTTP layer calls.
pub struct Gateway {
    inventory: Arc<InventoryStore>,
    executor: CommandExecutor,
}

impl Gateway {
    /// Run a read-only command on a named device for a caller.
    pub async fn run_command(
        &self,
        device: &str,
        command: &str,
        caller: &Caller,
    ) -> Result<CommandResult> {
        self.executor.run(device, command, caller).await
    }

    /// List the devices visible to a caller, credentials stripped.
    pub async fn list_devices(&self, caller: &Caller) -> Vec<DevicePublic> {
        self.inventory.list(caller).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_build_fails_on_missing_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let result = GatewayBuilder::new(dir.path().join("absent.yaml"))
            .audit_log(dir.path().join("audit.log"))
            .build()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_list_devices_through_facade() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(
            b"devices:\n  - {hostname: r1, host: 10.0.0.1, platform: iosxe, tags: [lab]}\n",
        )
        .unwrap();

        let gateway = GatewayBuilder::new(&path)
            .audit_log(dir.path().join("audit.log"))
            .build()
            .await
            .unwrap();

        let caller = Caller {
            identity: "alice".to_string(),
            roles: vec![],
            tags: vec!["lab".to_string()],
        };
        let devices = gateway.list_devices(&caller).await;
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].hostname, "r1");
    }
}
