//! # cligate
//!
//! Authorized, read-only CLI command gateway for network devices.
//!
//! cligate sits between an authorized request and a live device shell. For
//! each request it resolves the device against a tag-filtered inventory,
//! validates the command against a read-only allow-list, acquires a pooled
//! SSH or Telnet session (opening one with transport failover if needed),
//! executes the command, attempts a best-effort structured parse of the
//! output and writes a durable audit record.
//!
//! The HTTP surface and token validation live outside this crate; callers
//! hand in an already-authenticated [`Caller`] and get back a
//! [`CommandResult`] or a typed [`GatewayError`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cligate::{Caller, GatewayBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cligate::GatewayError> {
//!     let gateway = GatewayBuilder::new("inventory.yaml")
//!         .audit_log("audit.log")
//!         .build()
//!         .await?;
//!
//!     let caller = Caller {
//!         identity: "alice".into(),
//!         roles: vec![],
//!         tags: vec!["lab".into()],
//!     };
//!
//!     let result = gateway
//!         .run_command("r1", "show ip int brief", &caller)
//!         .await?;
//!     println!("{}", result.raw);
//!     Ok(())
//! }
//! ```
//!
//! ## Guarantees
//!
//! - A command that fails the allow-list never reaches a device.
//! - A device invisible to the caller is indistinguishable from one that
//!   does not exist.
//! - At most one connection per device exists at any instant; acquisition
//!   is single-flight per hostname.
//! - A session that errors is purged, never handed to another caller.
//! - Audit emission never fails the command that triggered it.

pub mod audit;
pub mod config;
pub mod error;
pub mod executor;
pub mod gateway;
pub mod inventory;
pub mod parser;
pub mod platform;
pub mod pool;
pub mod transport;

// Re-export main types for convenience
pub use audit::{AuditEvent, AuditRecorder, AuditSink};
pub use config::GatewayConfig;
pub use error::{GatewayError, InventoryError, TransportError};
pub use executor::{CommandExecutor, CommandResult};
pub use gateway::{Gateway, GatewayBuilder};
pub use inventory::{Caller, DevicePublic, DeviceRecord, InventoryStore};
pub use pool::{ScopedSession, SessionPool};
pub use transport::{Transport, TransportFactory, TransportKind};
