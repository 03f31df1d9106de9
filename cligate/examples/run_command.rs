//! Basic example: run a read-only command through the gateway.
//!
//! # Prerequisites
//!
//! - An `inventory.yaml` listing at least one reachable device
//! - Network access to that device over SSH or Telnet
//!
//! # Usage
//!
//! ```bash
//! cargo run --example run_command -- r1 "show ip int brief"
//! ```
//!
//! The inventory path defaults to `inventory.yaml` and can be overridden
//! with `CLIGATE_INVENTORY`; the audit log with `CLIGATE_AUDIT_LOG`.

use std::env;

use cligate::{Caller, GatewayBuilder};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (set RUST_LOG=debug for verbose output)
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = env::args().skip(1);
    let (Some(device), Some(command)) = (args.next(), args.next()) else {
        eprintln!("Usage: run_command <device> <command>");
        std::process::exit(1);
    };

    let gateway = GatewayBuilder::from_env().build().await?;

    // In production the external authorizer supplies this per request.
    let caller = Caller {
        identity: whoami(),
        roles: vec!["admin".to_string()],
        tags: vec![],
    };

    let result = gateway.run_command(&device, &command, &caller).await?;

    println!("{}", result.raw);
    if let Some(parsed) = result.parsed {
        println!("--- structured ---");
        println!("{}", serde_json::to_string_pretty(&parsed)?);
    }

    Ok(())
}

fn whoami() -> String {
    env::var("USER").unwrap_or_else(|_| "example".to_string())
}
