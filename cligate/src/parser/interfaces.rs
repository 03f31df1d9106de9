//! Parser for `show ip interface brief`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^Interface\s+IP-Address\s+OK\?\s+Method\s+Status\s+Protocol").unwrap()
});

/// One data row of the interface-brief table.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct InterfaceEntry {
    pub interface: String,
    pub ip_address: String,
    pub ok: String,
    pub method: String,
    pub status: String,
    pub protocol: String,
}

#[derive(Debug, Serialize)]
struct InterfaceBrief {
    interfaces: Vec<InterfaceEntry>,
}

/// Split the table under the header line into six-column records.
///
/// Lines that do not yield at least six whitespace-delimited fields are
/// skipped, not errored; a missing header yields an empty structure, not an
/// error.
pub(super) fn parse_ip_int_brief(raw: &str, _platform: &str) -> Option<serde_json::Value> {
    let lines: Vec<&str> = raw.lines().collect();
    let Some(header_idx) = lines.iter().position(|line| HEADER.is_match(line)) else {
        return Some(serde_json::Value::Object(serde_json::Map::new()));
    };

    let mut interfaces = Vec::new();
    for line in &lines[header_idx + 1..] {
        if line.trim().is_empty() {
            continue;
        }
        // Status may be multi-word ("administratively down"), so split from
        // the right is wrong; cap at six fields from the left instead.
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 6 {
            continue;
        }
        let protocol = parts[parts.len() - 1];
        let status = parts[4..parts.len() - 1].join(" ");
        interfaces.push(InterfaceEntry {
            interface: parts[0].to_string(),
            ip_address: parts[1].to_string(),
            ok: parts[2].to_string(),
            method: parts[3].to_string(),
            status,
            protocol: protocol.to_string(),
        });
    }

    serde_json::to_value(InterfaceBrief { interfaces }).ok()
}
