//! Inventory record and caller types.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::platform::{self, PlatformSpec};

/// Complete view of one network device row in the inventory file.
///
/// Immutable once loaded; a reload supersedes the whole table rather than
/// mutating records in place. The password never appears in `Debug` output
/// (`SecretString` redacts it) and is only exposed at transport connect.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceRecord {
    /// Logical name used in gateway calls; unique inventory key.
    pub hostname: String,

    /// DNS name or management IP.
    pub host: String,

    /// Platform identifier, e.g. `ios`, `iosxe`, `nxos`.
    pub platform: String,

    /// Login username. Absent for credential-less console access.
    #[serde(default)]
    pub username: Option<String>,

    /// Login password. Absent for credential-less console access.
    #[serde(default)]
    pub password: Option<SecretString>,

    /// TCP port override. When absent the transport picks its default
    /// (22 for SSH, 23 for Telnet).
    #[serde(default)]
    pub port: Option<u16>,

    /// Access tags matched against the caller's tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DeviceRecord {
    /// Whether a username/password pair is configured. Devices without one
    /// are assumed to be console servers reachable over Telnet first.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Driver table entry for this record's platform.
    ///
    /// Inventory load rejects unknown platforms, so this only returns
    /// `None` for records constructed outside the store.
    pub fn platform_spec(&self) -> Option<&'static PlatformSpec> {
        platform::lookup(&self.platform)
    }

    /// Whether `caller` may see (and therefore use) this device: global
    /// admin role, or a non-empty intersection of access tags.
    pub fn visible_to(&self, caller: &Caller) -> bool {
        if caller.has_role("admin") {
            return true;
        }
        self.tags.iter().any(|tag| caller.tags.iter().any(|t| t == tag))
    }

    /// Credential-stripped view safe to serialize outward.
    pub fn public(&self) -> DevicePublic {
        DevicePublic {
            hostname: self.hostname.clone(),
            host: self.host.clone(),
            platform: self.platform.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Subset of [`DeviceRecord`] safe for listings and API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePublic {
    pub hostname: String,
    pub host: String,
    pub platform: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Authenticated caller context, supplied per request by the external
/// authorizer. The gateway trusts it as already authenticated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caller {
    /// Caller username or service account id.
    pub identity: String,

    /// Global roles, e.g. `admin`.
    #[serde(default)]
    pub roles: Vec<String>,

    /// Access tags; a device is visible if any tag matches.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Caller {
    /// Build a caller with identity only (no roles, no tags).
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            roles: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Whether the caller holds a global role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
