//! Platform driver mapping.
//!
//! Each inventory platform identifier maps to a driver family entry that
//! carries the prompt pattern used for CLI scraping and the transport
//! fallback policy for that family. Selection is a lookup table, not
//! inheritance; unknown platforms are rejected at inventory load time.

use once_cell::sync::Lazy;
use regex::bytes::Regex;

/// Driver table entry for one platform family.
#[derive(Debug, Clone, Copy)]
pub struct PlatformSpec {
    /// Inventory platform identifier (lowercase).
    pub name: &'static str,

    /// Driver family, e.g. `cisco_ios`.
    pub driver: &'static str,

    /// Regex matching this family's CLI prompt at end of output.
    pub prompt: &'static str,

    /// Classic IOS boxes sometimes run without an SSH daemon; for those
    /// families a failed SSH attempt falls back to Telnet.
    pub telnet_fallback: bool,
}

/// Built-in platform table. Mirrors the supported inventory platforms.
static PLATFORMS: &[PlatformSpec] = &[
    PlatformSpec {
        name: "ios",
        driver: "cisco_ios",
        prompt: r"[>#]\s*$",
        telnet_fallback: true,
    },
    PlatformSpec {
        name: "iosxe",
        driver: "cisco_ios",
        prompt: r"[>#]\s*$",
        telnet_fallback: true,
    },
    PlatformSpec {
        name: "iosxr",
        driver: "cisco_xr",
        prompt: r"[>#]\s*$",
        telnet_fallback: false,
    },
    PlatformSpec {
        name: "nxos",
        driver: "cisco_nxos",
        prompt: r"[>#]\s*$",
        telnet_fallback: false,
    },
    PlatformSpec {
        name: "asa",
        driver: "cisco_asa",
        prompt: r"[>#]\s*$",
        telnet_fallback: false,
    },
];

/// Fallback prompt pattern when a platform pattern fails to compile.
static DEFAULT_PROMPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[$#>]\s*$").unwrap());

/// The generic shell prompt pattern.
pub fn default_prompt() -> Regex {
    DEFAULT_PROMPT.clone()
}

impl PlatformSpec {
    /// Compile this family's prompt pattern, falling back to the generic
    /// shell prompt pattern on compile failure.
    pub fn prompt_pattern(&self) -> Regex {
        Regex::new(self.prompt).unwrap_or_else(|_| DEFAULT_PROMPT.clone())
    }
}

/// Look up a platform by its inventory identifier (case-insensitive).
pub fn lookup(platform: &str) -> Option<&'static PlatformSpec> {
    let lowered = platform.to_ascii_lowercase();
    PLATFORMS.iter().find(|spec| spec.name == lowered)
}

/// Whether `platform` is a known inventory platform identifier.
pub fn is_supported(platform: &str) -> bool {
    lookup(platform).is_some()
}
