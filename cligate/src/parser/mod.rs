//! Best-effort structured parsing of raw CLI output.
//!
//! Parsers are pure functions registered by command prefix. Parsing is
//! always optional: no parser registered, or output the parser cannot make
//! sense of, degrades to `None` and the raw text stands alone. Nothing here
//! performs I/O or panics past the boundary.

mod interfaces;

use log::debug;

/// A registered parser: command prefix plus the parse function. Parsers are
/// platform-agnostic unless they branch on the platform themselves.
type ParserFn = fn(raw: &str, platform: &str) -> Option<serde_json::Value>;

static PARSERS: &[(&str, ParserFn)] = &[("show ip int brief", interfaces::parse_ip_int_brief)];

/// Try to parse `raw` output of `command` into structured JSON.
///
/// Lookup is by normalized (trimmed, lowercased) command prefix. Returns
/// `None` when no parser matches or the registered parser cannot handle the
/// output.
pub fn try_parse(command: &str, raw: &str, platform: &str) -> Option<serde_json::Value> {
    let normalized = command.trim().to_ascii_lowercase();

    for (prefix, parse) in PARSERS {
        if normalized.starts_with(prefix) {
            return parse(raw, platform);
        }
    }

    debug!("No parser for command '{normalized}' on platform {platform}");
    None
}
