//! Extraction of the dev-server port and cache database index from project files.
//!
//! Everything here works on text or JSON that has already been read. A value
//! that is missing, malformed or out of range is reported as `None`; callers
//! fall back to the next candidate or to allocation.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// `package.json` scripts inspected for a port, in order.
pub const PORT_SCRIPTS: [&str; 3] = ["dev", "start", "serve"];

/// Environment keys holding the cache database index.
pub const CACHE_DB_KEYS: [&str; 2] = ["REDIS_DB=", "REDIS_CACHE_DB="];

/// Port sniffing rules applied to a script command, first match wins.
///
/// New dev-tool conventions only need a new entry here.
const PORT_RULES: &[(&str, &str)] = &[
    ("next-dev", r"(?i)next\s+dev.*?-p\s*(\d+)"),
    ("short-flag", r"(?i)-p\s*(\d+)"),
    ("long-flag", r"(?i)--port[\s=]*(\d+)"),
    ("env-assignment", r"(?i)PORT=(\d+)"),
];

struct PortRule {
    name: &'static str,
    regex: Regex,
}

static RULES: OnceLock<Vec<PortRule>> = OnceLock::new();

fn port_rules() -> &'static [PortRule] {
    RULES.get_or_init(|| {
        PORT_RULES
            .iter()
            .map(|&(name, pattern)| PortRule {
                name,
                regex: Regex::new(pattern).expect("port rule patterns are valid"),
            })
            .collect()
    })
}

/// Validate a raw port number, rejecting anything outside 1-65535.
#[must_use]
pub fn valid_port(raw: u64) -> Option<u16> {
    u16::try_from(raw).ok().filter(|port| *port >= 1)
}

/// Find a port number in a single script command.
///
/// Returns the raw captured number of the first rule that matches; it has
/// not been range-checked yet.
#[must_use]
pub fn port_from_command(command: &str) -> Option<u64> {
    for rule in port_rules() {
        let Some(captures) = rule.regex.captures(command) else {
            continue;
        };

        if let Some(port) = captures.get(1).and_then(|m| m.as_str().parse().ok()) {
            debug!("Found port {port} in `{command}` using rule {}", rule.name);
            return Some(port);
        }
    }

    None
}

/// Extract the dev-server port from parsed `package.json` contents.
///
/// The `dev`, `start` and `serve` scripts are checked in that order and the
/// first one containing a port decides. Without a port in the scripts, a
/// Next.js project may still declare one under `config.port`.
#[must_use]
pub fn port_from_manifest(manifest: &Value) -> Option<u16> {
    let scripts = manifest.get("scripts").and_then(Value::as_object);

    if let Some(scripts) = scripts {
        for name in PORT_SCRIPTS {
            let Some(command) = scripts.get(name).and_then(Value::as_str) else {
                continue;
            };

            if let Some(raw) = port_from_command(command) {
                debug!("Found port {raw} in {name} script");
                return valid_port(raw);
            }
        }
    }

    let uses_next = manifest
        .get("dependencies")
        .and_then(Value::as_object)
        .is_some_and(|deps| deps.contains_key("next"));

    if !uses_next {
        return None;
    }

    let configured = manifest.get("config").and_then(|c| c.get("port"))?;
    let raw = match configured {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;

    debug!("Found port {raw} in Next.js config");
    valid_port(raw)
}

/// Extract the cache database index from `.env` contents.
///
/// The first `REDIS_DB=` or `REDIS_CACHE_DB=` line with a non-empty integer
/// value wins. Empty or malformed values are skipped.
#[must_use]
pub fn cache_db_from_env(content: &str) -> Option<u32> {
    for line in content.lines() {
        let line = line.trim();

        let Some(rest) = CACHE_DB_KEYS
            .iter()
            .find_map(|key| line.strip_prefix(key))
        else {
            continue;
        };

        let value = rest.split('=').next().unwrap_or_default().trim();
        if value.is_empty() {
            continue;
        }

        match value.parse() {
            Ok(index) => {
                debug!("Found cache database {index}");
                return Some(index);
            }
            Err(e) => debug!("Failed to parse cache database value {value:?}: {e}"),
        }
    }

    None
}
