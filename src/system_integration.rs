//! Host identification
//!
//! Tasks are scoped to the machine that created them. The owner key must stay
//! stable across restarts, so it is read from the OS rather than generated.

use std::path::Path;

const MACHINE_ID_PATHS: &[&str] = &["/etc/machine-id", "/var/lib/dbus/machine-id"];

const FALLBACK_OWNER_KEY: &str = "localhost";

/// Stable identifier for this installation.
pub fn machine_owner_key() -> String {
    MACHINE_ID_PATHS
        .iter()
        .find_map(|p| read_machine_id(Path::new(p)))
        .or_else(host_name)
        .unwrap_or_else(|| FALLBACK_OWNER_KEY.to_string())
}

fn read_machine_id(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_machine_id(&content)
}

/// First non-empty line, trimmed.
fn parse_machine_id(content: &str) -> Option<String> {
    content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

fn host_name() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}
