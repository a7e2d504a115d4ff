use std::sync::LazyLock;

use regex::Regex;

use super::catalog::{self, CatalogEntry};
use crate::models::Attributes;

/// Matches Suntech diagnostic encodings of an alert id: `33`, `033`, `ALT33`, `alert_33`, `Alert:33`.
static SUNTECH_DIAGNOSTIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:alt|alert|evt|event|alm|alarm)?[\s_:\-]*0*(\d{1,3})\s*$").unwrap()
});

/// Payload keys that may carry the alert id when the event code itself does not.
const DIAGNOSTIC_KEYS: &[&str] = &["alert", "alertId", "alertType", "event", "alarm"];

/// Canonical protocol key. Vendor model names map onto their protocol family.
pub fn normalize_protocol(protocol: &str) -> String {
    let key = protocol.trim().to_lowercase();
    let canonical = match key.as_str() {
        "st300" | "st310" | "st340" | "st4300" | "st4340" | "st8300" | "suntech" => "suntech",
        "gt06" | "gt06n" | "concox" | "jimi" => "gt06",
        "teltonika" | "fmb920" | "fmb120" | "fmc130" => "teltonika",
        "osmand" | "traccar-client" => "osmand",
        "" => "unknown",
        _ => return key,
    };
    canonical.to_string()
}

/// Canonical event code: the catalog spelling when known, else the trimmed raw code in lowercase.
pub fn normalize_code(protocol: &str, raw_code: &str) -> String {
    let code = raw_code.trim();
    if code.is_empty() {
        return "unknown".to_string();
    }
    if let Some(known) = catalog::lookup(protocol, code) {
        return known.code.to_string();
    }
    if protocol == "suntech" && code.bytes().all(|b| b.is_ascii_digit()) {
        let stripped = code.trim_start_matches('0');
        return if stripped.is_empty() { "0" } else { stripped }.to_string();
    }
    code.to_lowercase()
}

/// Recover a Suntech catalog entry from a diagnostic representation of the code
/// or from the alert id carried in the payload.
pub fn recover_diagnostic_code(
    raw_code: &str,
    payload: &Attributes,
) -> Option<&'static CatalogEntry> {
    let from_payload = DIAGNOSTIC_KEYS
        .iter()
        .filter_map(|key| payload.get(key))
        .map(|value| value.to_text());

    std::iter::once(raw_code.to_string())
        .chain(from_payload)
        .filter_map(|candidate| {
            SUNTECH_DIAGNOSTIC_RE
                .captures(&candidate)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
        .find_map(|id| catalog::lookup("suntech", &id))
}
