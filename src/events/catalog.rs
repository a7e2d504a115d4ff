//! Static per-protocol catalog of known event codes.

use crate::models::Severity;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogEntry {
    pub code: &'static str,
    pub label: &'static str,
    pub severity: Severity,
    /// `None` falls through to the security/logistics default.
    pub category: Option<&'static str>,
    pub requires_handling: bool,
}

const fn entry(
    code: &'static str,
    label: &'static str,
    severity: Severity,
    category: Option<&'static str>,
    requires_handling: bool,
) -> CatalogEntry {
    CatalogEntry {
        code,
        label,
        severity,
        category,
        requires_handling,
    }
}

use Severity::{Critical, Info, Warning};

const SECURITY: Option<&str> = Some("Security");
const LOGISTICS: Option<&str> = Some("Logistics");
const DRIVING: Option<&str> = Some("Driving");
const MAINTENANCE: Option<&str> = Some("Maintenance");

/// Suntech ST300/ST4x0 alert ids.
static SUNTECH: &[CatalogEntry] = &[
    entry("1", "Overspeed start", Warning, DRIVING, false),
    entry("2", "Overspeed end", Info, DRIVING, false),
    entry("3", "GPS antenna disconnected", Critical, None, true),
    entry("4", "GPS antenna reconnected", Info, None, false),
    entry("5", "Geofence exit", Warning, LOGISTICS, false),
    entry("6", "Geofence entry", Info, LOGISTICS, false),
    entry("8", "GPS antenna short circuit", Critical, SECURITY, true),
    entry("9", "Deep sleep entered", Info, MAINTENANCE, false),
    entry("10", "Deep sleep exited", Info, MAINTENANCE, false),
    entry("13", "Backup battery error", Warning, MAINTENANCE, false),
    entry("14", "Vehicle battery low", Warning, MAINTENANCE, false),
    entry("15", "Shock detected", Warning, None, false),
    entry("16", "Collision detected", Critical, SECURITY, true),
    entry("18", "Route deviation", Warning, LOGISTICS, false),
    entry("19", "Route re-entered", Info, LOGISTICS, false),
    entry("33", "Ignition on", Info, LOGISTICS, false),
    entry("34", "Ignition off", Info, LOGISTICS, false),
    entry("40", "Main power disconnected", Critical, None, true),
    entry("41", "Main power reconnected", Info, None, false),
    entry("44", "Backup battery connected", Info, MAINTENANCE, false),
    entry("45", "Backup battery disconnected", Warning, MAINTENANCE, false),
    entry("46", "Harsh acceleration", Warning, DRIVING, false),
    entry("47", "Harsh braking", Warning, DRIVING, false),
    entry("48", "Sharp turn", Warning, DRIVING, false),
    entry("50", "Jamming detected", Critical, None, true),
    entry("73", "Panic button", Critical, SECURITY, true),
];

static GT06: &[CatalogEntry] = &[
    entry("sos", "SOS", Critical, SECURITY, true),
    entry("powerCut", "Power cut", Critical, None, true),
    entry("lowBattery", "Low battery", Warning, MAINTENANCE, false),
    entry("vibration", "Vibration", Warning, None, false),
    entry("overspeed", "Overspeed", Warning, DRIVING, false),
    entry("geofenceEnter", "Geofence entry", Info, LOGISTICS, false),
    entry("geofenceExit", "Geofence exit", Warning, LOGISTICS, false),
    entry("movement", "Movement", Info, None, false),
    entry("tampering", "Tampering", Critical, None, true),
    entry("ignitionOn", "Ignition on", Info, LOGISTICS, false),
    entry("ignitionOff", "Ignition off", Info, LOGISTICS, false),
];

static TELTONIKA: &[CatalogEntry] = &[
    entry("sos", "SOS", Critical, SECURITY, true),
    entry("powerCut", "External power removed", Critical, None, true),
    entry("jamming", "GSM jamming", Critical, None, true),
    entry("accident", "Crash detected", Critical, SECURITY, true),
    entry("hardBraking", "Harsh braking", Warning, DRIVING, false),
    entry("hardAcceleration", "Harsh acceleration", Warning, DRIVING, false),
    entry("hardCornering", "Harsh cornering", Warning, DRIVING, false),
    entry("overspeed", "Overspeed", Warning, DRIVING, false),
    entry("idle", "Excessive idling", Info, LOGISTICS, false),
    entry("towing", "Towing detected", Critical, None, true),
    entry("ignitionOn", "Ignition on", Info, LOGISTICS, false),
    entry("ignitionOff", "Ignition off", Info, LOGISTICS, false),
];

static OSMAND: &[CatalogEntry] = &[
    entry("sos", "SOS", Critical, SECURITY, true),
    entry("lowBattery", "Low battery", Warning, MAINTENANCE, false),
    entry("geofenceEnter", "Geofence entry", Info, LOGISTICS, false),
    entry("geofenceExit", "Geofence exit", Warning, LOGISTICS, false),
    entry("deviceOverspeed", "Overspeed", Warning, DRIVING, false),
];

/// Codes that default to the Security category when nothing else assigns one.
static SECURITY_CODES: &[&str] = &[
    "3", "8", "16", "40", "50", "73", "sos", "panic", "powerCut", "tampering", "jamming",
    "removing", "door", "towing", "accident", "vibration", "movement",
];

pub const PROTOCOLS: &[&str] = &["suntech", "gt06", "teltonika", "osmand"];

/// Catalog entries for a normalized protocol key; empty for unknown protocols.
pub fn entries(protocol: &str) -> &'static [CatalogEntry] {
    match protocol {
        "suntech" => SUNTECH,
        "gt06" => GT06,
        "teltonika" => TELTONIKA,
        "osmand" => OSMAND,
        _ => &[],
    }
}

/// Case-insensitive code lookup.
pub fn lookup(protocol: &str, code: &str) -> Option<&'static CatalogEntry> {
    entries(protocol)
        .iter()
        .find(|e| e.code.eq_ignore_ascii_case(code))
}

pub fn default_category(code: &str) -> &'static str {
    if SECURITY_CODES.iter().any(|c| c.eq_ignore_ascii_case(code)) {
        "Security"
    } else {
        "Logistics"
    }
}
