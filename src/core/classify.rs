// LogTally - core/classify.rs
//
// Coarse user-agent classification. Pure, total, deterministic.
//
// Each dimension is an ordered rule table: the first token found in the raw
// string (case-sensitive substring) decides the label. Order is significant:
// Chrome user agents also advertise "Safari", so Chrome must be tested first.

use crate::core::model::UserAgentLabels;

pub const UNKNOWN_OS: &str = "Unknown OS";
pub const UNKNOWN_BROWSER: &str = "Unknown Browser";
pub const DEFAULT_DEVICE_TYPE: &str = "Desktop";

/// (token, label) pairs checked in order.
type RuleTable = &'static [(&'static str, &'static str)];

const OS_RULES: RuleTable = &[
    ("Windows", "Windows"),
    ("Macintosh", "macOS"),
    ("Linux", "Linux"),
];

const BROWSER_RULES: RuleTable = &[
    ("Chrome", "Chrome"),
    ("Firefox", "Firefox"),
    ("Safari", "Safari"),
];

const DEVICE_RULES: RuleTable = &[("Mobile", "Mobile"), ("Tablet", "Tablet")];

/// Derive OS, browser and device-type labels from a raw user-agent string.
pub fn classify(raw: &str) -> UserAgentLabels {
    UserAgentLabels {
        os: first_match(raw, OS_RULES, UNKNOWN_OS),
        browser: first_match(raw, BROWSER_RULES, UNKNOWN_BROWSER),
        device_type: first_match(raw, DEVICE_RULES, DEFAULT_DEVICE_TYPE),
    }
}

fn first_match(raw: &str, rules: RuleTable, default: &'static str) -> &'static str {
    rules
        .iter()
        .find(|&&(token, _)| raw.contains(token))
        .map_or(default, |&(_, label)| label)
}
