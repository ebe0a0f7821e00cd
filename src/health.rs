//! Pass/fail verdict per drive from its merged state and health fields.

use crate::models::drive::{DriveRecord, UNKNOWN};

/// Operational states (first word, case-insensitive) that count as healthy.
const GOOD_STATES: &[&str] = &["active", "online", "onln", "ready", UNKNOWN];

/// Health verdicts that count as healthy. `0` is a zero predictive-failure
/// or defect count as reported by controllers.
const GOOD_HEALTH: &[&str] = &["ok", "passed", "0", UNKNOWN];

pub fn is_okay(drive: &DriveRecord, known_bad: &[String]) -> bool {
    if known_bad.iter().any(|b| b == &drive.id) {
        return false;
    }
    state_ok(drive.state.as_deref()) && health_ok(drive.health.as_deref())
}

fn state_ok(state: Option<&str>) -> bool {
    let word = state
        .and_then(|s| s.split_whitespace().next())
        .unwrap_or(UNKNOWN)
        .to_ascii_lowercase();
    GOOD_STATES.contains(&word.as_str())
}

fn health_ok(health: Option<&str>) -> bool {
    let h = health.map(str::trim).filter(|h| !h.is_empty()).unwrap_or(UNKNOWN);
    GOOD_HEALTH.iter().any(|g| g.eq_ignore_ascii_case(h))
}
