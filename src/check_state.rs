//! Maps raw Icinga/Nagios result codes to semantic check states

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::types::ObjectType;

/// Closed set of states a monitored object can resolve to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Ok,
    Warning,
    Critical,
    Unknown,
    Up,
    Down,
}

const SERVICE_STATES: [CheckState; 4] = [
    CheckState::Ok,
    CheckState::Warning,
    CheckState::Critical,
    CheckState::Unknown,
];

const HOST_STATES: [CheckState; 2] = [CheckState::Up, CheckState::Down];

impl CheckState {
    /// All severities an object type can resolve to
    pub fn severities(object_type: ObjectType) -> &'static [CheckState] {
        match object_type {
            ObjectType::Service => &SERVICE_STATES,
            ObjectType::Host => &HOST_STATES,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CheckState::Ok => "ok",
            CheckState::Warning => "warning",
            CheckState::Critical => "critical",
            CheckState::Unknown => "unknown",
            CheckState::Up => "up",
            CheckState::Down => "down",
        }
    }

    /// Healthy states (ok for services, up for hosts)
    pub fn is_healthy(&self) -> bool {
        matches!(self, CheckState::Ok | CheckState::Up)
    }
}

impl fmt::Display for CheckState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a raw result code for the given object type
///
/// Hosts only distinguish up (0) from down (anything else).
pub fn resolve(object_type: ObjectType, result_code: i64) -> CheckState {
    match (object_type, result_code) {
        (ObjectType::Service, 0) => CheckState::Ok,
        (ObjectType::Service, 1) => CheckState::Warning,
        (ObjectType::Service, 2) => CheckState::Critical,
        (ObjectType::Service, code) => {
            if code != 3 {
                debug!(code, "Unexpected service result code, treating as unknown");
            }
            CheckState::Unknown
        }
        (ObjectType::Host, 0) => CheckState::Up,
        (ObjectType::Host, code) => {
            if code != 1 {
                debug!(code, "Unexpected host result code, treating as down");
            }
            CheckState::Down
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_codes() {
        assert_eq!(resolve(ObjectType::Service, 0), CheckState::Ok);
        assert_eq!(resolve(ObjectType::Service, 1), CheckState::Warning);
        assert_eq!(resolve(ObjectType::Service, 2), CheckState::Critical);
        assert_eq!(resolve(ObjectType::Service, 3), CheckState::Unknown);
        assert_eq!(resolve(ObjectType::Service, 99), CheckState::Unknown);
        assert_eq!(resolve(ObjectType::Service, -1), CheckState::Unknown);
    }

    #[test]
    fn test_host_codes() {
        assert_eq!(resolve(ObjectType::Host, 0), CheckState::Up);
        assert_eq!(resolve(ObjectType::Host, 1), CheckState::Down);
        assert_eq!(resolve(ObjectType::Host, 2), CheckState::Down);
        assert_eq!(resolve(ObjectType::Host, i64::MAX), CheckState::Down);
    }

    #[test]
    fn test_resolve_stays_inside_severity_set() {
        for object_type in [ObjectType::Service, ObjectType::Host] {
            for code in -2..10 {
                let state = resolve(object_type, code);
                assert!(CheckState::severities(object_type).contains(&state));
            }
        }
    }

    #[test]
    fn test_display_matches_serde() {
        for state in SERVICE_STATES.iter().chain(HOST_STATES.iter()) {
            let json = serde_json::to_string(state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }
}
