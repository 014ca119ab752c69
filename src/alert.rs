//! Fire-once alerting per severity
//!
//! Polling runs on a fixed interval whether or not the monitored object
//! changed, so a sound is emitted only on the transition *into* a severity.
//! `AlertMemory` tracks which severity has already fired; firing one clears
//! all the others so a later return to an earlier severity alerts again.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::check_state::CheckState;
use crate::types::{CheckTarget, ObjectType};

/// One sound URL per severity. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoundSet {
    #[serde(rename = "okSound", default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<String>,
    #[serde(rename = "warningSound", default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(rename = "criticalSound", default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<String>,
    #[serde(rename = "unknownSound", default, skip_serializing_if = "Option::is_none")]
    pub unknown: Option<String>,
    #[serde(rename = "upSound", default, skip_serializing_if = "Option::is_none")]
    pub up: Option<String>,
    #[serde(rename = "downSound", default, skip_serializing_if = "Option::is_none")]
    pub down: Option<String>,
}

impl SoundSet {
    /// The bundled sounds served by the dashboard server
    pub fn bundled() -> Self {
        let path = |name: &str| {
            Some(format!("{}/{name}.mp3", crate::constants::dashboard::DEFAULT_SOUND_DIR))
        };
        Self {
            ok: path("ok"),
            warning: path("warning"),
            critical: path("critical"),
            unknown: path("unknown"),
            up: path("up"),
            down: path("down"),
        }
    }

    /// Wire name of the override for `state`, e.g. `criticalSound`
    pub fn option_key(state: CheckState) -> &'static str {
        match state {
            CheckState::Ok => "okSound",
            CheckState::Warning => "warningSound",
            CheckState::Critical => "criticalSound",
            CheckState::Unknown => "unknownSound",
            CheckState::Up => "upSound",
            CheckState::Down => "downSound",
        }
    }

    pub fn get(&self, state: CheckState) -> Option<&str> {
        let slot = match state {
            CheckState::Ok => &self.ok,
            CheckState::Warning => &self.warning,
            CheckState::Critical => &self.critical,
            CheckState::Unknown => &self.unknown,
            CheckState::Up => &self.up,
            CheckState::Down => &self.down,
        };
        slot.as_deref().filter(|url| !url.trim().is_empty())
    }
}

/// Dashboard-level alert settings, re-read on every poll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardAlertConfig {
    pub global_mute: bool,
    pub default_sounds: SoundSet,
}

/// Widget-level alert settings, fixed for the lifetime of a poller
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoundPolicy {
    pub muted: bool,
    pub overrides: SoundSet,
}

impl SoundPolicy {
    /// Widget override first, dashboard default second
    pub fn sound_for<'a>(&'a self, state: CheckState, dashboard: &'a DashboardAlertConfig) -> Option<&'a str> {
        self.overrides
            .get(state)
            .or_else(|| dashboard.default_sounds.get(state))
    }

    pub fn volume(&self, dashboard: &DashboardAlertConfig) -> f32 {
        if self.muted || dashboard.global_mute { 0.0 } else { 1.0 }
    }
}

/// A sound the machine decided to emit
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSound {
    pub state: CheckState,
    pub url: Option<String>,
    pub volume: f32,
}

/// Per-severity fired flags for one check target
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMemory {
    fired: BTreeMap<CheckState, bool>,
}

impl AlertMemory {
    pub fn new(object_type: ObjectType) -> Self {
        let fired = CheckState::severities(object_type)
            .iter()
            .map(|state| (*state, false))
            .collect();
        Self { fired }
    }

    pub fn has_fired(&self, state: CheckState) -> bool {
        self.fired.get(&state).copied().unwrap_or(false)
    }

    /// Set `state` fired and every other severity not fired
    fn mark_fired(&mut self, state: CheckState) {
        for (severity, fired) in self.fired.iter_mut() {
            *fired = *severity == state;
        }
        self.fired.insert(state, true);
    }

    /// Severities currently marked as fired
    #[cfg(test)]
    pub fn fired(&self) -> impl Iterator<Item = CheckState> + '_ {
        self.fired
            .iter()
            .filter(|(_, fired)| **fired)
            .map(|(state, _)| *state)
    }
}

/// Alert state machine bound to a single check target
///
/// A different target is a different subject: build a new machine instead of
/// reusing one.
#[derive(Debug, Clone)]
pub struct AlertMachine {
    target: CheckTarget,
    memory: AlertMemory,
}

impl AlertMachine {
    pub fn new(target: CheckTarget) -> Self {
        let memory = AlertMemory::new(target.object_type);
        Self { target, memory }
    }

    pub fn target(&self) -> &CheckTarget {
        &self.target
    }

    #[cfg(test)]
    pub fn memory(&self) -> &AlertMemory {
        &self.memory
    }

    /// Feed one resolved state; returns the sound to play on a transition
    pub fn observe(
        &mut self,
        state: CheckState,
        policy: &SoundPolicy,
        dashboard: &DashboardAlertConfig,
    ) -> Option<AlertSound> {
        if self.memory.has_fired(state) {
            debug!(check = %self.target, %state, "Severity already alerted");
            return None;
        }
        self.memory.mark_fired(state);

        let sound = AlertSound {
            state,
            url: policy.sound_for(state, dashboard).map(str::to_string),
            volume: policy.volume(dashboard),
        };
        info!(check = %self.target, %state, volume = sound.volume, url = ?sound.url, "Alert fired");
        Some(sound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_target(filter: &str) -> CheckTarget {
        CheckTarget::new(ObjectType::Service, filter).unwrap()
    }

    fn run(machine: &mut AlertMachine, states: &[CheckState], policy: &SoundPolicy, config: &DashboardAlertConfig) -> Vec<AlertSound> {
        states
            .iter()
            .filter_map(|state| machine.observe(*state, policy, config))
            .collect()
    }

    #[test]
    fn test_fires_once_per_transition() {
        let mut machine = AlertMachine::new(service_target("web"));
        let config = DashboardAlertConfig::default();
        let states = [
            CheckState::Critical,
            CheckState::Critical,
            CheckState::Critical,
            CheckState::Ok,
            CheckState::Critical,
        ];

        let fired: Vec<_> = run(&mut machine, &states, &SoundPolicy::default(), &config)
            .into_iter()
            .map(|sound| sound.state)
            .collect();
        assert_eq!(fired, vec![CheckState::Critical, CheckState::Ok, CheckState::Critical]);
    }

    #[test]
    fn test_firing_clears_other_flags() {
        let mut machine = AlertMachine::new(service_target("db"));
        let config = DashboardAlertConfig::default();
        let policy = SoundPolicy::default();

        machine.observe(CheckState::Warning, &policy, &config);
        machine.observe(CheckState::Unknown, &policy, &config);
        assert_eq!(machine.memory().fired().collect::<Vec<_>>(), vec![CheckState::Unknown]);

        assert!(machine.observe(CheckState::Warning, &policy, &config).is_some());
        assert!(!machine.memory().has_fired(CheckState::Unknown));
    }

    #[test]
    fn test_first_observation_always_fires() {
        let mut machine = AlertMachine::new(CheckTarget::new(ObjectType::Host, "router").unwrap());
        let sound = machine.observe(CheckState::Up, &SoundPolicy::default(), &DashboardAlertConfig::default());
        assert_eq!(sound.map(|s| s.state), Some(CheckState::Up));
    }

    #[test]
    fn test_host_memory_tracks_up_and_down() {
        let memory = AlertMemory::new(ObjectType::Host);
        assert!(!memory.has_fired(CheckState::Up));
        assert!(!memory.has_fired(CheckState::Down));
        assert_eq!(memory.fired().count(), 0);

        let mut machine = AlertMachine::new(CheckTarget::new(ObjectType::Host, "router").unwrap());
        let states = [CheckState::Down, CheckState::Down, CheckState::Up, CheckState::Down];
        let fired = run(&mut machine, &states, &SoundPolicy::default(), &DashboardAlertConfig::default());
        assert_eq!(fired.len(), 3);
    }

    #[test]
    fn test_global_mute_zeroes_volume_but_keeps_sequence() {
        let mut machine = AlertMachine::new(service_target("web"));
        let config = DashboardAlertConfig {
            global_mute: true,
            default_sounds: SoundSet::bundled(),
        };
        let states = [
            CheckState::Critical,
            CheckState::Critical,
            CheckState::Critical,
            CheckState::Ok,
            CheckState::Critical,
        ];

        let fired = run(&mut machine, &states, &SoundPolicy::default(), &config);
        assert_eq!(fired.len(), 3);
        assert!(fired.iter().all(|sound| sound.volume == 0.0));
    }

    #[test]
    fn test_widget_mute_zeroes_volume() {
        let mut machine = AlertMachine::new(service_target("web"));
        let policy = SoundPolicy { muted: true, overrides: SoundSet::default() };
        let sound = machine.observe(CheckState::Warning, &policy, &DashboardAlertConfig::default()).unwrap();
        assert_eq!(sound.volume, 0.0);

        let mut unmuted = AlertMachine::new(service_target("web"));
        let sound = unmuted.observe(CheckState::Warning, &SoundPolicy::default(), &DashboardAlertConfig::default()).unwrap();
        assert_eq!(sound.volume, 1.0);
    }

    #[test]
    fn test_override_beats_dashboard_default() {
        let config = DashboardAlertConfig {
            global_mute: false,
            default_sounds: SoundSet::bundled(),
        };
        let policy = SoundPolicy {
            muted: false,
            overrides: SoundSet {
                critical: Some("/uploads/siren.mp3".to_string()),
                warning: Some(String::new()),
                ..SoundSet::default()
            },
        };

        assert_eq!(policy.sound_for(CheckState::Critical, &config), Some("/uploads/siren.mp3"));
        // Empty override falls back to the dashboard default
        assert_eq!(policy.sound_for(CheckState::Warning, &config), Some("/dashboards-data/warning.mp3"));
        assert_eq!(
            policy.sound_for(CheckState::Ok, &DashboardAlertConfig::default()),
            None
        );
    }

    #[test]
    fn test_sound_set_serde_names() {
        let json = r#"{"okSound": "/a.mp3", "downSound": ""}"#;
        let set: SoundSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.get(CheckState::Ok), Some("/a.mp3"));
        assert_eq!(set.get(CheckState::Down), None);
        assert_eq!(set.get(CheckState::Up), None);
    }

    #[test]
    fn test_option_keys_match_serde_names() {
        let serialized = serde_json::to_value(SoundSet::bundled()).unwrap();
        for state in [ObjectType::Service, ObjectType::Host].into_iter().flat_map(CheckState::severities) {
            assert!(serialized.get(SoundSet::option_key(*state)).is_some(), "{state}");
        }
    }
}
