//! Declarative device patterns and a role-based matcher for them.

use std::collections::BTreeMap;
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::trace;

use super::reconcile::is_own_member;
use super::reconcile::pattern_name_matches;
use super::DetectRequest;
use super::DetectedDevice;
use super::DetectorState;
use super::PatternMatcher;
use crate::objects::last_segment;
use crate::objects::ObjectRecord;
use crate::objects::ObjectType;
use crate::range;

/// One expected member state of a device pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PatternState {
    /// State name; `%d` matches every numbered instance (`BUTTON%d`).
    pub name: String,

    /// Role prefix a state must carry (`switch` matches `switch.light`).
    pub role: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    /// Required writability, if constrained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<bool>,

    #[serde(default)]
    pub indicator: bool,

    #[serde(default)]
    pub required: bool,

    /// Role reported for the state; defaults to `role`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_role: Option<String>,
}

impl PatternState {
    pub fn new(name: &str, role: &str) -> Self {
        Self {
            name: name.to_string(),
            role: role.to_string(),
            value_type: None,
            write: None,
            indicator: false,
            required: false,
            default_role: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn writable(mut self, write: bool) -> Self {
        self.write = Some(write);
        self
    }

    pub fn indicator(mut self) -> Self {
        self.indicator = true;
        self
    }

    pub fn typed(mut self, value_type: &str) -> Self {
        self.value_type = Some(value_type.to_string());
        self
    }

    fn is_numbered(&self) -> bool {
        self.name.contains("%d")
    }

    fn accepts(&self, object: &ObjectRecord) -> bool {
        object.role().is_some_and(|role| role_matches(&self.role, role))
            && self
                .value_type
                .as_ref()
                .is_none_or(|t| object.common.value_type.as_ref() == Some(t))
            && self
                .write
                .is_none_or(|w| object.common.write.unwrap_or(false) == w)
    }

    fn reported_role(&self) -> String {
        self.default_role.clone().unwrap_or_else(|| self.role.clone())
    }

    fn found(&self, name: String, id: &str, object: &ObjectRecord) -> DetectorState {
        DetectorState {
            id: Some(id.to_string()),
            name,
            value_type: object
                .common
                .value_type
                .clone()
                .or_else(|| self.value_type.clone()),
            read: object.common.read.unwrap_or(true),
            write: object.common.write.unwrap_or(false),
            indicator: self.indicator,
            required: self.required,
            default_role: Some(self.reported_role()),
            states: object.common.states.clone(),
            no_type: false,
        }
    }

    fn missing(&self) -> DetectorState {
        DetectorState {
            id: None,
            name: self.name.clone(),
            value_type: self.value_type.clone(),
            read: true,
            write: self.write.unwrap_or(false),
            indicator: self.indicator,
            required: self.required,
            default_role: Some(self.reported_role()),
            states: None,
            no_type: false,
        }
    }
}

/// A device type: the states it consists of and its precedence over other
/// types.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PatternDefinition {
    /// Higher priorities are tried first.
    #[serde(default)]
    pub priority: i32,

    pub states: Vec<PatternState>,
}

/// `role` equals `pattern` or lies below it (`switch` matches `switch.light`,
/// not `switchable`).
pub fn role_matches(pattern: &str, role: &str) -> bool {
    role.strip_prefix(pattern)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

/// Name for the `n`th instance of a numbered pattern state.
pub fn numbered_name(name: &str, n: usize) -> String {
    name.replacen("%d", &n.to_string(), 1)
}

/// Patterns used when none are configured.
pub fn default_patterns() -> BTreeMap<String, PatternDefinition> {
    let unreach = || PatternState::new("UNREACH", "indicator.maintenance.unreach").indicator();
    let lowbat = || PatternState::new("LOWBAT", "indicator.maintenance.lowbat").indicator();

    let mut patterns = BTreeMap::new();
    let mut add = |name: &str, priority: i32, states: Vec<PatternState>| {
        patterns.insert(name.to_string(), PatternDefinition { priority, states });
    };

    add(
        "thermostat",
        30,
        vec![
            PatternState::new("SET", "level.temperature")
                .writable(true)
                .required(),
            PatternState::new("ACTUAL", "value.temperature"),
            PatternState::new("HUMIDITY", "value.humidity"),
            PatternState::new("BOOST", "switch.mode.boost").writable(true),
            unreach(),
            lowbat(),
        ],
    );
    add(
        "dimmer",
        30,
        vec![
            PatternState::new("SET", "level.dimmer")
                .writable(true)
                .required(),
            PatternState::new("ON_SET", "switch.light").writable(true),
            unreach(),
        ],
    );
    add(
        "blind",
        30,
        vec![
            PatternState::new("SET", "level.blind")
                .writable(true)
                .required(),
            PatternState::new("ACTUAL", "value.blind"),
            PatternState::new("STOP", "button.stop").writable(true),
            unreach(),
        ],
    );
    add(
        "light",
        20,
        vec![
            PatternState::new("SET", "switch.light")
                .writable(true)
                .typed("boolean")
                .required(),
            unreach(),
        ],
    );
    add(
        "socket",
        10,
        vec![
            PatternState::new("SET", "switch").writable(true).required(),
            PatternState::new("ACTUAL", "value.power"),
            unreach(),
        ],
    );
    add(
        "button",
        10,
        vec![
            PatternState::new("BUTTON%d", "button")
                .writable(true)
                .required(),
            lowbat(),
        ],
    );
    add(
        "temperature",
        5,
        vec![
            PatternState::new("ACTUAL", "value.temperature").required(),
            PatternState::new("SECOND", "value.humidity"),
            unreach(),
            lowbat(),
        ],
    );
    add(
        "window",
        5,
        vec![
            PatternState::new("ACTUAL", "sensor.window").required(),
            unreach(),
            lowbat(),
        ],
    );

    patterns
}

/// Matches channels against declarative patterns by state role.
///
/// Patterns are tried by descending priority, then by name; the first whose
/// required states are all present wins. Each object is claimed by at most
/// one pattern state.
#[derive(Debug, Clone)]
pub struct RolePatternMatcher {
    patterns: BTreeMap<String, PatternDefinition>,
    order: Vec<String>,
}

impl RolePatternMatcher {
    pub fn new(patterns: BTreeMap<String, PatternDefinition>) -> Self {
        let mut order: Vec<(&String, i32)> = patterns
            .iter()
            .map(|(name, def)| (name, def.priority))
            .collect();
        order.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let order = order.into_iter().map(|(name, _)| name.clone()).collect();

        Self { patterns, order }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_patterns())
    }

    fn try_pattern(
        definition: &PatternDefinition,
        candidates: &[(&str, &ObjectRecord)],
    ) -> Option<Vec<DetectorState>> {
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut states = Vec::new();

        for expected in &definition.states {
            let mut matches = candidates
                .iter()
                .filter(|(id, object)| !claimed.contains(id) && expected.accepts(object));

            if expected.is_numbered() {
                let found: Vec<&(&str, &ObjectRecord)> = matches.collect();
                if found.is_empty() {
                    if expected.required {
                        return None;
                    }
                    states.push(expected.missing());
                }

                // Segments that already carry a numbered name keep it; the
                // rest take the lowest number nobody uses.
                let mut taken: HashSet<String> = states
                    .iter()
                    .map(|state: &DetectorState| state.name.clone())
                    .chain(
                        found
                            .iter()
                            .map(|(id, _)| last_segment(id))
                            .filter(|segment| pattern_name_matches(&expected.name, segment))
                            .map(str::to_string),
                    )
                    .collect();
                let mut next = 1;
                for (id, object) in found {
                    let segment = last_segment(id);
                    let name = if pattern_name_matches(&expected.name, segment) {
                        segment.to_string()
                    } else {
                        let mut name = numbered_name(&expected.name, next);
                        while taken.contains(&name) {
                            next += 1;
                            name = numbered_name(&expected.name, next);
                        }
                        next += 1;
                        taken.insert(name.clone());
                        name
                    };
                    claimed.insert(*id);
                    states.push(expected.found(name, id, object));
                }
            } else {
                match matches.next() {
                    Some((id, object)) => {
                        let id = *id;
                        states.push(expected.found(expected.name.clone(), id, object));
                        claimed.insert(id);
                    }
                    None if expected.required => return None,
                    None => states.push(expected.missing()),
                }
            }
        }

        if claimed.is_empty() {
            None
        } else {
            Some(states)
        }
    }
}

impl Default for RolePatternMatcher {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl PatternMatcher for RolePatternMatcher {
    fn detect(&self, request: &DetectRequest<'_>) -> Option<Vec<DetectedDevice>> {
        let object = request.objects.get(request.id)?;
        let channel_id = if object.kind == ObjectType::State {
            request.id.rsplit_once('.').map(|(parent, _)| parent)?
        } else {
            request.id
        };

        let candidates: Vec<(&str, &ObjectRecord)> = range::children_in(request.keys, channel_id)
            .into_iter()
            .filter_map(|id| request.objects.get(id).map(|object| (id, object)))
            .filter(|(id, object)| {
                object.kind == ObjectType::State && is_own_member(request.objects, channel_id, id)
            })
            .collect();
        if candidates.is_empty() {
            trace!(channel = channel_id, "No states below candidate");
            return None;
        }

        for name in &self.order {
            let Some(definition) = self.patterns.get(name) else {
                continue;
            };
            if let Some(states) = Self::try_pattern(definition, &candidates) {
                debug!(channel = channel_id, pattern = %name, "Matched device pattern");
                return Some(vec![DetectedDevice {
                    channel_id: channel_id.to_string(),
                    device_type: name.clone(),
                    states,
                }]);
            }
        }
        None
    }

    fn patterns(&self) -> BTreeMap<String, PatternDefinition> {
        self.patterns.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::Objects;

    fn state(id: &str, role: &str, write: bool) -> (String, ObjectRecord) {
        (
            id.to_string(),
            ObjectRecord::new(id, ObjectType::State)
                .with_role(role)
                .with_access(true, write),
        )
    }

    fn run(objects: &Objects, id: &str) -> Option<Vec<DetectedDevice>> {
        let keys = range::sorted_keys(objects);
        RolePatternMatcher::with_defaults().detect(&DetectRequest {
            id,
            objects,
            keys: &keys,
        })
    }

    #[test]
    fn test_role_matches() {
        assert!(role_matches("switch", "switch"));
        assert!(role_matches("switch", "switch.light"));
        assert!(!role_matches("switch", "switchable"));
        assert!(!role_matches("switch.light", "switch"));
    }

    #[test]
    fn test_priority_order() {
        let matcher = RolePatternMatcher::with_defaults();
        assert_eq!(
            matcher.order,
            vec![
                "blind",
                "dimmer",
                "thermostat",
                "light",
                "button",
                "socket",
                "temperature",
                "window"
            ]
        );
    }

    #[test]
    fn test_thermostat_from_state_candidate() {
        let objects: Objects = [
            (
                "hm-rpc.0.ABC.1".to_string(),
                ObjectRecord::new("hm-rpc.0.ABC.1", ObjectType::Channel),
            ),
            state("hm-rpc.0.ABC.1.SET_TEMPERATURE", "level.temperature", true),
            state("hm-rpc.0.ABC.1.ACTUAL_TEMPERATURE", "value.temperature", false),
            state("hm-rpc.0.ABC.1.RSSI", "value.rssi", false),
        ]
        .into_iter()
        .collect();

        let devices = run(&objects, "hm-rpc.0.ABC.1.SET_TEMPERATURE").unwrap();
        assert_eq!(devices.len(), 1);

        let device = &devices[0];
        assert_eq!(device.channel_id, "hm-rpc.0.ABC.1");
        assert_eq!(device.device_type, "thermostat");
        assert_eq!(
            device.state("SET").and_then(|s| s.id.as_deref()),
            Some("hm-rpc.0.ABC.1.SET_TEMPERATURE")
        );
        assert_eq!(
            device.state("ACTUAL").and_then(|s| s.id.as_deref()),
            Some("hm-rpc.0.ABC.1.ACTUAL_TEMPERATURE")
        );
        assert!(device.state("HUMIDITY").is_some_and(|s| s.id.is_none()));
        assert_eq!(device.claimed_ids().count(), 2);
    }

    #[test]
    fn test_numbered_states() {
        let objects: Objects = [
            state("zigbee.0.remote.BUTTON1", "button", true),
            state("zigbee.0.remote.BUTTON2", "button", true),
            state("zigbee.0.remote.press_long", "button.long", true),
        ]
        .into_iter()
        .collect();

        let mut objects = objects;
        objects.insert(
            "zigbee.0.remote".to_string(),
            ObjectRecord::new("zigbee.0.remote", ObjectType::Device),
        );

        let devices = run(&objects, "zigbee.0.remote").unwrap();
        let names: Vec<&str> = devices[0].states.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(devices[0].device_type, "button");
        assert_eq!(names, vec!["BUTTON1", "BUTTON2", "BUTTON3", "LOWBAT"]);
    }

    #[test]
    fn test_numbered_names_stay_unique() {
        let mut objects: Objects = [
            state("zigbee.0.remote.A_PRESS", "button", true),
            state("zigbee.0.remote.BUTTON1", "button", true),
            state("zigbee.0.remote.B_PRESS", "button", true),
        ]
        .into_iter()
        .collect();
        objects.insert(
            "zigbee.0.remote".to_string(),
            ObjectRecord::new("zigbee.0.remote", ObjectType::Device),
        );

        let devices = run(&objects, "zigbee.0.remote").unwrap();
        let states: Vec<(&str, Option<&str>)> = devices[0]
            .states
            .iter()
            .map(|s| (s.name.as_str(), s.id.as_deref()))
            .collect();
        assert_eq!(
            states,
            vec![
                ("BUTTON2", Some("zigbee.0.remote.A_PRESS")),
                ("BUTTON1", Some("zigbee.0.remote.BUTTON1")),
                ("BUTTON3", Some("zigbee.0.remote.B_PRESS")),
                ("LOWBAT", None),
            ]
        );
    }

    #[test]
    fn test_no_match() {
        let objects: Objects = [
            (
                "hm-rpc.0.X".to_string(),
                ObjectRecord::new("hm-rpc.0.X", ObjectType::Channel),
            ),
            state("hm-rpc.0.X.RSSI", "value.rssi", false),
        ]
        .into_iter()
        .collect();

        assert!(run(&objects, "hm-rpc.0.X").is_none());
        assert!(run(&objects, "hm-rpc.0.missing").is_none());
    }
}
