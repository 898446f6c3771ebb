//! Second pass over a detected device: states present under its channel that
//! the pattern matcher did not claim.

use std::collections::HashSet;

use super::DetectedDevice;
use super::DetectorState;
use crate::objects::last_segment;
use crate::objects::ObjectRecord;
use crate::objects::ObjectType;
use crate::objects::Objects;
use crate::range;

/// Placeholder for a run of digits in pattern state names (`BUTTON%d`).
const NUMBER_PLACEHOLDER: &str = "%d";

/// Whether `candidate` is the name `expected` stands for. A `%d` in `expected`
/// matches one or more ASCII digits.
pub fn pattern_name_matches(expected: &str, candidate: &str) -> bool {
    match expected.split_once(NUMBER_PLACEHOLDER) {
        None => expected == candidate,
        Some((prefix, suffix)) => candidate
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(suffix))
            .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())),
    }
}

/// Whether `id` belongs to `channel_id` itself rather than to a channel or
/// device object nested below it.
pub(crate) fn is_own_member(objects: &Objects, channel_id: &str, id: &str) -> bool {
    let mut current = id.rsplit_once('.').map(|(parent, _)| parent);
    while let Some(parent) = current {
        if parent.len() <= channel_id.len() {
            return true;
        }
        if objects
            .get(parent)
            .is_some_and(|object| matches!(object.kind, ObjectType::Channel | ObjectType::Device))
        {
            return false;
        }
        current = parent.rsplit_once('.').map(|(parent, _)| parent);
    }
    true
}

fn added_state(id: &str, object: &ObjectRecord) -> DetectorState {
    DetectorState {
        id: Some(id.to_string()),
        name: last_segment(id).to_string(),
        value_type: object.common.value_type.clone(),
        read: object.common.read.unwrap_or(true),
        write: object.common.write.unwrap_or(false),
        indicator: false,
        required: false,
        default_role: object.common.role.clone(),
        states: object.common.states.clone(),
        no_type: true,
    }
}

/// States below `device.channel_id` that are not claimed by the device and
/// whose name does not collide with a pattern-expected member.
///
/// A member counts as expected when it carries a default role or was assigned
/// an id. When two unclaimed states share a name, the first in key order wins.
pub fn added_channel_states(
    device: &DetectedDevice,
    objects: &Objects,
    keys: &[String],
) -> Vec<DetectorState> {
    let claimed: HashSet<&str> = device.claimed_ids().collect();
    let expected: Vec<&str> = device
        .states
        .iter()
        .filter(|state| state.default_role.is_some() || state.id.is_some())
        .map(|state| state.name.as_str())
        .collect();

    let mut names = HashSet::new();
    let mut added = Vec::new();
    for id in range::children_in(keys, &device.channel_id) {
        let Some(object) = objects.get(id) else {
            continue;
        };
        if object.kind != ObjectType::State
            || claimed.contains(id)
            || !is_own_member(objects, &device.channel_id, id)
        {
            continue;
        }

        let name = last_segment(id);
        if expected.iter().any(|e| pattern_name_matches(e, name)) || !names.insert(name) {
            continue;
        }
        added.push(added_state(id, object));
    }
    added
}
