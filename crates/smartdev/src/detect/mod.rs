//! Smart device detection.
//!
//! A [`PatternMatcher`] classifies a candidate id into typed devices. The
//! [`DeviceAggregator`] drives a matcher over all candidates with a cached
//! sorted key index, drops duplicates, and reconciles the states a matcher did
//! not claim.

pub mod endpoints;
pub mod enums;
pub mod fx;
pub mod patterns;
pub mod reconcile;
mod staged;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::trace;

use crate::objects::Objects;
use crate::range;

pub use endpoints::EndpointTable;
pub use fx::Fx;
pub use fx::FxTable;
pub use patterns::PatternDefinition;
pub use patterns::PatternState;
pub use patterns::RolePatternMatcher;
pub use staged::Direction;
pub use staged::EditError;

/// A member state of a detected device.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorState {
    /// Object id, `None` for an optional pattern state that was not found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    #[serde(default)]
    pub read: bool,

    #[serde(default)]
    pub write: bool,

    /// Secondary, status-only state
    #[serde(default)]
    pub indicator: bool,

    #[serde(default)]
    pub required: bool,

    /// Role the pattern expects; set on every pattern-expected state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub states: Option<serde_json::Value>,

    /// Present under the channel but not expected by the pattern.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_type: bool,
}

/// One logical device found by a [`PatternMatcher`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedDevice {
    /// Container shared by all member states
    pub channel_id: String,

    #[serde(rename = "type")]
    pub device_type: String,

    pub states: Vec<DetectorState>,
}

impl DetectedDevice {
    pub fn state(&self, name: &str) -> Option<&DetectorState> {
        self.states.iter().find(|state| state.name == name)
    }

    /// Ids of all states the matcher assigned.
    pub fn claimed_ids(&self) -> impl Iterator<Item = &str> {
        self.states.iter().filter_map(|state| state.id.as_deref())
    }
}

/// Input handed to a [`PatternMatcher`] for one candidate.
#[derive(Debug, Clone, Copy)]
pub struct DetectRequest<'a> {
    pub id: &'a str,
    pub objects: &'a Objects,

    /// All ids of `objects`, sorted.
    pub keys: &'a [String],
}

/// Classifier mapping a candidate id and its descendant states to devices.
pub trait PatternMatcher {
    /// `None` (or an empty list) means no known device pattern applies.
    fn detect(&self, request: &DetectRequest<'_>) -> Option<Vec<DetectedDevice>>;

    /// Pattern definitions keyed by device type.
    fn patterns(&self) -> BTreeMap<String, PatternDefinition>;
}

/// Sorted key index reused while the snapshot stays equal.
#[derive(Debug, Default)]
pub struct KeyCache {
    snapshot: Option<Objects>,
    keys: Vec<String>,
    lookups: usize,
    rebuilds: usize,
}

impl KeyCache {
    /// Sorted keys of `objects`, recomputed only when `force` is set or the
    /// snapshot differs from the one seen last.
    pub fn keys_for(&mut self, objects: &Objects, force: bool) -> &[String] {
        self.lookups += 1;
        if !force && self.snapshot.as_ref() == Some(objects) {
            trace!(keys = self.keys.len(), "Reusing sorted key index");
        } else {
            self.keys = range::sorted_keys(objects);
            self.snapshot = Some(objects.clone());
            self.rebuilds += 1;
            debug!(keys = self.keys.len(), "Rebuilt sorted key index");
        }
        &self.keys
    }

    /// Number of times the index was recomputed.
    pub fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    /// Number of times the index was asked for, each costing a snapshot
    /// comparison.
    pub fn lookups(&self) -> usize {
        self.lookups
    }
}

/// A detected device together with everything the device list shows for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceReport {
    #[serde(flatten)]
    pub device: DetectedDevice,

    /// States under the channel that the pattern did not claim
    pub added: Vec<DetectorState>,

    pub rooms: Vec<String>,
    pub functions: Vec<String>,
}

/// Runs a [`PatternMatcher`] over candidate ids. One instance per session; the
/// key cache lives inside it.
#[derive(Debug)]
pub struct DeviceAggregator<M> {
    matcher: M,
    cache: KeyCache,
}

impl<M: PatternMatcher> DeviceAggregator<M> {
    pub fn new(matcher: M) -> Self {
        Self {
            matcher,
            cache: KeyCache::default(),
        }
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    pub fn key_rebuilds(&self) -> usize {
        self.cache.rebuilds()
    }

    pub fn key_lookups(&self) -> usize {
        self.cache.lookups()
    }

    /// Detect devices for every candidate, in candidate order.
    ///
    /// Candidates without a match are skipped; a device whose channel was
    /// already reported by an earlier candidate is dropped.
    pub fn detect(
        &mut self,
        objects: &Objects,
        candidates: &[String],
        force: bool,
    ) -> Vec<DetectedDevice> {
        let keys = self.cache.keys_for(objects, force);
        detect_all(&self.matcher, objects, keys, candidates)
    }

    /// States under the device's channel that the matcher did not claim.
    pub fn added_states(&mut self, device: &DetectedDevice, objects: &Objects) -> Vec<DetectorState> {
        let keys = self.cache.keys_for(objects, false);
        reconcile::added_channel_states(device, objects, keys)
    }

    /// Discover candidates, detect devices, and attach added states plus room
    /// and function membership. The key index is looked up once per scan.
    pub fn scan(
        &mut self,
        objects: &Objects,
        enums: &Objects,
        namespaces: &[String],
        force: bool,
    ) -> Vec<DeviceReport> {
        let candidates = enums::candidate_roots(objects, enums, namespaces);
        let keys = self.cache.keys_for(objects, force);
        let devices = detect_all(&self.matcher, objects, keys, &candidates);

        devices
            .into_iter()
            .map(|device| DeviceReport {
                added: reconcile::added_channel_states(&device, objects, keys),
                rooms: enums::rooms_of(enums, &device.channel_id),
                functions: enums::functions_of(enums, &device.channel_id),
                device,
            })
            .collect()
    }
}

fn detect_all<M: PatternMatcher>(
    matcher: &M,
    objects: &Objects,
    keys: &[String],
    candidates: &[String],
) -> Vec<DetectedDevice> {
    let mut seen = HashSet::new();
    let mut devices = Vec::new();
    for candidate in candidates {
        let request = DetectRequest {
            id: candidate,
            objects,
            keys,
        };
        let Some(found) = matcher.detect(&request) else {
            trace!(candidate = %candidate, "No device pattern matched");
            continue;
        };

        for device in found {
            if seen.insert(device.channel_id.clone()) {
                devices.push(device);
            } else {
                trace!(channel = %device.channel_id, "Dropping duplicate device");
            }
        }
    }

    debug!(
        candidates = candidates.len(),
        devices = devices.len(),
        "Device detection finished"
    );
    devices
}
