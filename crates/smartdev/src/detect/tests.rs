use std::collections::HashMap;

use super::*;
use crate::objects::AliasConfig;
use crate::objects::AliasEndpoint;
use crate::objects::ObjectRecord;
use crate::objects::ObjectType;
use crate::pretty_print::PrettyPrint;

/// Matcher returning canned devices per candidate id.
#[derive(Default)]
struct FixedMatcher {
    devices: HashMap<String, Vec<DetectedDevice>>,
}

impl FixedMatcher {
    fn with(mut self, candidate: &str, device: DetectedDevice) -> Self {
        self.devices
            .entry(candidate.to_string())
            .or_default()
            .push(device);
        self
    }
}

impl PatternMatcher for FixedMatcher {
    fn detect(&self, request: &DetectRequest<'_>) -> Option<Vec<DetectedDevice>> {
        self.devices.get(request.id).cloned()
    }

    fn patterns(&self) -> BTreeMap<String, PatternDefinition> {
        BTreeMap::new()
    }
}

fn snapshot(records: Vec<ObjectRecord>) -> Objects {
    records.into_iter().map(|r| (r.id.clone(), r)).collect()
}

fn state_object(id: &str, role: &str) -> ObjectRecord {
    ObjectRecord::new(id, ObjectType::State)
        .with_role(role)
        .with_access(true, false)
}

fn expected(name: &str, id: Option<&str>, role: &str) -> DetectorState {
    DetectorState {
        id: id.map(str::to_string),
        name: name.to_string(),
        read: true,
        default_role: Some(role.to_string()),
        ..Default::default()
    }
}

fn light_device() -> DetectedDevice {
    DetectedDevice {
        channel_id: "alias.0.light1".to_string(),
        device_type: "light".to_string(),
        states: vec![
            DetectorState {
                required: true,
                write: true,
                ..expected("SET", Some("alias.0.light1.SET"), "switch.light")
            },
            DetectorState {
                required: true,
                indicator: true,
                ..expected("ACTUAL", Some("alias.0.light1.ACTUAL"), "sensor.light")
            },
        ],
    }
}

fn light_objects() -> Objects {
    snapshot(vec![
        state_object("alias.0.light1.SET", "switch.light").with_access(true, true),
        state_object("alias.0.light1.ACTUAL", "sensor.light"),
    ])
}

// =============================================================================
// Primary detection
// =============================================================================

#[test]
fn test_single_light_end_to_end() {
    let objects = light_objects();
    let matcher = FixedMatcher::default().with("alias.0.light1", light_device());
    let mut aggregator = DeviceAggregator::new(matcher);

    let devices = aggregator.detect(&objects, &["alias.0.light1".to_string()], false);
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].channel_id, "alias.0.light1");
    assert_eq!(devices[0].states.len(), 2);

    let added = aggregator.added_states(&devices[0], &objects);
    assert!(added.is_empty());
}

#[test]
fn test_unmatched_candidates_are_dropped() {
    let objects = light_objects();
    let matcher = FixedMatcher::default().with("alias.0.light1", light_device());
    let mut aggregator = DeviceAggregator::new(matcher);

    let candidates = vec![
        "alias.0.unknown".to_string(),
        "alias.0.light1".to_string(),
        "hm-rpc.0.nothing".to_string(),
    ];
    let devices = aggregator.detect(&objects, &candidates, false);
    assert_eq!(devices.len(), 1);
}

#[test]
fn test_duplicate_channels_are_reported_once() {
    let objects = light_objects();
    let matcher = FixedMatcher::default()
        .with("alias.0.light1", light_device())
        .with("alias.0.light1.SET", light_device());
    let mut aggregator = DeviceAggregator::new(matcher);

    let candidates = vec![
        "alias.0.light1.SET".to_string(),
        "alias.0.light1".to_string(),
    ];
    let devices = aggregator.detect(&objects, &candidates, false);
    assert_eq!(devices, vec![light_device()]);
}

// =============================================================================
// Key cache
// =============================================================================

#[test]
fn test_key_cache_reused_for_equal_snapshots() {
    let objects = light_objects();
    let mut aggregator = DeviceAggregator::new(FixedMatcher::default());
    let candidates = vec!["alias.0.light1".to_string()];

    aggregator.detect(&objects, &candidates, false);
    aggregator.detect(&objects.clone(), &candidates, false);
    aggregator.added_states(&light_device(), &objects);
    assert_eq!(aggregator.key_rebuilds(), 1);

    aggregator.detect(&objects, &candidates, true);
    assert_eq!(aggregator.key_rebuilds(), 2);

    let mut changed = objects.clone();
    changed.insert(
        "alias.0.light1.COLOR".to_string(),
        state_object("alias.0.light1.COLOR", "level.color.rgb"),
    );
    aggregator.detect(&changed, &candidates, false);
    assert_eq!(aggregator.key_rebuilds(), 3);
}

#[test]
fn test_key_cache_standalone() {
    let mut cache = KeyCache::default();
    let objects = light_objects();

    assert_eq!(
        cache.keys_for(&objects, false),
        ["alias.0.light1.ACTUAL", "alias.0.light1.SET"]
    );
    cache.keys_for(&objects, false);
    assert_eq!(cache.rebuilds(), 1);
}

// =============================================================================
// Added states
// =============================================================================

#[test]
fn test_added_states_skip_claimed_and_expected_names() {
    let mut objects = light_objects();
    for record in [
        state_object("alias.0.light1.extra.SET", "switch"),
        state_object("alias.0.light1.BUTTON3", "button"),
        state_object("alias.0.light1.COLOR", "level.color.rgb").with_access(true, true),
        state_object("alias.0.light1.more.COLOR", "level.color.rgb"),
        ObjectRecord::new("alias.0.light1.extra", ObjectType::Folder),
        state_object("alias.0.light10.OTHER", "state"),
    ] {
        objects.insert(record.id.clone(), record);
    }

    let mut device = light_device();
    device
        .states
        .push(expected("BUTTON%d", None, "button"));

    let mut aggregator = DeviceAggregator::new(FixedMatcher::default());
    let added = aggregator.added_states(&device, &objects);

    assert_eq!(added.len(), 1);
    let color = &added[0];
    assert_eq!(color.id.as_deref(), Some("alias.0.light1.COLOR"));
    assert_eq!(color.name, "COLOR");
    assert!(color.no_type);
    assert!(color.read && color.write);
    assert_eq!(color.default_role.as_deref(), Some("level.color.rgb"));
    assert!(added.iter().all(|state| state.name != "SET"));
}

#[test]
fn test_unassigned_state_without_role_does_not_block_names() {
    let mut objects = light_objects();
    objects.insert(
        "alias.0.light1.LEVEL".to_string(),
        state_object("alias.0.light1.LEVEL", "level"),
    );

    let mut device = light_device();
    device.states.push(DetectorState {
        name: "LEVEL".to_string(),
        ..Default::default()
    });

    let mut aggregator = DeviceAggregator::new(FixedMatcher::default());
    let added = aggregator.added_states(&device, &objects);
    assert_eq!(
        added.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        vec!["LEVEL"]
    );
}

// =============================================================================
// Full scan with the built-in matcher
// =============================================================================

fn living_room() -> Objects {
    let mut set = state_object("alias.0.living.lamp.SET", "switch.light")
        .with_access(true, true)
        .with_alias(AliasConfig {
            id: Some(AliasEndpoint::Single("hue.0.1.on".to_string())),
            ..Default::default()
        });
    set.common.value_type = Some("boolean".to_string());

    snapshot(vec![
        ObjectRecord::new("enum.rooms.living", ObjectType::Enum)
            .with_members(["alias.0.living.lamp"]),
        ObjectRecord::new("enum.functions.light", ObjectType::Enum)
            .with_members(["alias.0.living.lamp"]),
        ObjectRecord::new("alias.0.living", ObjectType::Folder),
        ObjectRecord::new("alias.0.living.lamp", ObjectType::Device).with_name("Lamp"),
        set,
        state_object("alias.0.living.lamp.UNREACH", "indicator.maintenance.unreach"),
        state_object("alias.0.living.lamp.BRIGHTNESS", "level.brightness").with_access(true, true),
        ObjectRecord::new("alias.0.living.lamp.extra", ObjectType::Folder),
        state_object("alias.0.living.lamp.extra.SET", "state"),
    ])
}

#[test]
fn test_scan_living_room() {
    let objects = living_room();
    let enums = crate::objects::enums_of(&objects);
    let namespaces = vec!["alias.0".to_string(), "linkeddevices.0".to_string()];

    let mut aggregator = DeviceAggregator::new(RolePatternMatcher::with_defaults());
    let reports = aggregator.scan(&objects, &enums, &namespaces, false);

    insta::assert_snapshot!(reports.to_pretty_string(), @r"
    Device: alias.0.living.lamp (light)
      SET: alias.0.living.lamp.SET [read, write, required] role=switch.light
      UNREACH: alias.0.living.lamp.UNREACH [read, indicator] role=indicator.maintenance.unreach
      Added:
        BRIGHTNESS: alias.0.living.lamp.BRIGHTNESS [read, write, added] role=level.brightness
      Rooms: enum.rooms.living
      Functions: enum.functions.light
    ");
}

#[test]
fn test_scan_feeds_fx_table() {
    let objects = living_room();
    let enums = crate::objects::enums_of(&objects);
    let namespaces = vec!["alias.0".to_string()];

    let mut aggregator = DeviceAggregator::new(RolePatternMatcher::with_defaults());
    let reports = aggregator.scan(&objects, &enums, &namespaces, false);

    let mut fx = FxTable::new();
    let report = &reports[0];
    let seeded = fx.update(report.device.states.iter().chain(&report.added), &objects);

    assert_eq!(seeded, 1);
    assert_eq!(
        fx.get("SET"),
        Some(&Fx {
            read: Some(String::new()),
            write: Some(String::new()),
        })
    );

    let mut endpoints = EndpointTable::new();
    endpoints.update(&report.device.states, &objects);
    assert_eq!(
        endpoints.get("SET"),
        Some(&AliasEndpoint::Single("hue.0.1.on".to_string()))
    );
}

#[test]
fn test_folder_candidate_does_not_claim_nested_device() {
    let mut set = state_object("alias.0.kitchen.lamp.SET", "switch.light").with_access(true, true);
    set.common.value_type = Some("boolean".to_string());
    let objects = snapshot(vec![
        ObjectRecord::new("enum.rooms.kitchen", ObjectType::Enum).with_members(["alias.0.kitchen"]),
        ObjectRecord::new("alias.0.kitchen", ObjectType::Folder),
        ObjectRecord::new("alias.0.kitchen.lamp", ObjectType::Device),
        set,
    ]);
    let enums = crate::objects::enums_of(&objects);

    let mut aggregator = DeviceAggregator::new(RolePatternMatcher::with_defaults());
    let reports = aggregator.scan(&objects, &enums, &["alias.0".to_string()], false);

    insta::assert_snapshot!(reports.to_pretty_string(), @r"
    Device: alias.0.kitchen.lamp (light)
      SET: alias.0.kitchen.lamp.SET [read, write, required] role=switch.light
      UNREACH: - [read, indicator] role=indicator.maintenance.unreach
      Rooms: enum.rooms.kitchen
    ");
}

#[test]
fn test_scan_looks_up_keys_once() {
    let light = |channel: &str| {
        let mut set = state_object(&format!("{channel}.SET"), "switch.light").with_access(true, true);
        set.common.value_type = Some("boolean".to_string());
        [ObjectRecord::new(channel, ObjectType::Device), set]
    };
    let objects = snapshot(
        light("alias.0.hall.lamp")
            .into_iter()
            .chain(light("alias.0.bath.lamp"))
            .collect(),
    );
    let enums = crate::objects::enums_of(&objects);

    let mut aggregator = DeviceAggregator::new(RolePatternMatcher::with_defaults());
    let reports = aggregator.scan(&objects, &enums, &["alias.0".to_string()], false);

    assert_eq!(reports.len(), 2);
    assert_eq!(aggregator.key_lookups(), 1);
    assert_eq!(aggregator.key_rebuilds(), 1);

    aggregator.scan(&objects, &enums, &["alias.0".to_string()], false);
    assert_eq!(aggregator.key_lookups(), 2);
    assert_eq!(aggregator.key_rebuilds(), 1);
}
