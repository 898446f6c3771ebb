//! Candidate discovery and room/function membership via enum objects.

use std::collections::HashSet;

use crate::objects::in_namespace;
use crate::objects::ObjectRecord;
use crate::objects::ObjectType;
use crate::objects::Objects;

pub const ROOMS: &str = "enum.rooms";
pub const FUNCTIONS: &str = "enum.functions";

fn sorted(enums: &Objects) -> Vec<(&String, &ObjectRecord)> {
    let mut entries: Vec<(&String, &ObjectRecord)> = enums.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
    entries
}

/// Ids worth handing to the pattern matcher: every enum member, then every
/// `device` object under one of `namespaces` that is not a member already.
pub fn candidate_roots(objects: &Objects, enums: &Objects, namespaces: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut roots = Vec::new();

    for (_, record) in sorted(enums) {
        for member in &record.common.members {
            if seen.insert(member.as_str()) {
                roots.push(member.clone());
            }
        }
    }

    let mut devices: Vec<&str> = objects
        .iter()
        .filter(|(id, object)| {
            object.kind == ObjectType::Device
                && namespaces.iter().any(|namespace| in_namespace(id, namespace))
        })
        .map(|(id, _)| id.as_str())
        .collect();
    devices.sort_unstable();

    for id in devices {
        if seen.insert(id) {
            roots.push(id.to_string());
        }
    }

    roots
}

/// Enums below `category` that contain `id` or one of its ancestors.
pub fn memberships(enums: &Objects, category: &str, id: &str) -> Vec<String> {
    sorted(enums)
        .into_iter()
        .filter(|(enum_id, _)| in_namespace(enum_id, category))
        .filter(|(_, record)| {
            record
                .common
                .members
                .iter()
                .any(|member| member == id || in_namespace(id, member))
        })
        .map(|(enum_id, _)| enum_id.clone())
        .collect()
}

pub fn rooms_of(enums: &Objects, id: &str) -> Vec<String> {
    memberships(enums, ROOMS, id)
}

pub fn functions_of(enums: &Objects, id: &str) -> Vec<String> {
    memberships(enums, FUNCTIONS, id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enum_record(id: &str, members: &[&str]) -> (String, ObjectRecord) {
        (
            id.to_string(),
            ObjectRecord::new(id, ObjectType::Enum).with_members(members.iter().copied()),
        )
    }

    #[test]
    fn test_candidates_members_then_alias_devices() {
        let enums: Objects = [
            enum_record("enum.rooms.kitchen", &["hm-rpc.0.ABC.1", "alias.0.kitchen.light"]),
            enum_record("enum.functions.light", &["alias.0.kitchen.light", "hue.0.lamp"]),
        ]
        .into_iter()
        .collect();

        let objects: Objects = [
            ("alias.0.kitchen.light", ObjectType::Device),
            ("alias.0.hall.lamp", ObjectType::Device),
            ("alias.0.hall.lamp.SET", ObjectType::State),
            ("alias.0.hall", ObjectType::Folder),
            ("linkeddevices.0.fan", ObjectType::Device),
            ("hm-rpc.0.XYZ", ObjectType::Device),
        ]
        .into_iter()
        .map(|(id, kind)| (id.to_string(), ObjectRecord::new(id, kind)))
        .collect();

        let namespaces = vec!["alias.0".to_string(), "linkeddevices.0".to_string()];
        let roots = candidate_roots(&objects, &enums, &namespaces);

        assert_eq!(
            roots,
            vec![
                "alias.0.kitchen.light",
                "hue.0.lamp",
                "hm-rpc.0.ABC.1",
                "alias.0.hall.lamp",
                "linkeddevices.0.fan",
            ]
        );
    }

    #[test]
    fn test_membership_includes_ancestors() {
        let enums: Objects = [
            enum_record("enum.rooms.kitchen", &["hm-rpc.0.ABC"]),
            enum_record("enum.rooms.hall", &["hm-rpc.0.ABC.1"]),
            enum_record("enum.rooms.bath", &["hm-rpc.0.AB"]),
            enum_record("enum.functions.light", &["hm-rpc.0.ABC.1"]),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            rooms_of(&enums, "hm-rpc.0.ABC.1"),
            vec!["enum.rooms.hall", "enum.rooms.kitchen"]
        );
        assert_eq!(functions_of(&enums, "hm-rpc.0.ABC.1"), vec!["enum.functions.light"]);
        assert!(functions_of(&enums, "hm-rpc.0.ABC").is_empty());
    }
}
