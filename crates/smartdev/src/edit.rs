//! Editable properties of a detected device.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::detect::enums::FUNCTIONS;
use crate::detect::enums::ROOMS;
use crate::objects::display_name;
use crate::objects::in_namespace;
use crate::objects::Objects;
use crate::store::ObjectChange;

/// What the device edit dialog shows for a channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceProperties {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    /// Room enums listing the channel itself as a member
    #[serde(default)]
    pub rooms: BTreeSet<String>,

    #[serde(default)]
    pub functions: BTreeSet<String>,
}

fn direct_memberships(enums: &Objects, category: &str, id: &str) -> BTreeSet<String> {
    enums
        .iter()
        .filter(|(enum_id, record)| {
            in_namespace(enum_id, category) && record.common.members.iter().any(|m| m == id)
        })
        .map(|(enum_id, _)| enum_id.clone())
        .collect()
}

fn membership_changes(
    channel_id: &str,
    before: &BTreeSet<String>,
    after: &BTreeSet<String>,
    changes: &mut Vec<ObjectChange>,
) {
    for enum_id in before.difference(after) {
        changes.push(ObjectChange::RemoveEnumMember {
            enum_id: enum_id.clone(),
            member: channel_id.to_string(),
        });
    }
    for enum_id in after.difference(before) {
        changes.push(ObjectChange::AddEnumMember {
            enum_id: enum_id.clone(),
            member: channel_id.to_string(),
        });
    }
}

impl DeviceProperties {
    /// Current properties of `channel_id`.
    pub fn read(
        channel_id: &str,
        objects: &Objects,
        enums: &Objects,
        language: &str,
        default_language: &str,
    ) -> Self {
        let object = objects.get(channel_id);
        Self {
            name: display_name(object, channel_id, language, default_language),
            icon: object.and_then(|o| o.common.icon.clone()),
            color: object.and_then(|o| o.common.color.clone()),
            rooms: direct_memberships(enums, ROOMS, channel_id),
            functions: direct_memberships(enums, FUNCTIONS, channel_id),
        }
    }

    /// Writes that turn `self` into `edited` for `channel_id`.
    pub fn changes_to(&self, channel_id: &str, edited: &DeviceProperties) -> Vec<ObjectChange> {
        let mut changes = Vec::new();
        let id = channel_id.to_string();

        if edited.name != self.name {
            changes.push(ObjectChange::SetName {
                id: id.clone(),
                name: edited.name.clone(),
            });
        }
        if edited.icon != self.icon {
            changes.push(ObjectChange::SetIcon {
                id: id.clone(),
                icon: edited.icon.clone(),
            });
        }
        if edited.color != self.color {
            changes.push(ObjectChange::SetColor {
                id,
                color: edited.color.clone(),
            });
        }

        membership_changes(channel_id, &self.rooms, &edited.rooms, &mut changes);
        membership_changes(channel_id, &self.functions, &edited.functions, &mut changes);
        changes
    }
}
