//! Generated object ids and their validation.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::objects::Objects;

/// Replace every character that may not appear in an id segment with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Id of a state named `name` below `channel_id`.
pub fn state_id(channel_id: &str, name: &str) -> String {
    format!("{}.{}", channel_id, sanitize_name(name))
}

/// A generated id that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdCollision {
    /// Several names sanitize to the same id.
    Duplicate { id: String, names: Vec<String> },

    /// The id is already taken by an existing object.
    Existing { id: String, name: String },

    /// The name has nothing left after sanitizing.
    Empty { name: String },
}

impl std::fmt::Display for IdCollision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdCollision::Duplicate { id, names } => {
                write!(f, "{} would be created by {}", id, names.join(", "))
            }
            IdCollision::Existing { id, name } => {
                write!(f, "{} for '{}' already exists", id, name)
            }
            IdCollision::Empty { name } => write!(f, "'{}' does not yield an id", name),
        }
    }
}

/// Collisions among the ids generated for `names` below `channel_id`, and
/// between those ids and `existing` objects. An empty result means every
/// name can be created. Names that sanitize to nothing are reported first,
/// in input order.
pub fn find_collisions(channel_id: &str, names: &[String], existing: &Objects) -> Vec<IdCollision> {
    let mut collisions = Vec::new();
    let mut by_id: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for name in names {
        if sanitize_name(name).is_empty() {
            collisions.push(IdCollision::Empty { name: name.clone() });
            continue;
        }
        by_id
            .entry(state_id(channel_id, name))
            .or_default()
            .push(name.clone());
    }

    for (id, names) in by_id {
        if existing.contains_key(&id) {
            collisions.push(IdCollision::Existing {
                id: id.clone(),
                name: names[0].clone(),
            });
        }
        if names.len() > 1 {
            collisions.push(IdCollision::Duplicate { id, names });
        }
    }
    collisions
}
