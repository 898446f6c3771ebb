//! Range queries over sorted object ids.
//!
//! All descendants of a channel share the literal prefix `"<channel>."` and
//! therefore form one contiguous run in a lexicographically sorted key list.

use crate::objects::Objects;

/// All ids of the snapshot in lexicographic order.
pub fn sorted_keys(objects: &Objects) -> Vec<String> {
    let mut keys: Vec<String> = objects.keys().cloned().collect();
    keys.sort_unstable();
    keys
}

/// Ids strictly below `channel_id` in a sorted key list.
///
/// The run starts at the first key not below `"<channel>."` (found by binary
/// search) and ends at the first key without that prefix.
pub fn children_in<'a>(keys: &'a [String], channel_id: &str) -> Vec<&'a str> {
    let prefix = format!("{}.", channel_id);
    let start = keys.partition_point(|key| key.as_str() < prefix.as_str());
    keys[start..]
        .iter()
        .map(String::as_str)
        .take_while(|key| key.starts_with(&prefix))
        .collect()
}

/// Ids strictly below `channel_id`, using `keys` when the caller already has
/// a sorted key list and sorting the snapshot otherwise.
pub fn children_of(objects: &Objects, channel_id: &str, keys: Option<&[String]>) -> Vec<String> {
    match keys {
        Some(keys) => children_in(keys, channel_id)
            .into_iter()
            .map(str::to_string)
            .collect(),
        None => {
            let keys = sorted_keys(objects);
            children_in(&keys, channel_id)
                .into_iter()
                .map(str::to_string)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::ObjectRecord;
    use crate::objects::ObjectType;

    fn snapshot(ids: &[&str]) -> Objects {
        ids.iter()
            .map(|id| (id.to_string(), ObjectRecord::new(*id, ObjectType::State)))
            .collect()
    }

    #[test]
    fn test_prefix_boundary() {
        let objects = snapshot(&[
            "alias.0.light.SET",
            "alias.0.light.ON.SUB",
            "alias.0.lightning",
            "alias.0.ligh",
        ]);

        let children = children_of(&objects, "alias.0.light", None);
        assert_eq!(children, vec!["alias.0.light.ON.SUB", "alias.0.light.SET"]);
    }

    #[test]
    fn test_channel_itself_is_not_a_child() {
        let keys = sorted_keys(&snapshot(&["a.0.ch", "a.0.ch.x"]));
        assert_eq!(children_in(&keys, "a.0.ch"), vec!["a.0.ch.x"]);
    }

    #[test]
    fn test_matches_full_scan() {
        let objects = snapshot(&[
            "a.0.b",
            "a.0.b.c",
            "a.0.b.c.d",
            "a.0.b-c",
            "a.0.b_c.x",
            "a.0.ba",
            "a.0.bb.c",
            "b.0.b.c",
            "a.0.b.Z",
            "a.0.b.龍",
            "a.0.b.Ｌｉｇｈｔ",
            "a.0.b.\u{10FFFF}",
            "a.0.b\u{10FFFF}",
        ]);
        let keys = sorted_keys(&objects);

        let expected: Vec<&str> = keys
            .iter()
            .map(String::as_str)
            .filter(|id| id.starts_with("a.0.b."))
            .collect();
        assert_eq!(expected.len(), 6);
        assert_eq!(children_in(&keys, "a.0.b"), expected);
    }

    #[test]
    fn test_empty_and_missing() {
        assert!(children_of(&Objects::new(), "a.0", None).is_empty());

        let keys = sorted_keys(&snapshot(&["x.0.y"]));
        assert!(children_in(&keys, "a.0").is_empty());
    }
}
