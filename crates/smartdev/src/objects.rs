//! Object snapshot model.
//!
//! Objects live in a flat, dot-separated namespace such as
//! `alias.0.kitchen.light.SET`. This crate only ever reads point-in-time
//! snapshots of them; writes are described as [`crate::store::ObjectChange`]s
//! and handed back to the caller.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// A snapshot of the object store, keyed by object id.
pub type Objects = HashMap<String, ObjectRecord>;

/// Object kind as stored in the `type` field.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ObjectType {
    #[default]
    State,
    Channel,
    Device,
    Folder,
    Enum,
    Adapter,
    Instance,
    Host,
    Meta,
    Script,
    #[serde(other)]
    Other,
}

/// A single record of the object store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Filled from the map key when missing in the source document.
    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(rename = "type", default)]
    pub kind: ObjectType,

    #[serde(default)]
    pub common: Common,
}

/// The `common` section of an object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Common {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Name>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Value type of a state (`boolean`, `number`, ...)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<AliasConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<serde_json::Value>,

    /// Value to label map, either an object or the legacy `"0:off;1:on"` string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub states: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,

    /// Member ids of an enum object.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

/// Display name, either plain or translated per language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Name {
    Plain(String),
    Translated(BTreeMap<String, String>),
}

impl Name {
    /// Resolve the name for `language`, falling back to `default_language` and
    /// then to the first available translation. Empty strings never resolve.
    pub fn resolve(&self, language: &str, default_language: &str) -> Option<&str> {
        match self {
            Name::Plain(name) => Some(name.as_str()).filter(|n| !n.is_empty()),
            Name::Translated(names) => [
                names.get(language),
                names.get(default_language),
                names.values().next(),
            ]
            .into_iter()
            .flatten()
            .find(|n| !n.is_empty())
            .map(String::as_str),
        }
    }
}

/// Alias definition in `common.alias`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AliasConfig {
    /// Target of the alias; absent while the alias is not wired yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AliasEndpoint>,

    /// Convert function applied when reading through the alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read: Option<String>,

    /// Convert function applied when writing through the alias.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write: Option<String>,
}

/// Alias target: one id for both directions, or separate read and write ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AliasEndpoint {
    Single(String),
    Split { read: String, write: String },
}

impl AliasEndpoint {
    pub fn read_id(&self) -> &str {
        match self {
            AliasEndpoint::Single(id) => id,
            AliasEndpoint::Split { read, .. } => read,
        }
    }

    pub fn write_id(&self) -> &str {
        match self {
            AliasEndpoint::Single(id) => id,
            AliasEndpoint::Split { write, .. } => write,
        }
    }

    /// Collapse a split endpoint whose directions agree into a single one.
    pub fn normalized(self) -> Self {
        match self {
            AliasEndpoint::Split { read, write } if read == write => AliasEndpoint::Single(read),
            other => other,
        }
    }
}

impl ObjectRecord {
    pub fn new(id: impl Into<String>, kind: ObjectType) -> Self {
        Self {
            id: id.into(),
            kind,
            common: Common::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.common.name = Some(Name::Plain(name.into()));
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.common.role = Some(role.into());
        self
    }

    pub fn with_access(mut self, read: bool, write: bool) -> Self {
        self.common.read = Some(read);
        self.common.write = Some(write);
        self
    }

    pub fn with_alias(mut self, alias: AliasConfig) -> Self {
        self.common.alias = Some(alias);
        self
    }

    pub fn with_members<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.common.members = members.into_iter().map(Into::into).collect();
        self
    }

    /// Whether this object forwards to another one through `common.alias.id`.
    pub fn is_alias(&self) -> bool {
        self.alias_endpoint().is_some()
    }

    pub fn alias_endpoint(&self) -> Option<&AliasEndpoint> {
        self.common.alias.as_ref().and_then(|alias| alias.id.as_ref())
    }

    pub fn role(&self) -> Option<&str> {
        self.common.role.as_deref()
    }

    pub fn name(&self, language: &str, default_language: &str) -> Option<&str> {
        self.common
            .name
            .as_ref()
            .and_then(|name| name.resolve(language, default_language))
    }
}

/// Number of dot-separated segments in an id.
pub fn segment_count(id: &str) -> usize {
    id.split('.').count()
}

pub fn last_segment(id: &str) -> &str {
    id.rsplit_once('.').map_or(id, |(_, last)| last)
}

/// `true` when `id` lies strictly below `namespace` (`alias.0.x` is in `alias.0`,
/// `alias.00` is not).
pub fn in_namespace(id: &str, namespace: &str) -> bool {
    id.strip_prefix(namespace)
        .is_some_and(|rest| rest.starts_with('.'))
}

/// Display name of `id`: the object's localized name, or the last id segment.
pub fn display_name(
    object: Option<&ObjectRecord>,
    id: &str,
    language: &str,
    default_language: &str,
) -> String {
    object
        .and_then(|obj| obj.name(language, default_language))
        .unwrap_or_else(|| last_segment(id))
        .to_string()
}

/// Enum objects (`enum.rooms.*`, `enum.functions.*`, ...) of a snapshot.
pub fn enums_of(objects: &Objects) -> Objects {
    objects
        .iter()
        .filter(|(id, obj)| obj.kind == ObjectType::Enum || in_namespace(id, "enum"))
        .map(|(id, obj)| (id.clone(), obj.clone()))
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ObjectsError {
    #[error("Failed to read object snapshot {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse object snapshot {0}: {1}")]
    Parse(PathBuf, #[source] serde_json::Error),
}

/// Parse a JSON object map (`{ "<id>": { "type": ..., "common": ... } }`).
pub fn objects_from_json(json: &str) -> Result<Objects, serde_json::Error> {
    let mut objects: Objects = serde_json::from_str(json)?;
    for (id, object) in objects.iter_mut() {
        if object.id.is_empty() {
            object.id = id.clone();
        }
    }
    Ok(objects)
}

/// Load a snapshot exported as a JSON object map.
pub fn load_objects(path: impl AsRef<Path>) -> Result<Objects, ObjectsError> {
    let path = path.as_ref();
    let contents =
        std::fs::read_to_string(path).map_err(|e| ObjectsError::Io(path.to_path_buf(), e))?;
    objects_from_json(&contents).map_err(|e| ObjectsError::Parse(path.to_path_buf(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_resolution_fallbacks() {
        let mut names = BTreeMap::new();
        names.insert("de".to_string(), "Licht".to_string());
        names.insert("en".to_string(), "Light".to_string());
        let name = Name::Translated(names);

        assert_eq!(name.resolve("de", "en"), Some("Licht"));
        assert_eq!(name.resolve("fr", "en"), Some("Light"));

        let mut only_ru = BTreeMap::new();
        only_ru.insert("ru".to_string(), "Свет".to_string());
        assert_eq!(Name::Translated(only_ru).resolve("de", "en"), Some("Свет"));

        assert_eq!(Name::Plain(String::new()).resolve("en", "en"), None);
    }

    #[test]
    fn test_display_name_falls_back_to_segment() {
        assert_eq!(display_name(None, "alias.0.kitchen", "en", "en"), "kitchen");

        let obj = ObjectRecord::new("alias.0.kitchen", ObjectType::Folder).with_name("Kitchen");
        assert_eq!(display_name(Some(&obj), "alias.0.kitchen", "en", "en"), "Kitchen");
    }

    #[test]
    fn test_in_namespace_requires_separator() {
        assert!(in_namespace("alias.0.light", "alias.0"));
        assert!(!in_namespace("alias.00.light", "alias.0"));
        assert!(!in_namespace("alias.0", "alias.0"));
    }

    #[test]
    fn test_parse_snapshot() {
        let json = r#"{
            "alias.0.light.SET": {
                "type": "state",
                "common": {
                    "name": {"en": "Set", "de": "Setzen"},
                    "role": "switch.light",
                    "type": "boolean",
                    "write": true,
                    "alias": {"id": {"read": "hm.0.a", "write": "hm.0.b"}, "read": "val / 10"}
                }
            },
            "enum.rooms.kitchen": {
                "_id": "enum.rooms.kitchen",
                "type": "enum",
                "common": {"name": "Kitchen", "members": ["alias.0.light"]}
            },
            "system.host.x": {"type": "host", "common": {}}
        }"#;

        let objects = objects_from_json(json).unwrap();
        let set = &objects["alias.0.light.SET"];
        assert_eq!(set.id, "alias.0.light.SET");
        assert_eq!(set.kind, ObjectType::State);
        assert_eq!(set.name("de", "en"), Some("Setzen"));
        assert_eq!(
            set.alias_endpoint(),
            Some(&AliasEndpoint::Split {
                read: "hm.0.a".to_string(),
                write: "hm.0.b".to_string()
            })
        );
        assert_eq!(objects["system.host.x"].kind, ObjectType::Host);

        let enums = enums_of(&objects);
        assert_eq!(enums.len(), 1);
        assert_eq!(enums["enum.rooms.kitchen"].common.members, vec!["alias.0.light"]);
    }

    #[test]
    fn test_unknown_object_type() {
        let objects = objects_from_json(r#"{"a.b": {"type": "chart"}}"#).unwrap();
        assert_eq!(objects["a.b"].kind, ObjectType::Other);
    }

    #[test]
    fn test_endpoint_normalization() {
        let split = AliasEndpoint::Split {
            read: "a.0.x".to_string(),
            write: "a.0.x".to_string(),
        };
        assert_eq!(split.normalized(), AliasEndpoint::Single("a.0.x".to_string()));
    }
}
