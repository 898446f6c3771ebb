//! Object store access and write descriptions.
//!
//! Detection and tree building never write. Edits are expressed as
//! [`ObjectChange`]s and handed to an [`ObjectStore`] by the caller.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::warn;

use crate::objects::enums_of;
use crate::objects::AliasConfig;
use crate::objects::AliasEndpoint;
use crate::objects::Name;
use crate::objects::ObjectRecord;
use crate::objects::Objects;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Object '{0}' not found")]
    NotFound(String),

    #[error("Object '{0}' is not an alias")]
    NotAlias(String),

    #[error("Write to '{id}' rejected: {reason}")]
    Rejected { id: String, reason: String },
}

/// One discrete write against the object store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ObjectChange {
    SetName {
        id: String,
        name: String,
    },
    SetIcon {
        id: String,
        icon: Option<String>,
    },
    SetColor {
        id: String,
        color: Option<String>,
    },
    SetAliasEndpoint {
        id: String,
        endpoint: AliasEndpoint,
    },
    /// `None` leaves a direction unchanged, an empty string removes it.
    SetAliasFx {
        id: String,
        read: Option<String>,
        write: Option<String>,
    },
    AddEnumMember {
        enum_id: String,
        member: String,
    },
    RemoveEnumMember {
        enum_id: String,
        member: String,
    },
    Delete {
        id: String,
    },
}

impl ObjectChange {
    /// Id of the object this change writes.
    pub fn target(&self) -> &str {
        match self {
            ObjectChange::SetName { id, .. }
            | ObjectChange::SetIcon { id, .. }
            | ObjectChange::SetColor { id, .. }
            | ObjectChange::SetAliasEndpoint { id, .. }
            | ObjectChange::SetAliasFx { id, .. }
            | ObjectChange::Delete { id } => id,
            ObjectChange::AddEnumMember { enum_id, .. }
            | ObjectChange::RemoveEnumMember { enum_id, .. } => enum_id,
        }
    }

    /// Apply the change to the target record in place. Deletion is handled
    /// by the store and leaves the record untouched.
    pub fn apply(&self, record: &mut ObjectRecord) -> Result<(), StoreError> {
        let common = &mut record.common;
        match self {
            ObjectChange::SetName { name, .. } => common.name = Some(Name::Plain(name.clone())),
            ObjectChange::SetIcon { icon, .. } => common.icon = icon.clone(),
            ObjectChange::SetColor { color, .. } => common.color = color.clone(),
            ObjectChange::SetAliasEndpoint { endpoint, .. } => {
                common.alias.get_or_insert_with(AliasConfig::default).id = Some(endpoint.clone());
            }
            ObjectChange::SetAliasFx { id, read, write } => {
                let alias = common
                    .alias
                    .as_mut()
                    .filter(|alias| alias.id.is_some())
                    .ok_or_else(|| StoreError::NotAlias(id.clone()))?;
                let assign = |slot: &mut Option<String>, value: &Option<String>| {
                    if let Some(value) = value {
                        *slot = (!value.is_empty()).then(|| value.clone());
                    }
                };
                assign(&mut alias.read, read);
                assign(&mut alias.write, write);
            }
            ObjectChange::AddEnumMember { member, .. } => {
                if !common.members.contains(member) {
                    common.members.push(member.clone());
                }
            }
            ObjectChange::RemoveEnumMember { member, .. } => {
                common.members.retain(|m| m != member);
            }
            ObjectChange::Delete { .. } => {}
        }
        Ok(())
    }
}

/// Access to the object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_objects(&self) -> Result<Objects, StoreError>;

    async fn get_object(&self, id: &str) -> Result<Option<ObjectRecord>, StoreError>;

    async fn set_object(&self, id: &str, record: ObjectRecord) -> Result<(), StoreError>;

    async fn del_object(&self, id: &str) -> Result<(), StoreError>;

    /// Enum objects (`enum.*`).
    async fn get_enums(&self) -> Result<Objects, StoreError>;
}

/// In-memory store over a snapshot. Ids marked read-only reject writes.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<Objects>,
    read_only: HashSet<String>,
}

impl MemoryStore {
    pub fn new(objects: Objects) -> Self {
        Self {
            objects: RwLock::new(objects),
            read_only: HashSet::new(),
        }
    }

    pub fn with_read_only(mut self, id: impl Into<String>) -> Self {
        self.read_only.insert(id.into());
        self
    }

    fn check_writable(&self, id: &str) -> Result<(), StoreError> {
        if self.read_only.contains(id) {
            return Err(StoreError::Rejected {
                id: id.to_string(),
                reason: "object is read-only".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_objects(&self) -> Result<Objects, StoreError> {
        Ok(self.objects.read().await.clone())
    }

    async fn get_object(&self, id: &str) -> Result<Option<ObjectRecord>, StoreError> {
        Ok(self.objects.read().await.get(id).cloned())
    }

    async fn set_object(&self, id: &str, mut record: ObjectRecord) -> Result<(), StoreError> {
        self.check_writable(id)?;
        record.id = id.to_string();
        self.objects.write().await.insert(id.to_string(), record);
        Ok(())
    }

    async fn del_object(&self, id: &str) -> Result<(), StoreError> {
        self.check_writable(id)?;
        self.objects
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn get_enums(&self) -> Result<Objects, StoreError> {
        Ok(enums_of(&*self.objects.read().await))
    }
}

async fn apply_one<S>(store: &S, change: &ObjectChange) -> Result<(), StoreError>
where
    S: ObjectStore + ?Sized,
{
    let id = change.target();
    if let ObjectChange::Delete { .. } = change {
        return store.del_object(id).await;
    }

    let mut record = store
        .get_object(id)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
    change.apply(&mut record)?;
    store.set_object(id, record).await
}

/// Apply `changes` in order, reading and writing one object per change.
///
/// Stops at the first failure; changes already written stay written. Returns
/// the number of changes applied.
pub async fn apply_changes<S>(store: &S, changes: &[ObjectChange]) -> Result<usize, StoreError>
where
    S: ObjectStore + ?Sized,
{
    for (applied, change) in changes.iter().enumerate() {
        if let Err(e) = apply_one(store, change).await {
            warn!(id = change.target(), applied, "Object write failed: {}", e);
            return Err(e);
        }
        debug!(id = change.target(), "Applied object change");
    }
    Ok(changes.len())
}
