//! Alias targets of device states, staged for editing.

use tracing::debug;

use super::staged::EditError;
use super::staged::StagedTable;
use super::DetectorState;
use crate::objects::AliasEndpoint;
use crate::objects::Objects;
use crate::store::ObjectChange;

/// Editable alias targets keyed by state name, seeded like
/// [`super::FxTable`].
#[derive(Debug, Clone, Default)]
pub struct EndpointTable {
    table: StagedTable<AliasEndpoint>,
}

impl EndpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed entries for every wired alias state among `states`. Returns how
    /// many entries were newly seeded.
    pub fn update<'a>(
        &mut self,
        states: impl IntoIterator<Item = &'a DetectorState>,
        objects: &Objects,
    ) -> usize {
        let mut seeded = 0;
        for state in states {
            let Some(id) = state.id.as_deref() else {
                continue;
            };
            let Some(endpoint) = objects.get(id).and_then(|object| object.alias_endpoint()) else {
                continue;
            };

            if self.table.seed(&state.name, id, || endpoint.clone()) {
                seeded += 1;
            }
        }

        if seeded > 0 {
            debug!(seeded, total = self.table.len(), "Seeded alias endpoints");
        }
        seeded
    }

    pub fn get(&self, name: &str) -> Option<&AliasEndpoint> {
        self.table.get(name).map(|entry| &entry.current)
    }

    /// Stage a new target. Split targets with equal directions collapse into
    /// a single one.
    pub fn set(&mut self, name: &str, endpoint: AliasEndpoint) -> Result<(), EditError> {
        let current = self
            .table
            .current_mut(name)
            .ok_or_else(|| EditError::UnknownState(name.to_string()))?;
        *current = endpoint.normalized();
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.table.is_dirty()
    }

    pub fn changes(&self) -> Vec<ObjectChange> {
        self.table
            .dirty()
            .map(|(_, entry)| ObjectChange::SetAliasEndpoint {
                id: entry.id.clone(),
                endpoint: entry.current.clone(),
            })
            .collect()
    }

    pub fn commit(&mut self) {
        self.table.commit();
    }

    pub fn discard(&mut self) {
        self.table.discard();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::AliasConfig;
    use crate::objects::ObjectRecord;
    use crate::objects::ObjectType;

    fn setup() -> (Objects, Vec<DetectorState>) {
        let wired = ObjectRecord::new("alias.0.d.SET", ObjectType::State).with_alias(AliasConfig {
            id: Some(AliasEndpoint::Split {
                read: "hm-rpc.0.A.STATE".to_string(),
                write: "hm-rpc.0.A.SET".to_string(),
            }),
            ..Default::default()
        });
        let unwired = ObjectRecord::new("alias.0.d.ACTUAL", ObjectType::State);
        let objects = [wired, unwired]
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        let states = ["SET", "ACTUAL"]
            .into_iter()
            .map(|name| DetectorState {
                id: Some(format!("alias.0.d.{name}")),
                name: name.to_string(),
                ..Default::default()
            })
            .collect();
        (objects, states)
    }

    #[test]
    fn test_only_wired_aliases_are_seeded() {
        let (objects, states) = setup();
        let mut table = EndpointTable::new();

        assert_eq!(table.update(&states, &objects), 1);
        assert_eq!(table.get("SET").map(AliasEndpoint::write_id), Some("hm-rpc.0.A.SET"));
        assert!(table.get("ACTUAL").is_none());
        assert_eq!(
            table.set("ACTUAL", AliasEndpoint::Single("x".to_string())),
            Err(EditError::UnknownState("ACTUAL".to_string()))
        );
    }

    #[test]
    fn test_split_with_equal_ids_collapses() {
        let (objects, states) = setup();
        let mut table = EndpointTable::new();
        table.update(&states, &objects);

        table
            .set(
                "SET",
                AliasEndpoint::Split {
                    read: "hm-rpc.0.B.LEVEL".to_string(),
                    write: "hm-rpc.0.B.LEVEL".to_string(),
                },
            )
            .unwrap();

        assert_eq!(
            table.changes(),
            vec![ObjectChange::SetAliasEndpoint {
                id: "alias.0.d.SET".to_string(),
                endpoint: AliasEndpoint::Single("hm-rpc.0.B.LEVEL".to_string()),
            }]
        );

        table.discard();
        assert!(!table.is_dirty());
    }
}
