//! Convert functions of alias states, staged for editing.

use serde::Serialize;
use tracing::debug;

use super::staged::Direction;
use super::staged::EditError;
use super::staged::StagedTable;
use super::DetectorState;
use crate::objects::ObjectRecord;
use crate::objects::Objects;
use crate::store::ObjectChange;

/// Read and write conversion expressions of one alias state. `None` means the
/// direction does not apply to the state and cannot be edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Fx {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub write: Option<String>,
}

impl Fx {
    /// Conversion functions of `object` as they apply to `state`.
    ///
    /// Momentary (`button*`) states have no read function. Read-only states and
    /// `value*`/`indicator*` states have no write function.
    pub fn for_state(state: &DetectorState, object: &ObjectRecord) -> Self {
        let role = state
            .default_role
            .as_deref()
            .or_else(|| object.role())
            .unwrap_or_default();
        let alias = object.common.alias.as_ref();

        let read = (!role.starts_with("button"))
            .then(|| alias.and_then(|a| a.read.clone()).unwrap_or_default());
        let write = (state.write && !role.starts_with("value") && !role.starts_with("indicator"))
            .then(|| alias.and_then(|a| a.write.clone()).unwrap_or_default());

        Self { read, write }
    }

    fn slot_mut(&mut self, direction: Direction) -> &mut Option<String> {
        match direction {
            Direction::Read => &mut self.read,
            Direction::Write => &mut self.write,
        }
    }
}

/// Editable convert functions keyed by state name.
///
/// Entries are seeded from the alias objects the first time a state name is
/// seen and left alone on later passes, so edits survive snapshot updates
/// until they are committed or discarded.
#[derive(Debug, Clone, Default)]
pub struct FxTable {
    table: StagedTable<Fx>,
}

impl FxTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed entries for every alias state among `states`. Returns how many
    /// entries were newly seeded.
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
            let Some(object) = objects.get(id).filter(|object| object.is_alias()) else {
                continue;
            };

            if self.table.seed(&state.name, id, || Fx::for_state(state, object)) {
                seeded += 1;
            }
        }

        if seeded > 0 {
            debug!(seeded, total = self.table.len(), "Seeded convert functions");
        }
        seeded
    }

    pub fn get(&self, name: &str) -> Option<&Fx> {
        self.table.get(name).map(|entry| &entry.current)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Stage a new expression. An empty expression removes the function.
    pub fn set(
        &mut self,
        name: &str,
        direction: Direction,
        expression: impl Into<String>,
    ) -> Result<(), EditError> {
        let fx = self
            .table
            .current_mut(name)
            .ok_or_else(|| EditError::UnknownState(name.to_string()))?;

        match fx.slot_mut(direction) {
            Some(slot) => {
                *slot = expression.into();
                Ok(())
            }
            None => Err(EditError::Stripped {
                name: name.to_string(),
                direction,
            }),
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.table.is_dirty()
    }

    /// Writes needed to persist the staged edits. Only changed directions are
    /// included.
    pub fn changes(&self) -> Vec<ObjectChange> {
        self.table
            .dirty()
            .map(|(_, entry)| {
                let changed = |original: &Option<String>, current: &Option<String>| {
                    (original != current).then(|| current.clone()).flatten()
                };
                ObjectChange::SetAliasFx {
                    id: entry.id.clone(),
                    read: changed(&entry.original.read, &entry.current.read),
                    write: changed(&entry.original.write, &entry.current.write),
                }
            })
            .collect()
    }

    /// Mark staged edits as saved.
    pub fn commit(&mut self) {
        self.table.commit();
    }

    pub fn discard(&mut self) {
        self.table.discard();
    }
}
