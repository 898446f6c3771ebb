//! Per-state side tables whose edits are staged until an explicit commit.

use std::collections::BTreeMap;

use serde::Serialize;

/// Direction of an alias conversion or target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Read,
    Write,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditError {
    #[error("No staged entry for state '{0}'")]
    UnknownState(String),

    #[error("State '{name}' has no {direction} function")]
    Stripped { name: String, direction: Direction },
}

/// One entry of a [`StagedTable`]: the object it belongs to, the value as last
/// seeded or committed, and the value being edited.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Staged<T> {
    pub id: String,
    pub original: T,
    pub current: T,
}

impl<T: PartialEq> Staged<T> {
    pub fn is_dirty(&self) -> bool {
        self.original != self.current
    }
}

/// Entries keyed by state name.
#[derive(Debug, Clone)]
pub(crate) struct StagedTable<T> {
    entries: BTreeMap<String, Staged<T>>,
}

impl<T> Default for StagedTable<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T: Clone + PartialEq> StagedTable<T> {
    /// Seed `name` with `value()` unless it is already present for the same
    /// object. An entry whose state now points at a different object counts as
    /// new and is re-seeded. Returns whether the entry was (re)seeded.
    pub fn seed(&mut self, name: &str, id: &str, value: impl FnOnce() -> T) -> bool {
        if self.entries.get(name).is_some_and(|entry| entry.id == id) {
            return false;
        }

        let original = value();
        self.entries.insert(
            name.to_string(),
            Staged {
                id: id.to_string(),
                current: original.clone(),
                original,
            },
        );
        true
    }

    pub fn get(&self, name: &str) -> Option<&Staged<T>> {
        self.entries.get(name)
    }

    pub fn current_mut(&mut self, name: &str) -> Option<&mut T> {
        self.entries.get_mut(name).map(|entry| &mut entry.current)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.entries.values().any(Staged::is_dirty)
    }

    /// Entries with uncommitted edits, by name.
    pub fn dirty(&self) -> impl Iterator<Item = (&str, &Staged<T>)> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_dirty())
            .map(|(name, entry)| (name.as_str(), entry))
    }

    /// Accept all edits as the new baseline.
    pub fn commit(&mut self) {
        for entry in self.entries.values_mut() {
            entry.original = entry.current.clone();
        }
    }

    /// Throw away all edits.
    pub fn discard(&mut self) {
        for entry in self.entries.values_mut() {
            entry.current = entry.original.clone();
        }
    }
}
