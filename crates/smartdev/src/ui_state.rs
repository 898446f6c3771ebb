//! Persisted UI state.
//!
//! Values are JSON strings under fixed keys. Reading is best effort: a missing
//! or unparsable value yields the default and is never reported as an error.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::tree::TreeState;

#[derive(Debug, thiserror::Error)]
pub enum UiStateError {
    #[error("Failed to write UI state to {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to encode UI state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Keys of persisted values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumIter)]
pub enum UiKey {
    #[strum(serialize = "devices.expanded")]
    Expanded,
    #[strum(serialize = "devices.tab")]
    Tab,
    #[strum(serialize = "devices.newType")]
    NewType,
    #[strum(serialize = "devices.newRoom")]
    NewRoom,
    #[strum(serialize = "devices.newFunc")]
    NewFunction,
}

/// String key-value storage.
pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String) -> Result<(), UiStateError>;

    fn remove(&mut self, key: &str) -> Result<(), UiStateError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: HashMap<String, String>,
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), UiStateError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), UiStateError> {
        self.values.remove(key);
        Ok(())
    }
}

/// Storage backed by a JSON object file, rewritten on every change.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl FileStorage {
    /// Open `path`. A missing or unreadable file starts out empty.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                debug!(path = %path.display(), "Discarding unparsable UI state: {}", e);
                BTreeMap::new()
            }),
            Err(e) => {
                debug!(path = %path.display(), "No UI state loaded: {}", e);
                BTreeMap::new()
            }
        };
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<(), UiStateError> {
        let contents = serde_json::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, contents).map_err(|e| UiStateError::Io(self.path.clone(), e))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), UiStateError> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), UiStateError> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// Last choices of the "new device" dialog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDeviceDefaults {
    pub device_type: Option<String>,
    pub room: Option<String>,
    pub function: Option<String>,
}

/// Typed access to persisted UI values.
#[derive(Debug, Clone, Default)]
pub struct UiState<S> {
    storage: S,
}

impl<S: Storage> UiState<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Decoded value of `key`, or the default when absent or unparsable.
    pub fn get<T: DeserializeOwned + Default>(&self, key: UiKey) -> T {
        let Some(raw) = self.storage.get(key.as_ref()) else {
            return T::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            debug!(key = key.as_ref(), "Ignoring unparsable UI value: {}", e);
            T::default()
        })
    }

    pub fn put<T: Serialize + ?Sized>(&mut self, key: UiKey, value: &T) -> Result<(), UiStateError> {
        let encoded = serde_json::to_string(value)?;
        self.storage.set(key.as_ref(), encoded)
    }

    pub fn expanded(&self) -> BTreeSet<String> {
        self.get(UiKey::Expanded)
    }

    pub fn set_expanded(&mut self, expanded: &BTreeSet<String>) -> Result<(), UiStateError> {
        self.put(UiKey::Expanded, expanded)
    }

    /// Tree state with the persisted expanded set and no selection.
    pub fn tree_state(&self) -> TreeState {
        TreeState {
            expanded: self.expanded(),
            selected: None,
        }
    }

    pub fn active_tab(&self) -> usize {
        self.get(UiKey::Tab)
    }

    pub fn set_active_tab(&mut self, tab: usize) -> Result<(), UiStateError> {
        self.put(UiKey::Tab, &tab)
    }

    pub fn new_device_defaults(&self) -> NewDeviceDefaults {
        NewDeviceDefaults {
            device_type: self.get(UiKey::NewType),
            room: self.get(UiKey::NewRoom),
            function: self.get(UiKey::NewFunction),
        }
    }

    pub fn set_new_device_defaults(&mut self, defaults: &NewDeviceDefaults) -> Result<(), UiStateError> {
        self.put(UiKey::NewType, &defaults.device_type)?;
        self.put(UiKey::NewRoom, &defaults.room)?;
        self.put(UiKey::NewFunction, &defaults.function)
    }

    /// Forget every persisted value.
    pub fn clear(&mut self) -> Result<(), UiStateError> {
        use strum::IntoEnumIterator;

        for key in UiKey::iter() {
            self.storage.remove(key.as_ref())?;
        }
        Ok(())
    }
}
