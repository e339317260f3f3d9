//! JSON state files.
//!
//! Two small documents survive restarts: the destination list and the set of
//! already forwarded message ids. A missing or corrupt file yields the
//! configured default; writes replace the whole file atomically.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use linked_hash_set::LinkedHashSet;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::Result;

/// A value persisted as one pretty-printed JSON file.
pub struct StateFile<T> {
    path: PathBuf,
    default: T,
}

impl<T> StateFile<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn new(path: impl Into<PathBuf>, default: T) -> Self {
        Self {
            path: path.into(),
            default,
        }
    }

    /// Read the saved value, or the default when the file is absent or
    /// cannot be parsed. Never fails.
    pub fn load(&self) -> T {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), %error, "cannot read state file");
                }
                return self.default.clone();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "state file is corrupt, using default");
                self.default.clone()
            }
        }
    }

    /// Replace the file with `value`, via a temporary file and rename so a
    /// crash mid-write cannot leave a truncated document behind.
    pub fn save(&self, value: &T) -> Result<()> {
        let raw = serde_json::to_string_pretty(value)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// The registered destination chats, in insertion order.
///
/// Every mutation is a read-modify-write of the backing file under an
/// exclusive lock, so an admin command cannot race another one.
pub struct DestinationRegistry {
    file: Mutex<StateFile<LinkedHashSet<String>>>,
}

impl DestinationRegistry {
    pub fn new(path: impl AsRef<Path>, initial: Vec<String>) -> Self {
        let default = initial.into_iter().collect();
        Self {
            file: Mutex::new(StateFile::new(path.as_ref(), default)),
        }
    }

    /// Register a destination. Returns `false` when it is already present,
    /// leaving the file untouched.
    pub async fn add(&self, id: &str) -> Result<bool> {
        let file = self.file.lock().await;
        let mut destinations = file.load();
        if !destinations.insert(id.to_string()) {
            return Ok(false);
        }
        file.save(&destinations)?;
        Ok(true)
    }

    /// Unregister a destination. Returns `false` when it was not present.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let file = self.file.lock().await;
        let mut destinations = file.load();
        if !destinations.remove(id) {
            return Ok(false);
        }
        file.save(&destinations)?;
        Ok(true)
    }

    pub async fn all(&self) -> Vec<String> {
        self.file.lock().await.load().into_iter().collect()
    }
}

/// The set of message ids that have already been forwarded.
pub struct ProcessedLedger {
    file: Mutex<StateFile<HashSet<String>>>,
}

impl ProcessedLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            file: Mutex::new(StateFile::new(path.as_ref(), HashSet::new())),
        }
    }

    pub async fn load(&self) -> HashSet<String> {
        self.file.lock().await.load()
    }

    pub async fn save(&self, processed: &HashSet<String>) -> Result<()> {
        self.file.lock().await.save(processed)
    }
}
