//! Persisted gate state and where it lives.

use crate::error::StoreError;
use callgate_circuitbreaker::CircuitSnapshot;
use callgate_core::ResourceId;
use callgate_queue::QueueSnapshot;
use callgate_ratelimiter::RateState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Everything the gate needs to resume after a restart, keyed by resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSnapshot<P> {
    pub rates: BTreeMap<ResourceId, RateState>,
    pub circuits: BTreeMap<ResourceId, CircuitSnapshot>,
    pub queues: BTreeMap<ResourceId, QueueSnapshot<P>>,
}

impl<P> Default for GateSnapshot<P> {
    fn default() -> Self {
        Self {
            rates: BTreeMap::new(),
            circuits: BTreeMap::new(),
            queues: BTreeMap::new(),
        }
    }
}

/// Loads and saves [`GateSnapshot`]s.
pub trait StateStore<P>: Send + Sync {
    /// The last saved snapshot, or `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<GateSnapshot<P>>, StoreError>;

    /// Replaces the saved snapshot.
    fn save(&self, snapshot: &GateSnapshot<P>) -> Result<(), StoreError>;
}

/// Keeps the snapshot in memory. Useful in tests and for hand-over between
/// gates in one process.
pub struct MemoryStore<P> {
    snapshot: Mutex<Option<GateSnapshot<P>>>,
}

impl<P> MemoryStore<P> {
    pub fn new() -> Self {
        Self {
            snapshot: Mutex::new(None),
        }
    }
}

impl<P> Default for MemoryStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> StateStore<P> for MemoryStore<P>
where
    P: Clone + Send,
{
    fn load(&self) -> Result<Option<GateSnapshot<P>>, StoreError> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, snapshot: &GateSnapshot<P>) -> Result<(), StoreError> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(snapshot.clone());
        Ok(())
    }
}

/// Stores the snapshot as pretty-printed JSON in a single file.
///
/// Writes go to a sibling temporary file that is then renamed over the
/// target, so a crash never leaves a half-written state file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl<P> StateStore<P> for JsonFileStore
where
    P: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<GateSnapshot<P>>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn save(&self, snapshot: &GateSnapshot<P>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }
}
