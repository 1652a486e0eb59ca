use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::embed::Embedding;
use crate::store::VectorIndex;
use crate::{Error, Result};

/// Name of an index within a [`IndexRegistry`].
///
/// 1 to 64 ASCII letters, digits, `-` or `_`, so it is always a safe file
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IndexId(String);

impl IndexId {
    pub const DEFAULT: &'static str = "default";

    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= 64
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(Error::InvalidInput(format!(
                "invalid index id {id:?}: use 1-64 letters, digits, '-' or '_'"
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for IndexId {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for IndexId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for IndexId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<IndexId> for String {
    fn from(id: IndexId) -> Self {
        id.0
    }
}

/// Per-index state: one writer at a time, any number of readers.
struct IndexSlot {
    path: PathBuf,
    build_lock: tokio::sync::Mutex<()>,
    current: RwLock<Option<Arc<VectorIndex>>>,
}

impl IndexSlot {
    fn cached(&self) -> Option<Arc<VectorIndex>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Named indexes stored as `<root>/<id>.json`.
///
/// Builds for the same id are serialised and only become visible once the
/// new index is fully persisted. Readers get an `Arc` snapshot and search
/// it without holding any lock, so a rebuild never disturbs a search in
/// flight. Indexes are loaded from disk lazily on first use.
///
/// The registry assumes it is the only writer of its root directory.
pub struct IndexRegistry {
    root: PathBuf,
    slots: Mutex<HashMap<IndexId, Arc<IndexSlot>>>,
}

impl IndexRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the index named `id` is persisted.
    pub fn path_for(&self, id: &IndexId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    fn slot(&self, id: &IndexId) -> Arc<IndexSlot> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let slot = slots.entry(id.clone()).or_insert_with(|| {
            Arc::new(IndexSlot {
                path: self.path_for(id),
                build_lock: tokio::sync::Mutex::new(()),
                current: RwLock::new(None),
            })
        });
        Arc::clone(slot)
    }

    /// Build, persist, and publish a new index for `id`, replacing the old one.
    ///
    /// Nothing is written and the previous index stays live if the entries
    /// are rejected.
    pub async fn build(
        &self,
        id: &IndexId,
        model: &str,
        entries: Vec<(String, Embedding)>,
    ) -> Result<Arc<VectorIndex>> {
        let slot = self.slot(id);
        let _writer = slot.build_lock.lock().await;

        let index = Arc::new(VectorIndex::build(model, entries)?);

        let path = slot.path.clone();
        let to_save = Arc::clone(&index);
        tokio::task::spawn_blocking(move || to_save.save(&path))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        *slot.current.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&index));

        tracing::info!(
            index = %id,
            entries = index.len(),
            dimension = index.dimension(),
            path = %slot.path.display(),
            "index built"
        );
        Ok(index)
    }

    /// Current index for `id`, loading it from disk if needed.
    pub async fn get(&self, id: &IndexId) -> Result<Arc<VectorIndex>> {
        let slot = self.slot(id);
        if let Some(index) = slot.cached() {
            return Ok(index);
        }

        let path = slot.path.clone();
        let loaded = tokio::task::spawn_blocking(move || VectorIndex::load(&path))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        // a build that finished while we were reading wins
        let mut current = slot.current.write().unwrap_or_else(|e| e.into_inner());
        let index = current.get_or_insert_with(|| Arc::new(loaded));
        tracing::debug!(index = %id, entries = index.len(), "index loaded");
        Ok(Arc::clone(index))
    }

    /// Whether an index for `id` is loaded or present on disk.
    pub fn exists(&self, id: &IndexId) -> bool {
        self.slot(id).cached().is_some() || self.path_for(id).is_file()
    }
}
