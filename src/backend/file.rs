//! File-persisted quota-limited backend.
//!
//! Keeps a [`MemoryBackend`] image and rewrites a JSON snapshot after every
//! mutation, so the cache survives process restarts.
//!
//! Each rewrite costs time proportional to the whole image. Writes that leave
//! a value unchanged, such as a read refreshing a key that is already the
//! most recent, skip the rewrite.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Backend, BackendError, MemoryBackend};

/// On-disk snapshot layout.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    items: Vec<(String, String)>,
}

// == File Backend ==
/// Backend persisted to a single snapshot file.
#[derive(Debug)]
pub struct FileBackend {
    /// In-memory image
    image: MemoryBackend,
    /// Snapshot location
    path: PathBuf,
}

impl FileBackend {
    // == Constructor ==
    /// Opens the snapshot at `path`, creating an empty one if missing.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, BackendError> {
        let path = path.as_ref().to_path_buf();

        let snapshot = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Snapshot::default(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            items = snapshot.items.len(),
            capacity,
            "Opened file backend"
        );

        let backend = Self {
            image: MemoryBackend::from_pairs(capacity, snapshot.items),
            path,
        };
        backend.persist()?;
        Ok(backend)
    }

    /// Snapshot location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Units currently used.
    pub fn used(&self) -> usize {
        self.image.used()
    }

    fn persist(&self) -> Result<(), BackendError> {
        let snapshot = Snapshot {
            items: self
                .image
                .pairs()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        let text = serde_json::to_string(&snapshot)?;

        // Write beside the target then rename, so a crash never leaves a torn file
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;

        debug!(path = %self.path.display(), items = snapshot.items.len(), "Snapshot written");
        Ok(())
    }

    /// Runs `op` on the image and persists; restores the image if persisting fails.
    fn mutate<F>(&mut self, op: F) -> Result<(), BackendError>
    where
        F: FnOnce(&mut MemoryBackend) -> Result<(), BackendError>,
    {
        let before = self.image.clone();
        op(&mut self.image)?;
        if let Err(e) = self.persist() {
            self.image = before;
            return Err(e);
        }
        Ok(())
    }
}

impl Backend for FileBackend {
    fn set_item(&mut self, key: &str, value: &str) -> Result<(), BackendError> {
        if self.image.get_item(key).as_deref() == Some(value) {
            return Ok(());
        }
        self.mutate(|image| image.set_item(key, value))
    }

    fn get_item(&self, key: &str) -> Option<String> {
        self.image.get_item(key)
    }

    fn remove_item(&mut self, key: &str) -> Result<(), BackendError> {
        if self.image.get_item(key).is_none() {
            return Ok(());
        }
        self.mutate(|image| image.remove_item(key))
    }

    fn clear(&mut self) -> Result<(), BackendError> {
        self.mutate(|image| image.clear())
    }

    fn len(&self) -> usize {
        self.image.len()
    }

    fn key(&self, index: usize) -> Option<String> {
        self.image.key(index)
    }
}
