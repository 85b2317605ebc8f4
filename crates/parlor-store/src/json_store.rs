//! Generic JSON-array file store.
//!
//! One file per record type, the whole array rewritten on every mutation.
//! Writes go through a temp file in the same directory followed by a rename
//! so a reader never observes a half-written array. A per-store mutex
//! serializes read-modify-write cycles within the process.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::StoreError;

/// A record that can live in a [`JsonStore`].
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Stable identifier of this record.
    fn id(&self) -> Uuid;
}

/// JSON-array file store for one record type.
pub struct JsonStore<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> JsonStore<T> {
    /// Create a store backed by `path`. The file is created on first save.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records. A missing file reads as an empty store.
    pub fn load(&self) -> Result<Vec<T>, StoreError> {
        read_array(&self.path)
    }

    /// Replace the entire contents of the store.
    pub fn save(&self, items: &[T]) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        write_array(&self.path, items)
    }

    /// Fetch one record by id.
    pub fn get(&self, id: Uuid) -> Result<Option<T>, StoreError> {
        Ok(self.load()?.into_iter().find(|r| r.id() == id))
    }

    /// Append a record and return it.
    pub fn insert(&self, item: T) -> Result<T, StoreError> {
        let _guard = self.lock.lock();
        let mut items: Vec<T> = read_array(&self.path)?;
        items.push(item.clone());
        write_array(&self.path, &items)?;
        Ok(item)
    }

    /// Replace the record with `item`'s id. Fails with [`StoreError::NotFound`]
    /// if no such record exists.
    pub fn replace(&self, item: T) -> Result<T, StoreError> {
        let _guard = self.lock.lock();
        let mut items: Vec<T> = read_array(&self.path)?;
        let slot = items
            .iter_mut()
            .find(|r| r.id() == item.id())
            .ok_or(StoreError::NotFound { id: item.id() })?;
        *slot = item.clone();
        write_array(&self.path, &items)?;
        Ok(item)
    }

    /// Apply `mutate` to the record with `id` and persist the result.
    pub fn update<F>(&self, id: Uuid, mutate: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut T),
    {
        let _guard = self.lock.lock();
        let mut items: Vec<T> = read_array(&self.path)?;
        let slot = items
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or(StoreError::NotFound { id })?;
        mutate(slot);
        let updated = slot.clone();
        write_array(&self.path, &items)?;
        Ok(updated)
    }

    /// Remove the record with `id`. Returns whether a record was removed.
    pub fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        let _guard = self.lock.lock();
        let mut items: Vec<T> = read_array(&self.path)?;
        let before = items.len();
        items.retain(|r| r.id() != id);
        if items.len() == before {
            return Ok(false);
        }
        write_array(&self.path, &items)?;
        Ok(true)
    }

    /// Retain only records matching `keep`, persisting the survivors.
    pub fn retain<F>(&self, keep: F) -> Result<usize, StoreError>
    where
        F: FnMut(&T) -> bool,
    {
        let _guard = self.lock.lock();
        let mut items: Vec<T> = read_array(&self.path)?;
        items.retain(keep);
        let remaining = items.len();
        write_array(&self.path, &items)?;
        Ok(remaining)
    }
}

fn read_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    match std::fs::read_to_string(path) {
        Ok(data) if data.trim().is_empty() => Ok(Vec::new()),
        Ok(data) => Ok(serde_json::from_str(&data)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Write `items` as pretty JSON via temp-file + rename.
fn write_array<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(items)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
