//! File-backed state store for native hosts.
//!
//! All keys of one store live in a single JSON object on disk. Every write
//! rewrites the whole file through a temporary sibling and a rename, so a
//! crash mid-write leaves the previous snapshot in place.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use log::warn;

use super::error::{StorageError, StorageResult};
use super::traits::StateStore;

/// A `StateStore` persisted as a JSON object in a single file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens the store at `path`. The file is created on first write.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| map_io_err(&err))?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the backing file. Used to end a file-backed session.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> StorageResult<()> {
        let _guard = self.lock()?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(map_io_err(&err)),
        }
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StorageError::Lock("mutex poisoned".to_string()))
    }

    fn read_all(&self) -> StorageResult<BTreeMap<String, String>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(StorageError::Read(err.to_string())),
        };
        if raw.is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Like `read_all`, but a corrupt file counts as empty so the next write
    /// replaces it.
    fn read_for_update(&self) -> StorageResult<BTreeMap<String, String>> {
        match self.read_all() {
            Err(StorageError::Serialization(err)) => {
                warn!("overwriting corrupt state file {}: {err}", self.path.display());
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|err| map_io_err(&err))?;
        fs::rename(&tmp, &self.path).map_err(|err| map_io_err(&err))
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let _guard = self.lock()?;
        Ok(self.read_all()?.remove(key).map(String::into_bytes))
    }

    fn set(&self, key: &str, value: &[u8]) -> StorageResult<()> {
        let value = std::str::from_utf8(value)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let _guard = self.lock()?;
        let mut entries = self.read_for_update()?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let _guard = self.lock()?;
        let mut entries = self.read_for_update()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

fn map_io_err(err: &std::io::Error) -> StorageError {
    StorageError::Write(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("durable.json");

        let store = FileStore::open(&path).unwrap();
        assert!(store.get("validated_biometrics").unwrap().is_none());
        store
            .set("validated_biometrics", br#"{"face":true}"#)
            .unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("validated_biometrics").unwrap(),
            Some(br#"{"face":true}"#.to_vec())
        );
    }

    #[test]
    fn test_remove_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("session.json")).unwrap();
        store.set("a", b"1").unwrap();
        store.set("b", b"2").unwrap();
        store.remove("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
        assert_eq!(store.get("b").unwrap(), Some(b"2".to_vec()));

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("durable.json");
        fs::write(&path, b"{not json").unwrap();
        let store = FileStore::open(&path).unwrap();
        assert!(matches!(
            store.get("anything"),
            Err(StorageError::Serialization(_))
        ));
    }

    #[test]
    fn test_write_replaces_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("durable.json");
        fs::write(&path, b"{not json").unwrap();
        let store = FileStore::open(&path).unwrap();

        store.set("validated_biometrics", br#"{"face":true}"#).unwrap();

        assert_eq!(
            store.get("validated_biometrics").unwrap(),
            Some(br#"{"face":true}"#.to_vec())
        );
    }
}
