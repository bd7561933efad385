/// Client-local key/value storage
///
/// A tiny JSON object on disk, read and rewritten whole on every access.
/// It only ever holds a handful of user preferences.
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config;
use crate::error::StorageError;

const STORAGE_FILE: &str = "preferences.json";

#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    /// Storage backed by a specific file
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Storage in the user's config directory:
    /// - Linux: ~/.config/food-comparator/preferences.json
    /// - macOS: ~/Library/Application Support/food-comparator/preferences.json
    /// - Windows: %APPDATA%\food-comparator\preferences.json
    pub fn user_default() -> Result<Self, StorageError> {
        let dir = config::app_config_dir().ok_or(StorageError::NoConfigDir)?;
        Ok(Self::at(dir.join(STORAGE_FILE)))
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_all()?.remove(key))
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        // A corrupt file is replaced; a read failure must not clobber other keys
        let mut items = match self.read_all() {
            Ok(items) => items,
            Err(StorageError::Corrupt { .. }) => BTreeMap::new(),
            Err(e) => return Err(e),
        };
        items.insert(key.to_string(), value.to_string());
        self.write_all(&items)
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_slice(&content).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn write_all(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_string_pretty(items).map_err(|e| StorageError::Corrupt {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&self.path, json).map_err(|e| self.io_error(e))
    }

    fn io_error(&self, e: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::at(dir.path().join("nested").join("prefs.json"));

        assert_eq!(storage.get_item("theme-preference").unwrap(), None);
    }

    #[test]
    fn test_set_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::at(dir.path().join("nested").join("prefs.json"));

        storage.set_item("theme-preference", "dark").unwrap();
        storage.set_item("other", "value").unwrap();
        storage.set_item("theme-preference", "light").unwrap();

        assert_eq!(storage.get_item("theme-preference").unwrap().as_deref(), Some("light"));
        assert_eq!(storage.get_item("other").unwrap().as_deref(), Some("value"));
    }

    #[test]
    fn test_corrupt_file_is_reported_then_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "not json").unwrap();
        let storage = LocalStorage::at(&path);

        assert!(matches!(storage.get_item("k"), Err(StorageError::Corrupt { .. })));

        storage.set_item("k", "v").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_invalid_utf8_counts_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        let storage = LocalStorage::at(&path);

        assert!(matches!(storage.get_item("k"), Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn test_unreadable_storage_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be: reading fails with an I/O error
        let path = dir.path().join("prefs.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();
        let storage = LocalStorage::at(&path);

        assert!(matches!(
            storage.set_item("theme-preference", "dark"),
            Err(StorageError::Io { .. })
        ));
        assert!(path.is_dir());
        assert_eq!(std::fs::read_to_string(path.join("keep")).unwrap(), "x");
    }
}
