//! Directory-backed store: each key is a file under the root.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::BlobStore;
use crate::error::{MonocovError, Result};

pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || key.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
            return Err(MonocovError::transfer(key, "invalid key"));
        }
        Ok(self.root.join(key))
    }
}

impl BlobStore for DirStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.file_for(key)?;
        std::fs::read(&path).map_err(|e| MonocovError::transfer(key, e))
    }

    fn put(&self, key: &str, body: &[u8]) -> Result<()> {
        let path = self.file_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MonocovError::transfer(key, e))?;
        }
        std::fs::write(&path, body).map_err(|e| MonocovError::transfer(key, e))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| MonocovError::transfer(prefix, e))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn copy(&self, from: &str, to: &str) -> Result<()> {
        let body = self.get(from)?;
        self.put(to, &body)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.file_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MonocovError::transfer(key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path());

        store.put("a/b/one.lcov.info", b"1").unwrap();
        store.put("a/b/two.lcov.info", b"2").unwrap();
        store.put("a/c/three.lcov.info", b"3").unwrap();

        assert_eq!(store.get("a/b/one.lcov.info").unwrap(), b"1");
        assert_eq!(
            store.list("a/b/").unwrap(),
            ["a/b/one.lcov.info", "a/b/two.lcov.info"]
        );
        assert_eq!(store.list("a/").unwrap().len(), 3);
        assert!(store.list("z/").unwrap().is_empty());
    }

    #[test]
    fn test_rename_and_missing_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path());

        store.put("x/1/p.lcov.info", b"data").unwrap();
        store.rename("x/1/p.lcov.info", "x/p.lcov.info").unwrap();
        assert_eq!(store.get("x/p.lcov.info").unwrap(), b"data");
        assert!(store.get("x/1/p.lcov.info").is_err());

        store.delete("x/1/p.lcov.info").unwrap();
    }

    #[test]
    fn test_rejects_traversal_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path());
        assert!(store.put("../escape", b"x").is_err());
        assert!(store.get("a//b").is_err());
    }

    #[test]
    fn test_list_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirStore::new(dir.path().join("absent"));
        assert!(store.list("").unwrap().is_empty());
    }
}
