#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use monocov::config::{Settings, StoreConfig};
use monocov::error::{MonocovError, Result};
use monocov::github::CommentSink;
use monocov::lifecycle::TriggerContext;
use monocov::store::{BlobStore, DirStore};
use tempfile::TempDir;

/// A scratch monorepo (`<tmp>/repo/packages/...`) and a directory store.
/// The caller must hold onto `TempDir` to keep the directory alive.
pub struct Fixture {
    pub dir: TempDir,
    pub store: DirStore,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("repo/packages")).unwrap();
        let store = DirStore::new(dir.path().join("store"));
        Self { dir, store }
    }

    pub fn checkout(&self) -> PathBuf {
        self.dir.path().join("repo")
    }

    pub fn packages(&self) -> PathBuf {
        self.checkout().join("packages")
    }

    pub fn settings(&self, main_branch: &str) -> Settings {
        Settings::new("./packages", "acme", "mono", main_branch, 0.1)
            .unwrap()
            .in_directory(&self.checkout())
            .with_store(StoreConfig::Dir(self.store.root().to_path_buf()))
    }

    /// Write `packages/<package>/coverage/lcov.info`.
    pub fn write_local(&self, package: &str, body: &str) {
        write_file(&self.packages().join(package).join("coverage/lcov.info"), body);
    }

    pub fn remove_local(&self) {
        std::fs::remove_dir_all(self.packages()).unwrap();
        std::fs::create_dir_all(self.packages()).unwrap();
    }
}

pub fn write_file(path: &Path, body: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, body).unwrap();
}

/// A single-file LCOV snapshot with the given totals.
pub fn lcov(hit: u64, found: u64) -> String {
    format!("TN:\nSF:src/index.ts\nLF:{found}\nLH:{hit}\nend_of_record\n")
}

pub fn base_key(label: &str, package: &str) -> String {
    format!("acme/mono/{label}/packages/{package}.lcov.info")
}

pub fn temp_key(label: &str, pr: u64, package: &str) -> String {
    format!("acme/mono/{label}/{pr}/packages/{package}.lcov.info")
}

pub fn open_pr(pr_number: u64, base_branch: &str) -> TriggerContext {
    TriggerContext {
        pr_number,
        merged: false,
        base_branch: base_branch.to_string(),
        head_branch: "feature".to_string(),
    }
}

pub fn merged_pr(pr_number: u64, base_branch: &str) -> TriggerContext {
    TriggerContext {
        merged: true,
        ..open_pr(pr_number, base_branch)
    }
}

/// Remembers every upserted comment.
#[derive(Default)]
pub struct RecordingComments {
    pub posted: Mutex<Vec<(String, String)>>,
}

impl RecordingComments {
    pub fn last_body(&self) -> String {
        self.posted.lock().unwrap().last().unwrap().1.clone()
    }
}

impl CommentSink for RecordingComments {
    fn upsert(&self, marker: &str, body: &str) -> anyhow::Result<()> {
        self.posted
            .lock()
            .unwrap()
            .push((marker.to_string(), body.to_string()));
        Ok(())
    }
}

/// Wraps a store and fails selected operations for keys containing a pattern.
pub struct FlakyStore<S> {
    pub inner: S,
    pub fail_get: Vec<String>,
    pub fail_delete: Vec<String>,
    pub gets: Mutex<Vec<String>>,
}

impl<S: BlobStore> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            fail_get: Vec::new(),
            fail_delete: Vec::new(),
            gets: Mutex::new(Vec::new()),
        }
    }

    fn fails(patterns: &[String], key: &str) -> bool {
        patterns.iter().any(|p| key.contains(p.as_str()))
    }
}

impl<S: BlobStore> BlobStore for FlakyStore<S> {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.gets.lock().unwrap().push(key.to_string());
        if Self::fails(&self.fail_get, key) {
            return Err(MonocovError::transfer(key, "injected get failure"));
        }
        self.inner.get(key)
    }

    fn put(&self, key: &str, body: &[u8]) -> Result<()> {
        self.inner.put(key, body)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.list(prefix)
    }

    fn copy(&self, from: &str, to: &str) -> Result<()> {
        self.inner.copy(from, to)
    }

    fn delete(&self, key: &str) -> Result<()> {
        if Self::fails(&self.fail_delete, key) {
            return Err(MonocovError::transfer(key, "injected delete failure"));
        }
        self.inner.delete(key)
    }
}
