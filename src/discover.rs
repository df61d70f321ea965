/// Local discovery of per-package LCOV snapshots under the monorepo root.
///
/// Rules:
///   - a file named `lcov.info` or `*.lcov.info` is a snapshot
///   - its package is the first directory beneath the root
///   - the walk stops at [`MAX_DEPTH`] and never enters dependency folders
///   - when a package has several snapshots, the lexicographically first
///     path wins and the rest are reported as warnings
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{MonocovError, Result};
use crate::key::SNAPSHOT_SUFFIX;

pub const MAX_DEPTH: usize = 10;

/// Directory names owned by package managers.
pub const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "bower_components",
    "jspm_packages",
    ".pnpm-store",
    ".yarn",
    "vendor",
    ".git",
];

/// A snapshot file found on disk, already attributed to its package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSnapshot {
    pub package_name: String,
    pub path: PathBuf,
}

pub fn is_snapshot_file(name: &str) -> bool {
    name == "lcov.info" || name.ends_with(SNAPSHOT_SUFFIX)
}

fn is_excluded(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

/// Find every package snapshot under `root`, ordered by package path.
pub fn discover(root: &Path) -> Result<Vec<LocalSnapshot>> {
    if !root.is_dir() {
        return Err(MonocovError::Configuration(format!(
            "monorepo base path '{}' is not a directory",
            root.display()
        )));
    }

    let mut found: Vec<(PathBuf, String)> = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .max_depth(MAX_DEPTH)
        .into_iter()
        .filter_entry(|e| !is_excluded(e));

    for entry in walker {
        let entry = entry.map_err(|e| {
            MonocovError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
            )
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if !is_snapshot_file(name) {
            continue;
        }

        let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
        match package_of(rel) {
            Some(package) => found.push((entry.path().to_path_buf(), package)),
            None => warn!(
                "Ignoring {}: snapshots must live inside a package folder",
                entry.path().display()
            ),
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));

    let mut seen = HashSet::new();
    let mut snapshots = Vec::new();
    for (path, package_name) in found {
        if !seen.insert(package_name.clone()) {
            warn!(
                "Package '{}' has more than one snapshot; ignoring {}",
                package_name,
                path.display()
            );
            continue;
        }
        debug!("Found snapshot for '{}' at {}", package_name, path.display());
        snapshots.push(LocalSnapshot { package_name, path });
    }

    snapshots.sort_by(|a, b| a.package_name.cmp(&b.package_name));
    Ok(snapshots)
}

/// First path segment beneath the root, if the file is nested in one.
fn package_of(rel: &Path) -> Option<String> {
    let mut components = rel.components();
    let first = components.next()?;
    components.next()?;
    Some(first.as_os_str().to_string_lossy().into_owned())
}
