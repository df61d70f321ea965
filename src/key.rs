//! Remote snapshot addressing.
//!
//! Every snapshot lives at
//! `{owner}/{repo}/{label}/[{pr_number}/]{base_path}/{package}.lcov.info`.
//! Keys with a PR number are temporary, keys without one are the accepted
//! base for `label`.

use std::fmt::Write;
use std::path::{Component, Path};

use crate::error::{MonocovError, Result};

pub const SNAPSHOT_SUFFIX: &str = ".lcov.info";

/// Normalised monorepo base path: `./packages/` becomes `packages`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasePath(String);

impl BasePath {
    pub fn new(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for component in Path::new(raw).components() {
            match component {
                Component::Normal(s) => segments.push(s.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => {
                    return Err(MonocovError::Configuration(format!(
                        "monorepo base path '{raw}' must be relative and must not contain '..'"
                    )))
                }
            }
        }
        if segments.is_empty() {
            return Err(MonocovError::Configuration(format!(
                "monorepo base path '{raw}' does not name a folder"
            )));
        }
        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last folder of the base path, used in the report title.
    pub fn folder(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub owner: String,
    pub repo: String,
    pub label: String,
    pub pr_number: Option<u64>,
    pub package_name: Option<String>,
}

impl SnapshotKey {
    /// Base snapshot location for `label`.
    pub fn base(owner: &str, repo: &str, label: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            label: label.to_string(),
            pr_number: None,
            package_name: None,
        }
    }

    /// Temporary snapshot location for a pull request targeting `label`.
    pub fn temporary(owner: &str, repo: &str, label: &str, pr_number: u64) -> Self {
        Self {
            pr_number: Some(pr_number),
            ..Self::base(owner, repo, label)
        }
    }

    pub fn with_package(&self, package_name: &str) -> Self {
        Self {
            package_name: Some(package_name.to_string()),
            ..self.clone()
        }
    }

    /// The same key without the PR segment.
    pub fn as_base(&self) -> Self {
        Self {
            pr_number: None,
            ..self.clone()
        }
    }

    /// Storage path. Without a package name this is the listing prefix,
    /// ending in `/`.
    pub fn path(&self, base_path: &BasePath) -> String {
        let mut out = String::new();
        for segment in [&self.owner, &self.repo, &self.label] {
            out.push_str(&escape_segment(segment));
            out.push('/');
        }
        if let Some(pr) = self.pr_number {
            write!(out, "{pr}/").unwrap();
        }
        out.push_str(base_path.as_str());
        out.push('/');
        if let Some(ref name) = self.package_name {
            out.push_str(&escape_segment(name));
            out.push_str(SNAPSHOT_SUFFIX);
        }
        out
    }

    /// Recover the package name from a path under this key's prefix.
    pub fn package_from_path(&self, base_path: &BasePath, path: &str) -> Option<String> {
        let prefix = self.path(base_path);
        let file = path.strip_prefix(&prefix)?.strip_suffix(SNAPSHOT_SUFFIX)?;
        if file.is_empty() || file.contains('/') {
            return None;
        }
        Some(unescape_segment(file))
    }
}

/// Branch names may contain `/`; escape it (and `%` itself) so every key
/// field stays a single path segment.
fn escape_segment(s: &str) -> String {
    s.replace('%', "%25").replace('/', "%2F")
}

fn unescape_segment(s: &str) -> String {
    s.replace("%2F", "/").replace("%25", "%")
}
