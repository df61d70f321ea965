//! Loading current and baseline snapshots.
//!
//! Current coverage must be complete: any read or parse failure aborts.
//! Baselines are best effort per package and walk a [`FallbackChain`] of
//! branch labels; a package whose chain is exhausted simply has no baseline.

use log::{info, warn};
use rayon::prelude::*;

use crate::discover::LocalSnapshot;
use crate::error::{MonocovError, Result};
use crate::key::{BasePath, SnapshotKey};
use crate::lcov;
use crate::model::PackageCoverage;
use crate::store::BlobStore;

/// A store together with the repository and base path that scope its keys.
#[derive(Clone, Copy)]
pub struct Remote<'a> {
    pub store: &'a dyn BlobStore,
    pub owner: &'a str,
    pub repo: &'a str,
    pub base_path: &'a BasePath,
}

impl<'a> Remote<'a> {
    pub fn base_key(&self, label: &str) -> SnapshotKey {
        SnapshotKey::base(self.owner, self.repo, label)
    }

    pub fn temporary_key(&self, label: &str, pr_number: u64) -> SnapshotKey {
        SnapshotKey::temporary(self.owner, self.repo, label, pr_number)
    }

    pub fn path(&self, key: &SnapshotKey) -> String {
        key.path(self.base_path)
    }

    fn fetch(&self, key: &SnapshotKey, package_name: &str) -> Result<PackageCoverage> {
        let path = self.path(key);
        let bytes = self.store.get(&path)?;
        let records = lcov::parse(&path, &bytes)?;
        Ok(PackageCoverage::new(package_name, records))
    }
}

/// Read local snapshots one after another; the first failure aborts.
pub fn read_local(snapshots: &[LocalSnapshot]) -> Result<Vec<PackageCoverage>> {
    let mut packages = Vec::with_capacity(snapshots.len());
    for snapshot in snapshots {
        let source = snapshot.path.display().to_string();
        let bytes = std::fs::read(&snapshot.path).map_err(|e| {
            warn!(
                "The snapshot for '{}' at {} cannot be read",
                snapshot.package_name, source
            );
            MonocovError::parse(&source, e.to_string())
        })?;
        let records = lcov::parse(&source, &bytes).map_err(|e| {
            warn!(
                "The snapshot for '{}' cannot be parsed; it is missing or was generated empty",
                snapshot.package_name
            );
            e
        })?;
        packages.push(PackageCoverage::new(&snapshot.package_name, records));
    }
    Ok(packages)
}

/// Fetch every snapshot under a temporary prefix. Any failure aborts.
pub fn read_remote(remote: Remote<'_>, prefix: &SnapshotKey) -> Result<Vec<PackageCoverage>> {
    let listing = remote.store.list(&remote.path(prefix))?;
    let names: Vec<String> = listing
        .iter()
        .filter_map(|path| prefix.package_from_path(remote.base_path, path))
        .collect();

    names
        .par_iter()
        .map(|name| remote.fetch(&prefix.with_package(name), name))
        .collect()
}

/// A baseline together with the label it was found under.
#[derive(Debug, Clone)]
pub struct Baseline {
    pub coverage: PackageCoverage,
    pub label: String,
}

/// Ordered list of labels to try for a package's baseline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackChain {
    labels: Vec<String>,
}

impl FallbackChain {
    /// Branch base first, then the main branch base unless they are the same.
    pub fn new(branch: &str, main_branch: &str) -> Self {
        let mut labels = vec![branch.to_string()];
        if branch != main_branch {
            labels.push(main_branch.to_string());
        }
        Self { labels }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// First label that yields a readable snapshot, if any.
    pub fn resolve(&self, remote: Remote<'_>, package_name: &str) -> Option<Baseline> {
        for (attempt, label) in self.labels.iter().enumerate() {
            let key = remote.base_key(label).with_package(package_name);
            match remote.fetch(&key, package_name) {
                Ok(coverage) => {
                    if attempt > 0 {
                        info!("Using '{label}' baseline for '{package_name}'");
                    }
                    return Some(Baseline {
                        coverage,
                        label: label.clone(),
                    });
                }
                Err(e) => warn!("No '{label}' baseline for '{package_name}': {e}"),
            }
        }
        warn!("No baseline found for '{package_name}'");
        None
    }
}

/// Resolve baselines for all packages in parallel. Packages without one
/// are left out.
pub fn retrieve_base(
    remote: Remote<'_>,
    packages: &[PackageCoverage],
    chain: &FallbackChain,
) -> Vec<Baseline> {
    packages
        .par_iter()
        .filter_map(|pkg| chain.resolve(remote, pkg.package_name()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_skips_duplicate_main() {
        assert_eq!(FallbackChain::new("master", "master").labels(), ["master"]);
        assert_eq!(
            FallbackChain::new("feature-x", "master").labels(),
            ["feature-x", "master"]
        );
    }
}
