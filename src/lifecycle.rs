//! Snapshot lifecycle: collect, report (with cleanup) and merge.
//!
//! A pull request that is still open is collected and then reported; a
//! merged one promotes its temporary snapshots to the branch base. Merge is
//! the only operation that writes base snapshots.

use anyhow::Result;
use log::{info, warn};
use rayon::prelude::*;

use crate::config::{Mode, Settings};
use crate::diff::{compute_diff, CoverageDiff};
use crate::discover::discover;
use crate::error::MonocovError;
use crate::github::CommentSink;
use crate::lcov;
use crate::model::PackageCoverage;
use crate::report::DiffReport;
use crate::retrieve::{read_local, read_remote, retrieve_base, FallbackChain, Remote};
use crate::store::BlobStore;

/// The pull request event that triggered this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerContext {
    pub pr_number: u64,
    pub merged: bool,
    /// Branch the pull request targets.
    pub base_branch: String,
    pub head_branch: String,
}

impl TriggerContext {
    /// Operations to run when no mode was requested explicitly.
    pub fn inferred_modes(&self) -> Vec<Mode> {
        if self.merged {
            vec![Mode::Merge]
        } else {
            vec![Mode::Collect, Mode::Report]
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct ReportOutcome {
    pub diff: CoverageDiff,
    pub body: String,
    pub cleanup: CleanupSummary,
}

#[derive(Debug)]
pub enum Outcome {
    Collected { uploaded: usize },
    Reported(ReportOutcome),
    Merged { moved: usize },
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<Outcome>,
}

impl RunSummary {
    pub fn breach_count(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                Outcome::Reported(r) => r.diff.breach_count,
                _ => 0,
            })
            .sum()
    }

    /// Turn breaches into an error when `fail_on_threshold` is set,
    /// otherwise only warn about them.
    pub fn enforce_threshold(&self, settings: &Settings) -> Result<(), MonocovError> {
        let count = self.breach_count();
        if count == 0 {
            return Ok(());
        }
        let breach = MonocovError::ThresholdBreach {
            count,
            threshold: settings.threshold,
        };
        if settings.fail_on_threshold {
            return Err(breach);
        }
        warn!("{breach}");
        Ok(())
    }
}

pub struct Lifecycle<'a> {
    settings: &'a Settings,
    store: Option<&'a dyn BlobStore>,
    comments: &'a dyn CommentSink,
}

impl<'a> Lifecycle<'a> {
    pub fn new(
        settings: &'a Settings,
        store: Option<&'a dyn BlobStore>,
        comments: &'a dyn CommentSink,
    ) -> Self {
        Self {
            settings,
            store,
            comments,
        }
    }

    /// Run `mode`, or the modes implied by the trigger when `None`.
    pub fn run(&self, trigger: &TriggerContext, mode: Option<Mode>) -> Result<RunSummary> {
        let modes = match mode {
            Some(m) => vec![m],
            None => trigger.inferred_modes(),
        };
        for m in &modes {
            self.check(*m)?;
        }

        let mut summary = RunSummary::default();
        for m in modes {
            info!("Running {m} for PR #{}", trigger.pr_number);
            let outcome = match m {
                Mode::Collect => Outcome::Collected {
                    uploaded: self.collect(trigger)?,
                },
                Mode::Report => Outcome::Reported(self.report(trigger)?),
                Mode::Merge => Outcome::Merged {
                    moved: self.merge(trigger)?,
                },
            };
            summary.outcomes.push(outcome);
        }
        Ok(summary)
    }

    fn check(&self, mode: Mode) -> Result<(), MonocovError> {
        self.settings.validate_for(mode)?;
        if mode.requires_store() && self.store.is_none() {
            return Err(MonocovError::Configuration(format!(
                "mode '{mode}' needs an open snapshot store"
            )));
        }
        Ok(())
    }

    fn remote(&self) -> Option<Remote<'_>> {
        self.store.map(|store| Remote {
            store,
            owner: &self.settings.owner,
            repo: &self.settings.repo,
            base_path: &self.settings.base_path,
        })
    }

    fn require_remote(&self, mode: Mode) -> Result<Remote<'_>, MonocovError> {
        self.remote().ok_or_else(|| {
            MonocovError::Configuration(format!("mode '{mode}' needs a snapshot store"))
        })
    }

    /// Upload every local snapshot to its temporary key. Returns the count.
    pub fn collect(&self, trigger: &TriggerContext) -> Result<usize> {
        let remote = self.require_remote(Mode::Collect)?;
        let prefix = remote.temporary_key(&trigger.base_branch, trigger.pr_number);

        let snapshots = discover(&self.settings.local_root)?;
        if snapshots.is_empty() {
            warn!(
                "No snapshots found under {}; nothing to upload",
                self.settings.local_root.display()
            );
            return Ok(0);
        }

        // Only well-formed snapshots may become temporary (and later base) copies.
        let mut uploads = Vec::with_capacity(snapshots.len());
        for snapshot in &snapshots {
            let source = snapshot.path.display().to_string();
            let bytes = std::fs::read(&snapshot.path)
                .map_err(|e| MonocovError::parse(&source, e.to_string()))?;
            lcov::parse(&source, &bytes)?;
            let key = remote.path(&prefix.with_package(&snapshot.package_name));
            uploads.push((key, bytes));
        }

        uploads
            .par_iter()
            .map(|(key, bytes)| -> Result<(), MonocovError> {
                remote.store.put(key, bytes)?;
                info!("Uploaded {key}");
                Ok(())
            })
            .collect::<Result<Vec<()>, MonocovError>>()?;

        Ok(uploads.len())
    }

    /// Diff current snapshots against their baselines, publish the report,
    /// then drop temporary snapshots that did not change.
    pub fn report(&self, trigger: &TriggerContext) -> Result<ReportOutcome> {
        let current = self.current_coverage(trigger)?;

        let baselines: Vec<PackageCoverage> = match self.remote() {
            Some(remote) => {
                let chain = FallbackChain::new(&trigger.base_branch, &self.settings.main_branch);
                retrieve_base(remote, &current, &chain)
                    .into_iter()
                    .map(|b| b.coverage)
                    .collect()
            }
            None => {
                warn!("No snapshot store configured; reporting without baselines");
                Vec::new()
            }
        };

        let diff = compute_diff(&current, &baselines, self.settings.threshold);
        let folder = self.settings.base_path.folder();
        let body = DiffReport {
            diff: &diff,
            folder,
            base_branch: &trigger.base_branch,
        }
        .format(self.settings.report_format.formatter());
        self.comments.upsert(&self.settings.comment_marker(), &body)?;

        let cleanup = self.cleanup(trigger, &diff);
        Ok(ReportOutcome {
            diff,
            body,
            cleanup,
        })
    }

    /// Local snapshots when present, otherwise the PR's temporary snapshots.
    fn current_coverage(&self, trigger: &TriggerContext) -> Result<Vec<PackageCoverage>> {
        let root = &self.settings.local_root;
        let local = if root.is_dir() {
            discover(root)?
        } else {
            Vec::new()
        };

        let current = if !local.is_empty() {
            read_local(&local)?
        } else if let Some(remote) = self.remote() {
            info!(
                "No local snapshots; reading temporary snapshots of PR #{}",
                trigger.pr_number
            );
            read_remote(
                remote,
                &remote.temporary_key(&trigger.base_branch, trigger.pr_number),
            )?
        } else {
            Vec::new()
        };

        if current.is_empty() {
            return Err(MonocovError::NoSnapshots(format!(
                "nothing under {} or in temporary storage for PR #{}",
                root.display(),
                trigger.pr_number
            ))
            .into());
        }
        Ok(current)
    }

    /// Delete temporary snapshots identical to their baseline. Failures are
    /// logged and counted, never fatal.
    pub fn cleanup(&self, trigger: &TriggerContext, diff: &CoverageDiff) -> CleanupSummary {
        let Some(remote) = self.remote() else {
            return CleanupSummary::default();
        };
        let prefix = remote.temporary_key(&trigger.base_branch, trigger.pr_number);

        let results: Vec<bool> = diff
            .rows
            .par_iter()
            .filter(|row| row.unchanged)
            .map(|row| {
                let key = remote.path(&prefix.with_package(&row.package_name));
                match remote.store.delete(&key) {
                    Ok(()) => {
                        info!("Removed unchanged snapshot {key}");
                        true
                    }
                    Err(e) => {
                        warn!("Failed to remove unchanged snapshot {key}: {e}");
                        false
                    }
                }
            })
            .collect();

        let deleted = results.iter().filter(|ok| **ok).count();
        CleanupSummary {
            deleted,
            failed: results.len() - deleted,
        }
    }

    /// Promote every temporary snapshot of the merged PR to the base key.
    pub fn merge(&self, trigger: &TriggerContext) -> Result<usize> {
        let remote = self.require_remote(Mode::Merge)?;
        let prefix = remote.temporary_key(&trigger.base_branch, trigger.pr_number);

        let listing = remote.store.list(&remote.path(&prefix))?;
        let moves: Vec<(String, String)> = listing
            .iter()
            .filter_map(|path| {
                let name = prefix.package_from_path(remote.base_path, path)?;
                let to = remote.path(&prefix.with_package(&name).as_base());
                Some((path.clone(), to))
            })
            .collect();

        moves
            .par_iter()
            .map(|(from, to)| -> Result<(), MonocovError> {
                remote.store.rename(from, to)?;
                info!("Promoted {from} -> {to}");
                Ok(())
            })
            .collect::<Result<Vec<()>, MonocovError>>()?;

        if moves.is_empty() {
            info!(
                "No temporary snapshots for PR #{}; base left untouched",
                trigger.pr_number
            );
        }
        Ok(moves.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger(merged: bool) -> TriggerContext {
        TriggerContext {
            pr_number: 3,
            merged,
            base_branch: "master".to_string(),
            head_branch: "feature".to_string(),
        }
    }

    #[test]
    fn test_inferred_modes() {
        assert_eq!(trigger(false).inferred_modes(), [Mode::Collect, Mode::Report]);
        assert_eq!(trigger(true).inferred_modes(), [Mode::Merge]);
    }

    fn reported(breach_count: usize) -> RunSummary {
        RunSummary {
            outcomes: vec![
                Outcome::Collected { uploaded: 2 },
                Outcome::Reported(ReportOutcome {
                    diff: CoverageDiff {
                        rows: Vec::new(),
                        breach_count,
                        threshold: 0.1,
                    },
                    body: String::new(),
                    cleanup: CleanupSummary::default(),
                }),
            ],
        }
    }

    #[test]
    fn test_enforce_threshold() {
        let lenient = Settings::new("./packages", "acme", "mono", "master", 0.1).unwrap();
        let strict = lenient.clone().fail_on_threshold(true);

        let err = reported(2).enforce_threshold(&strict).unwrap_err();
        assert!(matches!(
            err,
            MonocovError::ThresholdBreach { count: 2, threshold } if threshold == 0.1
        ));
        assert!(reported(2).enforce_threshold(&lenient).is_ok());
        assert!(reported(0).enforce_threshold(&strict).is_ok());
        assert!(RunSummary::default().enforce_threshold(&strict).is_ok());
    }

    #[test]
    fn test_collect_without_store_fails_eagerly() {
        let settings = Settings::new("./does-not-exist", "acme", "mono", "master", 0.1).unwrap();
        let lifecycle = Lifecycle::new(&settings, None, &crate::github::StdoutComments);
        let err = lifecycle.run(&trigger(false), None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MonocovError>(),
            Some(MonocovError::Configuration(_))
        ));
    }
}
