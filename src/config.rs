//! Resolved run configuration and its validation.

use std::path::{Path, PathBuf};

use clap::ValueEnum;

use crate::error::{MonocovError, Result};
use crate::key::BasePath;
use crate::report::{comment_marker, ReportFormat};
use crate::store::s3::Credentials;
use crate::store::{BlobStore, DirStore, S3Store};

/// Lifecycle operation to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Upload local snapshots as temporary PR snapshots.
    Collect,
    /// Diff against baselines, comment, clean up unchanged snapshots.
    Report,
    /// Promote a merged PR's temporary snapshots to the base.
    Merge,
}

impl Mode {
    pub fn requires_store(self) -> bool {
        match self {
            Mode::Collect | Mode::Merge => true,
            Mode::Report => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Collect => "collect",
            Mode::Report => "report",
            Mode::Merge => "merge",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which blob store to talk to.
#[derive(Debug, Clone)]
pub enum StoreConfig {
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
        credentials: Credentials,
    },
    Dir(PathBuf),
}

impl StoreConfig {
    pub fn open(&self) -> Result<Box<dyn BlobStore>> {
        Ok(match self {
            StoreConfig::S3 {
                bucket,
                region,
                endpoint,
                credentials,
            } => Box::new(S3Store::new(
                bucket,
                region,
                endpoint.as_deref(),
                credentials.clone(),
            )?),
            StoreConfig::Dir(root) => Box::new(DirStore::new(root)),
        })
    }
}

/// Both halves of a key pair, or neither.
pub fn credentials_from_parts(
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    session_token: Option<String>,
) -> Result<Credentials> {
    match (access_key_id, secret_access_key) {
        (Some(access_key_id), Some(secret_access_key))
            if !access_key_id.is_empty() && !secret_access_key.is_empty() =>
        {
            Ok(Credentials {
                access_key_id,
                secret_access_key,
                session_token: session_token.filter(|t| !t.is_empty()),
            })
        }
        (None, None) => Err(MonocovError::Configuration(
            "S3 storage needs AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY".to_string(),
        )),
        _ => Err(MonocovError::Configuration(
            "AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY must both be set and non-empty"
                .to_string(),
        )),
    }
}

/// Threshold in percentage points: finite and not negative.
pub fn validate_threshold(threshold: f64) -> Result<f64> {
    if threshold.is_finite() && threshold >= 0.0 {
        Ok(threshold)
    } else {
        Err(MonocovError::Configuration(format!(
            "threshold must be a non-negative number of percentage points, got {threshold}"
        )))
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Monorepo root on disk, as given.
    pub local_root: PathBuf,
    /// Normalised form used in storage keys.
    pub base_path: BasePath,
    pub owner: String,
    pub repo: String,
    pub main_branch: String,
    pub threshold: f64,
    pub fail_on_threshold: bool,
    pub report_format: ReportFormat,
    /// Overrides the base path in the comment marker.
    pub app_name: Option<String>,
    pub store: Option<StoreConfig>,
}

impl Settings {
    pub fn new(
        monorepo_base_path: &str,
        owner: &str,
        repo: &str,
        main_branch: &str,
        threshold: f64,
    ) -> Result<Self> {
        if monorepo_base_path.trim().is_empty() {
            return Err(MonocovError::Configuration(
                "a monorepo base path is required".to_string(),
            ));
        }
        if owner.is_empty() || repo.is_empty() {
            return Err(MonocovError::Configuration(
                "repository owner and name are required".to_string(),
            ));
        }
        if main_branch.is_empty() {
            return Err(MonocovError::Configuration(
                "main branch name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            local_root: Path::new(monorepo_base_path).to_path_buf(),
            base_path: BasePath::new(monorepo_base_path)?,
            owner: owner.to_string(),
            repo: repo.to_string(),
            main_branch: main_branch.to_string(),
            threshold: validate_threshold(threshold)?,
            fail_on_threshold: false,
            report_format: ReportFormat::default(),
            app_name: None,
            store: None,
        })
    }

    /// Look for snapshots under `dir` joined with the base path, for runs
    /// started outside the checkout root.
    pub fn in_directory(mut self, dir: &Path) -> Self {
        self.local_root = dir.join(&self.local_root);
        self
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = Some(store);
        self
    }

    pub fn fail_on_threshold(mut self, fail: bool) -> Self {
        self.fail_on_threshold = fail;
        self
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.report_format = format;
        self
    }

    pub fn with_app_name(mut self, app_name: Option<String>) -> Self {
        self.app_name = app_name.filter(|n| !n.trim().is_empty());
        self
    }

    /// Marker of the PR comment owned by this base path or app.
    pub fn comment_marker(&self) -> String {
        comment_marker(self.app_name.as_deref().unwrap_or(self.base_path.as_str()))
    }

    /// Refuse modes whose collaborators are not configured.
    pub fn validate_for(&self, mode: Mode) -> Result<()> {
        if mode.requires_store() && self.store.is_none() {
            return Err(MonocovError::Configuration(format!(
                "mode '{mode}' needs a snapshot store (--bucket/--region or --store-dir)"
            )));
        }
        Ok(())
    }
}
