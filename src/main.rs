use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;

use monocov::config::{credentials_from_parts, Mode, Settings, StoreConfig};
use monocov::diff::DEFAULT_THRESHOLD;
use monocov::github::{self, CommentSink, GitHubComments, StdoutComments};
use monocov::lifecycle::{Lifecycle, Outcome, TriggerContext};
use monocov::report::ReportFormat;
use monocov::store::BlobStore;

/// Per-package coverage deltas for monorepo pull requests.
#[derive(Parser)]
#[command(name = "monocov", version, about)]
struct Cli {
    /// Operation to run. If omitted: merge for merged PRs, otherwise collect then report.
    #[arg(long, value_enum, env = "MONOCOV_MODE")]
    mode: Option<Mode>,

    /// Monorepo folder holding one directory per package, e.g. ./packages.
    #[arg(long, env = "MONOCOV_MONOREPO_BASE_PATH")]
    monorepo_base_path: String,

    /// Allowed coverage drop per package, in percentage points.
    #[arg(long, env = "MONOCOV_THRESHOLD", default_value_t = DEFAULT_THRESHOLD)]
    threshold: f64,

    /// Exit non-zero when a package drops by more than the threshold.
    #[arg(long, env = "MONOCOV_FAIL_ON_THRESHOLD")]
    fail_on_threshold: bool,

    /// Report format. Markdown for PR comments, text for terminals.
    #[arg(long, value_enum, env = "MONOCOV_FORMAT", default_value_t = ReportFormat::Markdown)]
    format: ReportFormat,

    /// Name used in the hidden comment marker instead of the base path.
    /// Lets several runs over the same folder keep separate comments.
    #[arg(long, env = "MONOCOV_APP_NAME")]
    app_name: Option<String>,

    /// Branch whose base is the last-resort baseline.
    #[arg(long, env = "MONOCOV_MAIN_BRANCH", default_value = "master")]
    main_branch: String,

    /// Checkout directory the base path is relative to.
    #[arg(long, env = "GITHUB_WORKSPACE")]
    working_directory: Option<PathBuf>,

    /// Repository as owner/repo.
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repository: String,

    /// Token for posting the PR comment. Without it the report is printed.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Pull request number. If omitted, read from the GitHub event payload.
    #[arg(long, requires = "base_branch")]
    pr_number: Option<u64>,

    /// Treat the pull request as merged.
    #[arg(long, requires = "pr_number")]
    merged: bool,

    /// Branch the pull request targets.
    #[arg(long)]
    base_branch: Option<String>,

    /// Branch the pull request comes from.
    #[arg(long)]
    head_branch: Option<String>,

    /// Store snapshots in a local directory instead of S3.
    #[arg(long, env = "MONOCOV_STORE_DIR", conflicts_with = "bucket")]
    store_dir: Option<PathBuf>,

    /// S3 bucket for snapshots.
    #[arg(long, env = "MONOCOV_BUCKET", requires = "region")]
    bucket: Option<String>,

    /// S3 region.
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// S3-compatible endpoint URL (defaults to AWS).
    #[arg(long, env = "MONOCOV_S3_ENDPOINT")]
    endpoint: Option<String>,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide = true, hide_env_values = true)]
    access_key_id: Option<String>,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide = true, hide_env_values = true)]
    secret_access_key: Option<String>,

    #[arg(long, env = "AWS_SESSION_TOKEN", hide = true, hide_env_values = true)]
    session_token: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let settings = build_settings(&cli)?;
    let trigger = resolve_trigger(&cli)?;

    let store: Option<Box<dyn BlobStore>> = match settings.store {
        Some(ref config) => Some(config.open().context("Failed to open snapshot store")?),
        None => None,
    };

    let comments: Box<dyn CommentSink> = match cli.github_token.as_deref() {
        Some(token) if !token.is_empty() => Box::new(GitHubComments::new(
            token,
            &settings.owner,
            &settings.repo,
            trigger.pr_number,
        )),
        _ => Box::new(StdoutComments),
    };

    let lifecycle = Lifecycle::new(&settings, store.as_deref(), comments.as_ref());
    let summary = lifecycle.run(&trigger, cli.mode)?;

    for outcome in &summary.outcomes {
        match outcome {
            Outcome::Collected { uploaded } => info!("Uploaded {uploaded} snapshot(s)"),
            Outcome::Reported(report) => info!(
                "Reported {} package(s); removed {} unchanged snapshot(s), {} removal(s) failed",
                report.diff.rows.len(),
                report.cleanup.deleted,
                report.cleanup.failed
            ),
            Outcome::Merged { moved } => info!("Promoted {moved} snapshot(s) to base"),
        }
    }

    summary.enforce_threshold(&settings)?;

    Ok(())
}

fn build_settings(cli: &Cli) -> Result<Settings> {
    let (owner, repo) = github::split_repository(&cli.repository)?;
    let mut settings = Settings::new(
        &cli.monorepo_base_path,
        &owner,
        &repo,
        &cli.main_branch,
        cli.threshold,
    )?
    .fail_on_threshold(cli.fail_on_threshold)
    .with_format(cli.format)
    .with_app_name(cli.app_name.clone());

    if let Some(ref dir) = cli.working_directory {
        settings = settings.in_directory(dir);
    }

    if let Some(ref dir) = cli.store_dir {
        settings = settings.with_store(StoreConfig::Dir(dir.clone()));
    } else if let Some(ref bucket) = cli.bucket {
        let credentials = credentials_from_parts(
            cli.access_key_id.clone(),
            cli.secret_access_key.clone(),
            cli.session_token.clone(),
        )?;
        settings = settings.with_store(StoreConfig::S3 {
            bucket: bucket.clone(),
            region: cli.region.clone().unwrap_or_default(),
            endpoint: cli.endpoint.clone(),
            credentials,
        });
    }

    Ok(settings)
}

fn resolve_trigger(cli: &Cli) -> Result<TriggerContext> {
    if let Some(pr_number) = cli.pr_number {
        let base_branch = cli.base_branch.clone().unwrap_or_default();
        return Ok(TriggerContext {
            pr_number,
            merged: cli.merged,
            head_branch: cli.head_branch.clone().unwrap_or_default(),
            base_branch,
        });
    }

    match github::trigger_from_env()? {
        Some(trigger) => Ok(trigger),
        None => bail!("pass --pr-number and --base-branch, or run from a pull_request event"),
    }
}
