//! GitHub helpers: reading the pull request trigger from the Actions event
//! payload and upserting the coverage comment.

use anyhow::{bail, Context as _, Result};
use serde::Deserialize;

use crate::lifecycle::TriggerContext;

const API_VERSION: &str = "2022-11-28";

/// Where rendered reports go.
pub trait CommentSink {
    /// Replace the previous comment carrying `marker`, or create one.
    fn upsert(&self, marker: &str, body: &str) -> Result<()>;
}

/// Prints the report instead of commenting; used for local runs.
pub struct StdoutComments;

impl CommentSink for StdoutComments {
    fn upsert(&self, _marker: &str, body: &str) -> Result<()> {
        println!("{body}");
        Ok(())
    }
}

#[derive(Deserialize)]
struct EventPayload {
    pull_request: Option<PullRequestPayload>,
}

#[derive(Deserialize)]
struct PullRequestPayload {
    number: u64,
    #[serde(default)]
    merged: Option<bool>,
    base: RefPayload,
    head: RefPayload,
}

#[derive(Deserialize)]
struct RefPayload {
    #[serde(rename = "ref")]
    name: String,
}

/// Build a trigger from a `pull_request` event payload.
pub fn trigger_from_event(json: &str) -> Result<TriggerContext> {
    let payload: EventPayload =
        serde_json::from_str(json).context("Failed to parse GitHub event payload")?;
    let Some(pr) = payload.pull_request else {
        bail!("GitHub event is not a pull_request event");
    };
    Ok(TriggerContext {
        pr_number: pr.number,
        merged: pr.merged.unwrap_or(false),
        base_branch: pr.base.name,
        head_branch: pr.head.name,
    })
}

/// Read the trigger from `GITHUB_EVENT_PATH`, if that variable is set.
pub fn trigger_from_env() -> Result<Option<TriggerContext>> {
    let Ok(path) = std::env::var("GITHUB_EVENT_PATH") else {
        return Ok(None);
    };
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read GitHub event payload at {path}"))?;
    trigger_from_event(&json).map(Some)
}

/// Split `owner/repo`.
pub fn split_repository(full_name: &str) -> Result<(String, String)> {
    match full_name.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => bail!("repository must look like 'owner/repo', got '{full_name}'"),
    }
}

/// Comments on a pull request through the REST API.
pub struct GitHubComments {
    token: String,
    repo: String,
    pr_number: u64,
}

#[derive(Deserialize)]
struct Comment {
    id: u64,
    body: Option<String>,
}

impl GitHubComments {
    pub fn new(token: &str, owner: &str, repo: &str, pr_number: u64) -> Self {
        Self {
            token: token.to_string(),
            repo: format!("{owner}/{repo}"),
            pr_number,
        }
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        ureq::request(method, url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Accept", "application/vnd.github+json")
            .set("User-Agent", "monocov")
            .set("X-GitHub-Api-Version", API_VERSION)
    }

    /// Our comments on the PR, oldest first.
    fn find_comments(&self, marker: &str) -> Result<Vec<u64>> {
        let mut found = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "https://api.github.com/repos/{}/issues/{}/comments?per_page=100&page={}",
                self.repo, self.pr_number, page
            );
            let resp = self
                .request("GET", &url)
                .call()
                .context("Failed to list PR comments")?;
            let comments: Vec<Comment> =
                resp.into_json().context("Failed to parse comments JSON")?;
            if comments.is_empty() {
                break;
            }
            found.extend(
                comments
                    .iter()
                    .filter(|c| c.body.as_deref().is_some_and(|b| b.starts_with(marker)))
                    .map(|c| c.id),
            );
            page += 1;
        }
        Ok(found)
    }

    fn send_body(&self, method: &str, url: &str, body: &str, action: &str) -> Result<()> {
        match self
            .request(method, url)
            .send_json(serde_json::json!({ "body": body }))
        {
            Ok(_) => Ok(()),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                bail!("GitHub API error {action} comment (HTTP {code}): {body}");
            }
            Err(e) => bail!("Failed {action} comment: {e}"),
        }
    }
}

impl CommentSink for GitHubComments {
    fn upsert(&self, marker: &str, body: &str) -> Result<()> {
        let body_with_marker = format!("{marker}\n{body}");
        let mut existing = self.find_comments(marker)?;
        let last = existing.pop();

        for id in existing {
            let url = format!(
                "https://api.github.com/repos/{}/issues/comments/{}",
                self.repo, id
            );
            if let Err(e) = self.request("DELETE", &url).call() {
                log::warn!("Failed to delete stale comment {id}: {e}");
            }
        }

        match last {
            Some(id) => {
                let url = format!(
                    "https://api.github.com/repos/{}/issues/comments/{}",
                    self.repo, id
                );
                self.send_body("PATCH", &url, &body_with_marker, "updating")?;
            }
            None => {
                let url = format!(
                    "https://api.github.com/repos/{}/issues/{}/comments",
                    self.repo, self.pr_number
                );
                self.send_body("POST", &url, &body_with_marker, "creating")?;
            }
        }

        log::info!("Comment posted to {}/pull/{}", self.repo, self.pr_number);
        Ok(())
    }
}
