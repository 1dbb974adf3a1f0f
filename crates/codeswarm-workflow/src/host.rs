//! The Git-host seam: the remote operations the workflow manager consumes.

use async_trait::async_trait;
use codeswarm_core::SwarmResult;
use serde::{Deserialize, Serialize};

/// Parameters for opening a pull request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequestSpec {
    /// PR title.
    pub title: String,
    /// PR body.
    pub body: String,
    /// Source branch.
    pub head: String,
    /// Target branch.
    pub base: String,
    /// Open as a draft.
    pub draft: bool,
}

/// A pull request as reported by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number.
    pub number: u64,
    /// PR title.
    pub title: String,
    /// Host-reported state ("open", "closed", ...).
    pub state: String,
    /// Whether the PR is still a draft.
    pub draft: bool,
    /// Browser URL.
    #[serde(default)]
    pub html_url: String,
}

/// An opaque source-control hosting backend.
///
/// The workflow manager never performs a server-side merge through this
/// trait; merging is a human-gated action on the host.
#[async_trait]
pub trait GitHost: Send + Sync {
    /// Provision a repository, returning its URL.
    async fn create_repository(&self, name: &str) -> SwarmResult<String>;

    /// Create `branch` pointing at the head of `from`.
    async fn create_branch(&self, branch: &str, from: &str) -> SwarmResult<()>;

    /// Open a pull request.
    async fn create_pull_request(&self, spec: &PullRequestSpec) -> SwarmResult<PullRequest>;

    /// Comment on a pull request.
    async fn add_comment(&self, pr_number: u64, body: &str) -> SwarmResult<()>;

    /// Request a review from the given user.
    async fn assign_reviewer(&self, pr_number: u64, reviewer: &str) -> SwarmResult<()>;

    /// Fetch a pull request.
    async fn get_pull_request(&self, pr_number: u64) -> SwarmResult<PullRequest>;

    /// Take a draft pull request out of draft.
    async fn mark_ready_for_review(&self, pr_number: u64) -> SwarmResult<()>;
}
