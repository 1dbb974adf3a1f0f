//! An in-process [`GitHost`] that records calls instead of talking to a
//! real forge. Used by integration tests and local demos.

use crate::host::{GitHost, PullRequest, PullRequestSpec};
use async_trait::async_trait;
use codeswarm_core::SwarmResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct RecordedState {
    repositories: Vec<String>,
    branches: Vec<(String, String)>,
    pull_requests: HashMap<u64, PullRequest>,
    comments: HashMap<u64, Vec<String>>,
    reviewers: HashMap<u64, Vec<String>>,
}

/// Records every host operation and hands out sequential PR numbers.
#[derive(Default)]
pub struct RecordingGitHost {
    next_pr: AtomicU64,
    state: RwLock<RecordedState>,
}

impl RecordingGitHost {
    pub fn new() -> Self {
        Self {
            next_pr: AtomicU64::new(1),
            state: RwLock::default(),
        }
    }

    /// Branches created so far, as `(branch, from)` pairs.
    pub async fn branches(&self) -> Vec<(String, String)> {
        self.state.read().await.branches.clone()
    }

    /// Comments left on the given PR, oldest first.
    pub async fn comments(&self, pr_number: u64) -> Vec<String> {
        self.state
            .read()
            .await
            .comments
            .get(&pr_number)
            .cloned()
            .unwrap_or_default()
    }

    /// Reviewers requested on the given PR.
    pub async fn reviewers(&self, pr_number: u64) -> Vec<String> {
        self.state
            .read()
            .await
            .reviewers
            .get(&pr_number)
            .cloned()
            .unwrap_or_default()
    }

    /// Repositories provisioned so far.
    pub async fn repositories(&self) -> Vec<String> {
        self.state.read().await.repositories.clone()
    }
}

#[async_trait]
impl GitHost for RecordingGitHost {
    async fn create_repository(&self, name: &str) -> SwarmResult<String> {
        let mut state = self.state.write().await;
        state.repositories.push(name.to_string());
        Ok(format!("https://git.local/{name}"))
    }

    async fn create_branch(&self, branch: &str, from: &str) -> SwarmResult<()> {
        let mut state = self.state.write().await;
        state.branches.push((branch.to_string(), from.to_string()));
        Ok(())
    }

    async fn create_pull_request(&self, spec: &PullRequestSpec) -> SwarmResult<PullRequest> {
        let number = self.next_pr.fetch_add(1, Ordering::SeqCst);
        let pr = PullRequest {
            number,
            title: spec.title.clone(),
            state: "open".to_string(),
            draft: spec.draft,
            html_url: format!("https://git.local/pulls/{number}"),
        };
        let mut state = self.state.write().await;
        state.pull_requests.insert(number, pr.clone());
        Ok(pr)
    }

    async fn add_comment(&self, pr_number: u64, body: &str) -> SwarmResult<()> {
        let mut state = self.state.write().await;
        state
            .comments
            .entry(pr_number)
            .or_default()
            .push(body.to_string());
        Ok(())
    }

    async fn assign_reviewer(&self, pr_number: u64, reviewer: &str) -> SwarmResult<()> {
        let mut state = self.state.write().await;
        state
            .reviewers
            .entry(pr_number)
            .or_default()
            .push(reviewer.to_string());
        Ok(())
    }

    async fn get_pull_request(&self, pr_number: u64) -> SwarmResult<PullRequest> {
        let state = self.state.read().await;
        state
            .pull_requests
            .get(&pr_number)
            .cloned()
            .ok_or_else(|| codeswarm_core::SwarmError::NotFound(format!("pull request {pr_number}")))
    }

    async fn mark_ready_for_review(&self, pr_number: u64) -> SwarmResult<()> {
        let mut state = self.state.write().await;
        match state.pull_requests.get_mut(&pr_number) {
            Some(pr) => {
                pr.draft = false;
                Ok(())
            }
            None => Err(codeswarm_core::SwarmError::NotFound(format!(
                "pull request {pr_number}"
            ))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequential_pr_numbers() {
        let host = RecordingGitHost::new();
        let spec = PullRequestSpec {
            title: "t".into(),
            body: String::new(),
            head: "feature/x".into(),
            base: "main".into(),
            draft: true,
        };
        let first = host.create_pull_request(&spec).await.unwrap();
        let second = host.create_pull_request(&spec).await.unwrap();
        assert_eq!(first.number, 1);
        assert_eq!(second.number, 2);
    }

    #[tokio::test]
    async fn test_mark_ready_clears_draft() {
        let host = RecordingGitHost::new();
        let pr = host
            .create_pull_request(&PullRequestSpec {
                title: "t".into(),
                body: String::new(),
                head: "feature/x".into(),
                base: "main".into(),
                draft: true,
            })
            .await
            .unwrap();
        host.mark_ready_for_review(pr.number).await.unwrap();
        assert!(!host.get_pull_request(pr.number).await.unwrap().draft);
    }
}
