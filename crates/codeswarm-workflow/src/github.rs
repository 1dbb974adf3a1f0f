//! GitHub REST implementation of [`GitHost`].

use crate::host::{GitHost, PullRequest, PullRequestSpec};
use async_trait::async_trait;
use codeswarm_core::{SwarmError, SwarmResult};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// A [`GitHost`] backed by the GitHub REST API.
pub struct GitHubHost {
    http: reqwest::Client,
    base_url: String,
    owner: String,
    repo: String,
    token: String,
}

impl GitHubHost {
    /// Create a host for `owner/repo` authenticated with `token`.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
        }
    }

    /// Point the client at a different API root (for tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}/{path}", self.base_url, self.owner, self.repo)
    }

    fn with_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "codeswarm")
    }

    async fn check(resp: reqwest::Response, context: &str) -> SwarmResult<reqwest::Response> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(SwarmError::GitHost(format!(
                "{context} failed: {status}: {body}"
            )))
        }
    }

    async fn head_sha(&self, branch: &str) -> SwarmResult<String> {
        #[derive(Deserialize)]
        struct RefObject {
            sha: String,
        }
        #[derive(Deserialize)]
        struct GitRef {
            object: RefObject,
        }

        let url = self.repo_url(&format!("git/ref/heads/{branch}"));
        let resp = self
            .with_headers(self.http.get(&url))
            .send()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;
        let git_ref: GitRef = Self::check(resp, "resolve branch head")
            .await?
            .json()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;
        Ok(git_ref.object.sha)
    }
}

#[derive(Deserialize)]
struct ApiPullRequest {
    number: u64,
    title: String,
    state: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    html_url: String,
}

impl From<ApiPullRequest> for PullRequest {
    fn from(pr: ApiPullRequest) -> Self {
        Self {
            number: pr.number,
            title: pr.title,
            state: pr.state,
            draft: pr.draft,
            html_url: pr.html_url,
        }
    }
}

#[async_trait]
impl GitHost for GitHubHost {
    async fn create_repository(&self, name: &str) -> SwarmResult<String> {
        #[derive(Deserialize)]
        struct ApiRepo {
            html_url: String,
        }

        let url = format!("{}/user/repos", self.base_url);
        let resp = self
            .with_headers(self.http.post(&url))
            .json(&serde_json::json!({ "name": name, "private": true, "auto_init": true }))
            .send()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;
        let repo: ApiRepo = Self::check(resp, "create repository")
            .await?
            .json()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;
        debug!(url = %repo.html_url, "repository created");
        Ok(repo.html_url)
    }

    async fn create_branch(&self, branch: &str, from: &str) -> SwarmResult<()> {
        let sha = self.head_sha(from).await?;
        let url = self.repo_url("git/refs");
        let resp = self
            .with_headers(self.http.post(&url))
            .json(&serde_json::json!({
                "ref": format!("refs/heads/{branch}"),
                "sha": sha,
            }))
            .send()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;
        Self::check(resp, "create branch").await?;
        Ok(())
    }

    async fn create_pull_request(&self, spec: &PullRequestSpec) -> SwarmResult<PullRequest> {
        let url = self.repo_url("pulls");
        let resp = self
            .with_headers(self.http.post(&url))
            .json(&serde_json::json!({
                "title": spec.title,
                "body": spec.body,
                "head": spec.head,
                "base": spec.base,
                "draft": spec.draft,
            }))
            .send()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;
        let pr: ApiPullRequest = Self::check(resp, "create pull request")
            .await?
            .json()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;
        Ok(pr.into())
    }

    async fn add_comment(&self, pr_number: u64, body: &str) -> SwarmResult<()> {
        let url = self.repo_url(&format!("issues/{pr_number}/comments"));
        let resp = self
            .with_headers(self.http.post(&url))
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;
        Self::check(resp, "add comment").await?;
        Ok(())
    }

    async fn assign_reviewer(&self, pr_number: u64, reviewer: &str) -> SwarmResult<()> {
        let url = self.repo_url(&format!("pulls/{pr_number}/requested_reviewers"));
        let resp = self
            .with_headers(self.http.post(&url))
            .json(&serde_json::json!({ "reviewers": [reviewer] }))
            .send()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;
        Self::check(resp, "assign reviewer").await?;
        Ok(())
    }

    async fn get_pull_request(&self, pr_number: u64) -> SwarmResult<PullRequest> {
        let url = self.repo_url(&format!("pulls/{pr_number}"));
        let resp = self
            .with_headers(self.http.get(&url))
            .send()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;
        let pr: ApiPullRequest = Self::check(resp, "get pull request")
            .await?
            .json()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;
        Ok(pr.into())
    }

    async fn mark_ready_for_review(&self, pr_number: u64) -> SwarmResult<()> {
        let url = self.repo_url(&format!("pulls/{pr_number}"));
        let resp = self
            .with_headers(self.http.patch(&url))
            .json(&serde_json::json!({ "draft": false }))
            .send()
            .await
            .map_err(|e| SwarmError::Http(e.to_string()))?;
        Self::check(resp, "mark ready for review").await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn host(server: &MockServer) -> GitHubHost {
        GitHubHost::new("acme", "widgets", "tok_test").with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_create_pull_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/pulls"))
            .and(header("Authorization", "Bearer tok_test"))
            .and(body_partial_json(
                serde_json::json!({ "head": "feature/t1", "draft": true }),
            ))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "number": 42,
                "title": "Task t1",
                "state": "open",
                "draft": true,
                "html_url": "https://example.test/pr/42"
            })))
            .mount(&server)
            .await;

        let pr = host(&server)
            .create_pull_request(&PullRequestSpec {
                title: "Task t1".into(),
                body: "auto".into(),
                head: "feature/t1".into(),
                base: "main".into(),
                draft: true,
            })
            .await
            .unwrap();
        assert_eq!(pr.number, 42);
        assert!(pr.draft);
    }

    #[tokio::test]
    async fn test_create_branch_resolves_base_sha() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/widgets/git/ref/heads/main"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": { "sha": "abc123" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/git/refs"))
            .and(body_partial_json(serde_json::json!({
                "ref": "refs/heads/feature/t1",
                "sha": "abc123"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        host(&server).create_branch("feature/t1", "main").await.unwrap();
    }

    #[tokio::test]
    async fn test_add_comment_error_is_typed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/widgets/issues/7/comments"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = host(&server).add_comment(7, "hello").await.unwrap_err();
        assert!(matches!(err, SwarmError::GitHost(_)));
    }

    #[tokio::test]
    async fn test_mark_ready_for_review_patches_draft() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/repos/acme/widgets/pulls/42"))
            .and(body_partial_json(serde_json::json!({ "draft": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        host(&server).mark_ready_for_review(42).await.unwrap();
    }
}
