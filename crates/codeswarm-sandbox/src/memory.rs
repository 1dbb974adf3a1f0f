//! In-memory compute provider: a test double and dry-run backend that
//! records sandbox lifecycles and written files without any isolation.

use crate::provider::{ComputeProvider, ExecOutcome, SandboxSpec};
use async_trait::async_trait;
use codeswarm_core::{SwarmError, SwarmResult};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct SandboxRecord {
    spec: SandboxSpec,
    files: HashMap<String, String>,
    alive: bool,
}

/// HashMap-backed [`ComputeProvider`].
///
/// Killed sandboxes stay in the map (marked dead) so tests can assert on
/// their history.
#[derive(Default)]
pub struct InMemorySandbox {
    sandboxes: RwLock<HashMap<String, SandboxRecord>>,
    failing_templates: RwLock<HashSet<String>>,
}

impl InMemorySandbox {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_sandbox` fail for the given template (to exercise
    /// fail-fast startup validation and spawn-failure paths).
    pub async fn fail_template(&self, template: impl Into<String>) {
        self.failing_templates.write().await.insert(template.into());
    }

    /// Total sandboxes ever created.
    pub async fn created_count(&self) -> usize {
        self.sandboxes.read().await.len()
    }

    /// Sandboxes still alive.
    pub async fn live_count(&self) -> usize {
        self.sandboxes
            .read()
            .await
            .values()
            .filter(|r| r.alive)
            .count()
    }

    /// Whether the given sandbox is alive.
    pub async fn is_alive(&self, sandbox_id: &str) -> bool {
        self.sandboxes
            .read()
            .await
            .get(sandbox_id)
            .map(|r| r.alive)
            .unwrap_or(false)
    }

    /// Files written into a sandbox, by path.
    pub async fn written_files(&self, sandbox_id: &str) -> HashMap<String, String> {
        self.sandboxes
            .read()
            .await
            .get(sandbox_id)
            .map(|r| r.files.clone())
            .unwrap_or_default()
    }

    /// The spec a sandbox was created from.
    pub async fn spec_of(&self, sandbox_id: &str) -> Option<SandboxSpec> {
        self.sandboxes
            .read()
            .await
            .get(sandbox_id)
            .map(|r| r.spec.clone())
    }
}

#[async_trait]
impl ComputeProvider for InMemorySandbox {
    async fn create_sandbox(&self, spec: &SandboxSpec) -> SwarmResult<String> {
        if self.failing_templates.read().await.contains(&spec.template) {
            return Err(SwarmError::Sandbox(format!(
                "template {} unavailable",
                spec.template
            )));
        }
        let id = format!("sbx-{}", Uuid::new_v4());
        self.sandboxes.write().await.insert(
            id.clone(),
            SandboxRecord {
                spec: spec.clone(),
                files: HashMap::new(),
                alive: true,
            },
        );
        Ok(id)
    }

    async fn kill_sandbox(&self, sandbox_id: &str) -> SwarmResult<()> {
        let mut sandboxes = self.sandboxes.write().await;
        let record = sandboxes
            .get_mut(sandbox_id)
            .ok_or_else(|| SwarmError::NotFound(format!("sandbox {sandbox_id}")))?;
        record.alive = false;
        Ok(())
    }

    async fn write_file(&self, sandbox_id: &str, path: &str, content: &str) -> SwarmResult<()> {
        let mut sandboxes = self.sandboxes.write().await;
        let record = sandboxes
            .get_mut(sandbox_id)
            .ok_or_else(|| SwarmError::NotFound(format!("sandbox {sandbox_id}")))?;
        if !record.alive {
            return Err(SwarmError::Sandbox(format!(
                "sandbox {sandbox_id} is not running"
            )));
        }
        record.files.insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn execute_code(
        &self,
        sandbox_id: &str,
        _code: &str,
        _language: &str,
    ) -> SwarmResult<ExecOutcome> {
        let sandboxes = self.sandboxes.read().await;
        let record = sandboxes
            .get(sandbox_id)
            .ok_or_else(|| SwarmError::NotFound(format!("sandbox {sandbox_id}")))?;
        if !record.alive {
            return Err(SwarmError::Sandbox(format!(
                "sandbox {sandbox_id} is not running"
            )));
        }
        Ok(ExecOutcome {
            exit_code: 0,
            output: String::new(),
            error: None,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_kill() {
        let provider = InMemorySandbox::new();
        let id = provider
            .create_sandbox(&SandboxSpec::new("ubuntu:22.04"))
            .await
            .unwrap();
        assert!(provider.is_alive(&id).await);
        assert_eq!(provider.live_count().await, 1);

        provider.kill_sandbox(&id).await.unwrap();
        assert!(!provider.is_alive(&id).await);
        assert_eq!(provider.created_count().await, 1);
    }

    #[tokio::test]
    async fn test_kill_unknown_is_not_found() {
        let provider = InMemorySandbox::new();
        let err = provider.kill_sandbox("sbx-ghost").await.unwrap_err();
        assert!(matches!(err, SwarmError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_write_file_recorded() {
        let provider = InMemorySandbox::new();
        let id = provider
            .create_sandbox(&SandboxSpec::new("node:20"))
            .await
            .unwrap();
        provider
            .write_file(&id, "/workspace/agent.json", "{}")
            .await
            .unwrap();
        let files = provider.written_files(&id).await;
        assert_eq!(files.get("/workspace/agent.json").map(String::as_str), Some("{}"));
    }

    #[tokio::test]
    async fn test_write_to_dead_sandbox_fails() {
        let provider = InMemorySandbox::new();
        let id = provider
            .create_sandbox(&SandboxSpec::new("node:20"))
            .await
            .unwrap();
        provider.kill_sandbox(&id).await.unwrap();
        assert!(provider.write_file(&id, "/x", "y").await.is_err());
    }

    #[tokio::test]
    async fn test_failing_template() {
        let provider = InMemorySandbox::new();
        provider.fail_template("broken:latest").await;
        let err = provider
            .create_sandbox(&SandboxSpec::new("broken:latest"))
            .await
            .unwrap_err();
        assert!(matches!(err, SwarmError::Sandbox(_)));
        assert!(provider
            .create_sandbox(&SandboxSpec::new("ok:latest"))
            .await
            .is_ok());
    }
}
