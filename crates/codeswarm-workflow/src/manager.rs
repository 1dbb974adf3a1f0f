//! Workflow lifecycle management.

use crate::host::{GitHost, PullRequestSpec};
use crate::types::{
    AgentWorkStatus, AgentWorkflowInfo, CommitInfo, WorkflowHandle, WorkflowStatus,
};
use chrono::Utc;
use codeswarm_core::{AgentRole, SwarmError, SwarmResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Coordinates one branch-plus-draft-PR workflow per task.
///
/// Runs in a degraded mode when constructed without a host: workflows are
/// tracked locally, branch and PR calls are skipped, and `pr_number` stays 0.
pub struct WorkflowManager {
    host: Option<Arc<dyn GitHost>>,
    workflows: RwLock<HashMap<String, WorkflowHandle>>,
    base_branch: String,
}

impl WorkflowManager {
    /// Manage workflows against the given host, branching off `main`.
    pub fn new(host: Option<Arc<dyn GitHost>>) -> Self {
        Self {
            host,
            workflows: RwLock::new(HashMap::new()),
            base_branch: "main".to_string(),
        }
    }

    /// Override the branch new feature branches fork from.
    pub fn with_base_branch(mut self, base: impl Into<String>) -> Self {
        self.base_branch = base.into();
        self
    }

    /// Whether a remote host is wired in.
    pub fn has_host(&self) -> bool {
        self.host.is_some()
    }

    /// Start the collaboration workflow for a task: a shared feature
    /// branch, one sub-branch per agent, and a draft pull request.
    ///
    /// Fails with [`SwarmError::Workflow`] if the task already has one.
    pub async fn create_agent_workflow(
        &self,
        task_id: &str,
        task_name: &str,
        assignments: &[(String, AgentRole)],
    ) -> SwarmResult<WorkflowHandle> {
        {
            let workflows = self.workflows.read().await;
            if workflows.contains_key(task_id) {
                return Err(SwarmError::Workflow(format!(
                    "task {task_id} already has a workflow"
                )));
            }
        }

        let branch_name = format!("feature/{task_id}");
        let mut agents = HashMap::new();
        for (agent_id, role) in assignments {
            agents.insert(
                agent_id.clone(),
                AgentWorkflowInfo {
                    agent_id: agent_id.clone(),
                    role: *role,
                    branch: format!("{branch_name}/{agent_id}"),
                    commits: Vec::new(),
                    status: AgentWorkStatus::Assigned,
                },
            );
        }

        let pr_number = match &self.host {
            Some(host) => {
                host.create_branch(&branch_name, &self.base_branch).await?;
                for info in agents.values() {
                    host.create_branch(&info.branch, &branch_name).await?;
                }
                let pr = host
                    .create_pull_request(&PullRequestSpec {
                        title: format!("[{task_id}] {task_name}"),
                        body: format!(
                            "Automated collaboration workflow for task `{task_id}` \
                             with {} agent(s).",
                            agents.len()
                        ),
                        head: branch_name.clone(),
                        base: self.base_branch.clone(),
                        draft: true,
                    })
                    .await?;
                pr.number
            }
            None => {
                warn!(task_id, "no git host configured, tracking workflow locally");
                0
            }
        };

        let now = Utc::now();
        let handle = WorkflowHandle {
            pr_number,
            branch_name,
            task_id: task_id.to_string(),
            status: WorkflowStatus::Draft,
            agents,
            created_at: now,
            last_updated: now,
        };

        let mut workflows = self.workflows.write().await;
        workflows.insert(task_id.to_string(), handle.clone());
        info!(task_id, pr_number, "workflow created");
        Ok(handle)
    }

    /// Record a commit an agent made on its sub-branch.
    ///
    /// The first commit moves the workflow from `draft` to `open`. Each
    /// commit leaves a progress comment on the PR.
    pub async fn handle_agent_commit(
        &self,
        task_id: &str,
        agent_id: &str,
        commit: CommitInfo,
    ) -> SwarmResult<()> {
        let (pr_number, progress) = {
            let mut workflows = self.workflows.write().await;
            let handle = workflows
                .get_mut(task_id)
                .ok_or_else(|| SwarmError::NotFound(format!("workflow for task {task_id}")))?;
            let info = handle
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| SwarmError::NotFound(format!("agent {agent_id} in workflow")))?;
            info.commits.push(commit);
            if info.status == AgentWorkStatus::Assigned {
                info.status = AgentWorkStatus::Working;
            }
            if handle.status == WorkflowStatus::Draft {
                handle.status = WorkflowStatus::Open;
            }
            handle.last_updated = Utc::now();
            (handle.pr_number, handle.progress())
        };

        if let Some(host) = &self.host {
            let (done, total) = progress;
            host.add_comment(
                pr_number,
                &format!("`{agent_id}` pushed a commit. {done}/{total} agents submitted."),
            )
            .await?;
        }
        Ok(())
    }

    /// Mark an agent's work as handed over. Once every agent has, the
    /// workflow enters `review` and the PR leaves draft.
    ///
    /// Agents may submit without ever committing; a workflow still in
    /// `draft` passes through `open` on its way to `review`.
    pub async fn submit_agent_work(&self, task_id: &str, agent_id: &str) -> SwarmResult<()> {
        let (pr_number, entered_review) = {
            let mut workflows = self.workflows.write().await;
            let handle = workflows
                .get_mut(task_id)
                .ok_or_else(|| SwarmError::NotFound(format!("workflow for task {task_id}")))?;
            let info = handle
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| SwarmError::NotFound(format!("agent {agent_id} in workflow")))?;
            info.status = AgentWorkStatus::Submitted;
            handle.last_updated = Utc::now();
            let mut entered_review = false;
            if handle.all_handed_over() {
                if handle.status == WorkflowStatus::Draft {
                    handle.status = WorkflowStatus::Open;
                }
                if handle.status.can_transition(WorkflowStatus::Review) {
                    handle.status = WorkflowStatus::Review;
                    entered_review = true;
                }
            }
            (handle.pr_number, entered_review)
        };

        if entered_review {
            info!(task_id, "all agents submitted, workflow entering review");
            if let Some(host) = &self.host {
                host.mark_ready_for_review(pr_number).await?;
            }
        }
        Ok(())
    }

    /// Request a review from `reviewer` and mark the agent as reviewing.
    pub async fn request_review(
        &self,
        task_id: &str,
        agent_id: &str,
        reviewer: &str,
    ) -> SwarmResult<()> {
        let pr_number = {
            let mut workflows = self.workflows.write().await;
            let handle = workflows
                .get_mut(task_id)
                .ok_or_else(|| SwarmError::NotFound(format!("workflow for task {task_id}")))?;
            let info = handle
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| SwarmError::NotFound(format!("agent {agent_id} in workflow")))?;
            info.status = AgentWorkStatus::Reviewing;
            handle.last_updated = Utc::now();
            handle.pr_number
        };

        if let Some(host) = &self.host {
            host.assign_reviewer(pr_number, reviewer).await?;
        }
        Ok(())
    }

    /// Approve a workflow under review.
    pub async fn approve_workflow(&self, task_id: &str) -> SwarmResult<()> {
        let mut workflows = self.workflows.write().await;
        let handle = workflows
            .get_mut(task_id)
            .ok_or_else(|| SwarmError::NotFound(format!("workflow for task {task_id}")))?;
        if !handle.status.can_transition(WorkflowStatus::Approved) {
            return Err(SwarmError::Workflow(format!(
                "cannot approve workflow in state {:?}",
                handle.status
            )));
        }
        handle.status = WorkflowStatus::Approved;
        handle.last_updated = Utc::now();
        Ok(())
    }

    /// Record that the PR was merged on the host.
    ///
    /// The merge itself happens on the host through a human decision; this
    /// only advances the local state machine and leaves a confirmation
    /// comment. Requires a configured host.
    pub async fn merge_workflow(&self, task_id: &str) -> SwarmResult<()> {
        let host = self
            .host
            .as_ref()
            .ok_or_else(|| SwarmError::Unavailable("git host".to_string()))?;

        let pr_number = {
            let mut workflows = self.workflows.write().await;
            let handle = workflows
                .get_mut(task_id)
                .ok_or_else(|| SwarmError::NotFound(format!("workflow for task {task_id}")))?;
            if !handle.status.can_transition(WorkflowStatus::Merged) {
                return Err(SwarmError::Workflow(format!(
                    "cannot merge workflow in state {:?}",
                    handle.status
                )));
            }
            handle.status = WorkflowStatus::Merged;
            handle.last_updated = Utc::now();
            handle.pr_number
        };

        host.add_comment(pr_number, "Workflow merged. Task complete.")
            .await?;
        info!(task_id, pr_number, "workflow merged");
        Ok(())
    }

    /// Close a workflow without merging.
    pub async fn close_workflow(&self, task_id: &str) -> SwarmResult<()> {
        let mut workflows = self.workflows.write().await;
        let handle = workflows
            .get_mut(task_id)
            .ok_or_else(|| SwarmError::NotFound(format!("workflow for task {task_id}")))?;
        if !handle.status.can_transition(WorkflowStatus::Closed) {
            return Err(SwarmError::Workflow(format!(
                "cannot close workflow in state {:?}",
                handle.status
            )));
        }
        handle.status = WorkflowStatus::Closed;
        handle.last_updated = Utc::now();
        Ok(())
    }

    /// Snapshot of a task's workflow.
    pub async fn workflow(&self, task_id: &str) -> Option<WorkflowHandle> {
        self.workflows.read().await.get(task_id).cloned()
    }

    /// Task ids with an active (non-terminal) workflow.
    pub async fn active_tasks(&self) -> Vec<String> {
        let workflows = self.workflows.read().await;
        let mut ids: Vec<String> = workflows
            .iter()
            .filter(|(_, handle)| !handle.status.is_terminal())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::memory::RecordingGitHost;

    fn assignments() -> Vec<(String, AgentRole)> {
        vec![
            ("agent-be".to_string(), AgentRole::Backend),
            ("agent-fe".to_string(), AgentRole::Frontend),
        ]
    }

    async fn manager_with_host() -> (WorkflowManager, Arc<RecordingGitHost>) {
        let host = Arc::new(RecordingGitHost::new());
        (WorkflowManager::new(Some(host.clone())), host)
    }

    #[tokio::test]
    async fn test_create_workflow_branches_and_draft_pr() {
        let (manager, host) = manager_with_host().await;
        let handle = manager
            .create_agent_workflow("t1", "API Development", &assignments())
            .await
            .unwrap();

        assert_eq!(handle.status, WorkflowStatus::Draft);
        assert_eq!(handle.branch_name, "feature/t1");
        assert!(handle.pr_number > 0);

        let branches = host.branches().await;
        assert!(branches.contains(&("feature/t1".to_string(), "main".to_string())));
        assert!(branches.contains(&(
            "feature/t1/agent-be".to_string(),
            "feature/t1".to_string()
        )));
        assert!(host.get_pull_request(handle.pr_number).await.unwrap().draft);
    }

    #[tokio::test]
    async fn test_duplicate_workflow_rejected() {
        let (manager, _host) = manager_with_host().await;
        manager
            .create_agent_workflow("t1", "API", &assignments())
            .await
            .unwrap();
        let err = manager
            .create_agent_workflow("t1", "API", &assignments())
            .await
            .unwrap_err();
        assert!(matches!(err, SwarmError::Workflow(_)));
    }

    #[tokio::test]
    async fn test_first_commit_opens_workflow_and_comments() {
        let (manager, host) = manager_with_host().await;
        let handle = manager
            .create_agent_workflow("t1", "API", &assignments())
            .await
            .unwrap();

        manager
            .handle_agent_commit("t1", "agent-be", CommitInfo::new("abc", "wip", vec![]))
            .await
            .unwrap();

        let handle_now = manager.workflow("t1").await.unwrap();
        assert_eq!(handle_now.status, WorkflowStatus::Open);
        assert_eq!(
            handle_now.agents["agent-be"].status,
            AgentWorkStatus::Working
        );
        let comments = host.comments(handle.pr_number).await;
        assert_eq!(comments.len(), 1);
        assert!(comments[0].contains("0/2 agents submitted"));
    }

    #[tokio::test]
    async fn test_all_submitted_enters_review_and_undrafts() {
        let (manager, host) = manager_with_host().await;
        let handle = manager
            .create_agent_workflow("t1", "API", &assignments())
            .await
            .unwrap();
        manager
            .handle_agent_commit("t1", "agent-be", CommitInfo::new("abc", "wip", vec![]))
            .await
            .unwrap();

        manager.submit_agent_work("t1", "agent-be").await.unwrap();
        assert_eq!(
            manager.workflow("t1").await.unwrap().status,
            WorkflowStatus::Open
        );

        manager.submit_agent_work("t1", "agent-fe").await.unwrap();
        assert_eq!(
            manager.workflow("t1").await.unwrap().status,
            WorkflowStatus::Review
        );
        assert!(!host.get_pull_request(handle.pr_number).await.unwrap().draft);
    }

    #[tokio::test]
    async fn test_all_submitted_without_commits_still_enters_review() {
        let (manager, host) = manager_with_host().await;
        let handle = manager
            .create_agent_workflow("t1", "API", &assignments())
            .await
            .unwrap();

        // No commits at all; the workflow passes through open on its way
        // to review, and the PR leaves draft.
        manager.submit_agent_work("t1", "agent-be").await.unwrap();
        manager.submit_agent_work("t1", "agent-fe").await.unwrap();

        assert_eq!(
            manager.workflow("t1").await.unwrap().status,
            WorkflowStatus::Review
        );
        assert!(!host.get_pull_request(handle.pr_number).await.unwrap().draft);
    }

    #[tokio::test]
    async fn test_review_approve_merge() {
        let (manager, host) = manager_with_host().await;
        let handle = manager
            .create_agent_workflow("t1", "API", &assignments())
            .await
            .unwrap();
        manager
            .handle_agent_commit("t1", "agent-be", CommitInfo::new("abc", "wip", vec![]))
            .await
            .unwrap();
        manager.submit_agent_work("t1", "agent-be").await.unwrap();
        manager.submit_agent_work("t1", "agent-fe").await.unwrap();

        manager
            .request_review("t1", "agent-be", "agent-reviewer")
            .await
            .unwrap();
        assert_eq!(
            host.reviewers(handle.pr_number).await,
            vec!["agent-reviewer".to_string()]
        );

        manager.approve_workflow("t1").await.unwrap();
        manager.merge_workflow("t1").await.unwrap();
        let merged = manager.workflow("t1").await.unwrap();
        assert_eq!(merged.status, WorkflowStatus::Merged);
        assert!(manager.active_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_merge_requires_review_state() {
        let (manager, _host) = manager_with_host().await;
        manager
            .create_agent_workflow("t1", "API", &assignments())
            .await
            .unwrap();
        let err = manager.merge_workflow("t1").await.unwrap_err();
        assert!(matches!(err, SwarmError::Workflow(_)));
    }

    #[tokio::test]
    async fn test_degraded_mode_without_host() {
        let manager = WorkflowManager::new(None);
        let handle = manager
            .create_agent_workflow("t1", "API", &assignments())
            .await
            .unwrap();
        assert_eq!(handle.pr_number, 0);

        manager
            .handle_agent_commit("t1", "agent-be", CommitInfo::new("abc", "wip", vec![]))
            .await
            .unwrap();
        manager.submit_agent_work("t1", "agent-be").await.unwrap();
        manager.submit_agent_work("t1", "agent-fe").await.unwrap();
        assert_eq!(
            manager.workflow("t1").await.unwrap().status,
            WorkflowStatus::Review
        );

        let err = manager.merge_workflow("t1").await.unwrap_err();
        assert!(matches!(err, SwarmError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_close_from_any_active_state() {
        let (manager, _host) = manager_with_host().await;
        manager
            .create_agent_workflow("t1", "API", &assignments())
            .await
            .unwrap();
        manager.close_workflow("t1").await.unwrap();
        assert_eq!(
            manager.workflow("t1").await.unwrap().status,
            WorkflowStatus::Closed
        );
        let err = manager.close_workflow("t1").await.unwrap_err();
        assert!(matches!(err, SwarmError::Workflow(_)));
    }
}
