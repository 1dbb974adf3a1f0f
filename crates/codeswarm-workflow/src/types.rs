use chrono::{DateTime, Utc};
use codeswarm_core::AgentRole;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Status of a task's collaboration workflow.
///
/// Lifecycle: `draft → open → review → approved → merged`; `closed` is
/// terminal from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Draft,
    Open,
    Review,
    Approved,
    Merged,
    Closed,
}

impl WorkflowStatus {
    /// True for states no workflow leaves again.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowStatus::Merged | WorkflowStatus::Closed)
    }

    /// Whether the state machine permits `self → to`.
    pub fn can_transition(self, to: WorkflowStatus) -> bool {
        use WorkflowStatus::*;
        match (self, to) {
            (Draft, Open) | (Open, Review) | (Review, Approved) => true,
            (Approved, Merged) => true,
            (from, Closed) if !from.is_terminal() => true,
            _ => false,
        }
    }
}

/// Per-agent status within a workflow.
///
/// Lifecycle: `assigned → working → submitted → reviewing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentWorkStatus {
    Assigned,
    Working,
    Submitted,
    Reviewing,
}

impl AgentWorkStatus {
    /// True once the agent's work is handed over (submitted or under
    /// review) — the condition for the workflow to enter `review`.
    pub fn is_handed_over(self) -> bool {
        matches!(self, AgentWorkStatus::Submitted | AgentWorkStatus::Reviewing)
    }
}

/// One commit recorded against an agent's workflow branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    /// Commit hash.
    pub sha: String,
    /// Commit message.
    pub message: String,
    /// Paths touched by the commit.
    #[serde(default)]
    pub files: Vec<String>,
    /// When the commit was recorded.
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    /// Record a commit with the current timestamp.
    pub fn new(sha: impl Into<String>, message: impl Into<String>, files: Vec<String>) -> Self {
        Self {
            sha: sha.into(),
            message: message.into(),
            files,
            timestamp: Utc::now(),
        }
    }
}

/// An agent's contribution record within one workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentWorkflowInfo {
    /// The agent.
    pub agent_id: String,
    /// Its role.
    pub role: AgentRole,
    /// The agent's sub-branch under the shared feature branch.
    pub branch: String,
    /// Commits recorded so far.
    pub commits: Vec<CommitInfo>,
    /// Current status.
    pub status: AgentWorkStatus,
}

/// The PR-backed collaboration record for one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowHandle {
    /// Pull request number on the Git host (0 when running degraded
    /// without a host).
    pub pr_number: u64,
    /// Shared feature branch for the task.
    pub branch_name: String,
    /// The task this workflow tracks.
    pub task_id: String,
    /// Workflow state.
    pub status: WorkflowStatus,
    /// Per-agent contribution records.
    pub agents: HashMap<String, AgentWorkflowInfo>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub last_updated: DateTime<Utc>,
}

impl WorkflowHandle {
    /// `(handed_over, total)` agent counts, for progress reporting.
    pub fn progress(&self) -> (usize, usize) {
        let handed_over = self
            .agents
            .values()
            .filter(|a| a.status.is_handed_over())
            .count();
        (handed_over, self.agents.len())
    }

    /// True when every agent has handed its work over.
    pub fn all_handed_over(&self) -> bool {
        !self.agents.is_empty() && self.agents.values().all(|a| a.status.is_handed_over())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use WorkflowStatus::*;
        assert!(Draft.can_transition(Open));
        assert!(Open.can_transition(Review));
        assert!(Review.can_transition(Approved));
        assert!(Approved.can_transition(Merged));
        assert!(!Review.can_transition(Merged));
        assert!(!Draft.can_transition(Review));
        assert!(!Merged.can_transition(Closed));
        assert!(Draft.can_transition(Closed));
        assert!(Review.can_transition(Closed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(WorkflowStatus::Merged.is_terminal());
        assert!(WorkflowStatus::Closed.is_terminal());
        assert!(!WorkflowStatus::Review.is_terminal());
    }

    fn handle_with(statuses: &[AgentWorkStatus]) -> WorkflowHandle {
        let mut agents = HashMap::new();
        for (i, status) in statuses.iter().enumerate() {
            let id = format!("agent-{i}");
            agents.insert(
                id.clone(),
                AgentWorkflowInfo {
                    agent_id: id,
                    role: AgentRole::Backend,
                    branch: format!("feature/t1/agent-{i}"),
                    commits: Vec::new(),
                    status: *status,
                },
            );
        }
        WorkflowHandle {
            pr_number: 7,
            branch_name: "feature/t1".into(),
            task_id: "t1".into(),
            status: WorkflowStatus::Draft,
            agents,
            created_at: Utc::now(),
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_all_handed_over() {
        use AgentWorkStatus::*;
        assert!(handle_with(&[Submitted, Reviewing]).all_handed_over());
        assert!(!handle_with(&[Submitted, Working]).all_handed_over());
        assert!(!handle_with(&[]).all_handed_over());
    }

    #[test]
    fn test_progress_counts() {
        use AgentWorkStatus::*;
        let handle = handle_with(&[Submitted, Working, Reviewing]);
        assert_eq!(handle.progress(), (2, 3));
    }
}
