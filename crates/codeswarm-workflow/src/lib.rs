//! Branch/PR-backed collaboration workflow for agent teams.
//!
//! Each task gets a shared feature branch, a sub-branch per assigned
//! agent, and a draft pull request. The workflow advances
//! `draft → open → review → approved → merged` as agents commit and hand
//! over, with a degraded host-less mode for local runs.
//!
//! # Main types
//!
//! - [`WorkflowManager`] — the lifecycle coordinator.
//! - [`GitHost`] — the seam to the source-control host.
//! - [`GitHubHost`] — the GitHub REST implementation.
//! - [`RecordingGitHost`] — an in-process host for tests.

/// GitHub REST backend.
pub mod github;
/// The host seam and its wire types.
pub mod host;
/// Workflow lifecycle management.
pub mod manager;
/// In-process recording host.
pub mod memory;
/// Workflow state machines and records.
pub mod types;

pub use github::GitHubHost;
pub use host::{GitHost, PullRequest, PullRequestSpec};
pub use manager::WorkflowManager;
pub use memory::RecordingGitHost;
pub use types::{
    AgentWorkStatus, AgentWorkflowInfo, CommitInfo, WorkflowHandle, WorkflowStatus,
};
