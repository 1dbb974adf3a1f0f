use codeswarm_core::AgentRole;
use serde::{Deserialize, Serialize};

/// Status of a task in the project graph.
///
/// Lifecycle: `pending → in-progress → {blocked | review | completed}`.
/// Tasks are created once at graph-build time and mutated only by the
/// scheduler; they are never deleted during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Not yet assigned to an agent.
    Pending,
    /// Assigned and being worked.
    InProgress,
    /// Cannot proceed until an external condition clears.
    Blocked,
    /// Work finished, awaiting review.
    Review,
    /// Done; unblocks dependent tasks.
    Completed,
}

/// Relative priority of a task. Assignment order is creation order; priority
/// is carried for reporting and future re-ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Overall project complexity tier, derived from the weighted factor score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    Enterprise,
}

/// A single node in the project task graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTask {
    /// Stable id, referenced by `dependencies` of later tasks.
    pub id: String,
    /// Short display name.
    pub name: String,
    /// What the assigned agent is expected to do.
    pub description: String,
    /// The role this task is targeted at.
    pub assigned_role: AgentRole,
    /// Rough effort estimate in hours.
    pub estimated_hours: f32,
    /// Ids of tasks that must be `completed` before this one may start.
    pub dependencies: Vec<String>,
    /// Relative priority.
    pub priority: TaskPriority,
    /// Current lifecycle status.
    pub status: TaskStatus,
}

impl ProjectTask {
    /// Create a pending task with no dependencies.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        assigned_role: AgentRole,
        estimated_hours: f32,
        priority: TaskPriority,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            assigned_role,
            estimated_hours,
            dependencies: Vec::new(),
            priority,
            status: TaskStatus::Pending,
        }
    }

    /// Wire dependencies onto this task.
    pub fn with_dependencies(mut self, deps: Vec<String>) -> Self {
        self.dependencies = deps;
        self
    }

    /// True when this task is pending and every dependency id appears in
    /// `completed`.
    pub fn is_ready(&self, completed: &[String]) -> bool {
        self.status == TaskStatus::Pending
            && self
                .dependencies
                .iter()
                .all(|dep| completed.iter().any(|c| c == dep))
    }
}

/// How a dependency edge constrains scheduling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// The dependent task may not start until the dependency completes.
    Blocking,
    /// Advisory ordering only.
    Soft,
}

/// A dependency record in the flattened edge list carried alongside tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDependency {
    /// The dependent task.
    pub task_id: String,
    /// Tasks it waits on.
    pub depends_on: Vec<String>,
    /// Edge kind.
    #[serde(rename = "type")]
    pub kind: DependencyKind,
}

/// Required head-count for one role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequirement {
    /// The role.
    pub role: AgentRole,
    /// How many agents of this role to spawn.
    pub count: usize,
    /// Skills the agents should be primed with.
    pub skills: Vec<String>,
}

/// The full team requirement derived from the task graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredAgents {
    /// Sum of all role counts.
    pub total: usize,
    /// Per-role requirements.
    pub roles: Vec<RoleRequirement>,
}

/// Everything the orchestrator needs to spawn and schedule a project team.
///
/// Immutable after creation; `estimated_hours` is the sum of all task hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequirements {
    /// Derived complexity tier.
    pub complexity: Complexity,
    /// Sum of all task estimates.
    pub estimated_hours: f32,
    /// Team composition.
    pub required_agents: RequiredAgents,
    /// The dependency-ordered task list.
    pub tasks: Vec<ProjectTask>,
    /// Flattened dependency edge list (one record per task with deps).
    pub dependencies: Vec<TaskDependency>,
}
