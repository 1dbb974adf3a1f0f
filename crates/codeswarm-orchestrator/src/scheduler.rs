//! Dependency-aware task selection and the per-team task board.

use codeswarm_core::{AgentRole, SwarmError, SwarmResult};
use codeswarm_graph::{ProjectTask, TaskStatus};

/// Ids of completed tasks, in creation order.
pub fn completed_ids(tasks: &[ProjectTask]) -> Vec<String> {
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .map(|t| t.id.clone())
        .collect()
}

/// Tasks an agent of `role` could start right now: pending, role-matched,
/// every blocking dependency completed. Creation order is preserved, so the
/// first element is the next assignment.
pub fn available_tasks(tasks: &[ProjectTask], role: AgentRole) -> Vec<&ProjectTask> {
    let completed = completed_ids(tasks);
    tasks
        .iter()
        .filter(|t| t.assigned_role == role && t.is_ready(&completed))
        .collect()
}

/// True when an agent of `role` has nothing runnable but still has pending
/// work ahead of it (its tasks are waiting on dependencies). Such agents stay
/// idle rather than being terminated.
pub fn should_agent_sleep(tasks: &[ProjectTask], role: AgentRole) -> bool {
    available_tasks(tasks, role).is_empty()
        && tasks
            .iter()
            .any(|t| t.assigned_role == role && t.status == TaskStatus::Pending)
}

/// The mutable task graph of one team.
///
/// Tasks are created once at graph-build time and only their statuses change;
/// nothing is ever added or removed during a run.
#[derive(Debug, Clone)]
pub struct TaskBoard {
    tasks: Vec<ProjectTask>,
}

impl TaskBoard {
    /// Wrap a freshly generated task list.
    pub fn new(tasks: Vec<ProjectTask>) -> Self {
        Self { tasks }
    }

    /// All tasks, in creation order.
    pub fn tasks(&self) -> &[ProjectTask] {
        &self.tasks
    }

    /// The next runnable task for `role`, if any.
    pub fn next_for_role(&self, role: AgentRole) -> Option<ProjectTask> {
        available_tasks(&self.tasks, role).first().map(|t| (*t).clone())
    }

    /// Move a pending task to `in-progress`.
    pub fn mark_in_progress(&mut self, task_id: &str) -> SwarmResult<()> {
        let task = self.get_mut(task_id)?;
        if task.status != TaskStatus::Pending {
            return Err(SwarmError::Workflow(format!(
                "task {task_id} is not pending"
            )));
        }
        task.status = TaskStatus::InProgress;
        Ok(())
    }

    /// Move a task to `completed`, unblocking its dependents.
    pub fn mark_completed(&mut self, task_id: &str) -> SwarmResult<()> {
        let task = self.get_mut(task_id)?;
        task.status = TaskStatus::Completed;
        Ok(())
    }

    /// True once every task is completed.
    pub fn all_completed(&self) -> bool {
        self.tasks.iter().all(|t| t.status == TaskStatus::Completed)
    }

    fn get_mut(&mut self, task_id: &str) -> SwarmResult<&mut ProjectTask> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| SwarmError::NotFound(format!("task {task_id}")))
    }
}
