//! The orchestration engine: agent spawning, team assembly, task
//! distribution, and teardown.

use crate::scheduler::{self, TaskBoard};
use crate::types::{
    AgentAssignment, AgentHandle, AgentStatus, AssignmentStatus, RoomState, SpawnRequest,
    TeamSpawnResult, Termination,
};
use chrono::Utc;
use codeswarm_bus::MessageBus;
use codeswarm_core::protocol::{BusMessage, BusMessageKind};
use codeswarm_core::{AgentRole, SwarmError, SwarmResult};
use codeswarm_graph::analyze_project;
use codeswarm_sandbox::{ComputeProvider, SandboxSpec};
use codeswarm_workflow::{GitHost, WorkflowManager};
use futures_util::future::join_all;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Orchestrates the full lifecycle of sandboxed agent teams.
///
/// Collaborators are injected at construction; [`initialize`](Self::initialize)
/// validates the compute provider before any team is spawned.
pub struct AgentOrchestrator {
    provider: Arc<dyn ComputeProvider>,
    bus: Arc<MessageBus>,
    git_host: Option<Arc<dyn GitHost>>,
    workflows: Arc<WorkflowManager>,
    /// Role → sandbox template (image name for the Docker backend).
    templates: HashMap<AgentRole, String>,
    agents: RwLock<HashMap<String, AgentHandle>>,
    rooms: RwLock<HashMap<String, RoomState>>,
    boards: RwLock<HashMap<String, TaskBoard>>,
}

impl AgentOrchestrator {
    /// Wire the orchestrator to its collaborators.
    pub fn new(
        provider: Arc<dyn ComputeProvider>,
        bus: Arc<MessageBus>,
        git_host: Option<Arc<dyn GitHost>>,
        templates: HashMap<AgentRole, String>,
    ) -> Self {
        let workflows = Arc::new(WorkflowManager::new(git_host.clone()));
        Self {
            provider,
            bus,
            git_host,
            workflows,
            templates,
            agents: RwLock::new(HashMap::new()),
            rooms: RwLock::new(HashMap::new()),
            boards: RwLock::new(HashMap::new()),
        }
    }

    /// The workflow manager, shared so callers can drive review and merge.
    pub fn workflows(&self) -> Arc<WorkflowManager> {
        Arc::clone(&self.workflows)
    }

    /// Fail-fast startup probe: create and kill one sandbox per distinct
    /// role template. Any failure means the provider cannot serve that
    /// template and the orchestrator must not start.
    pub async fn initialize(&self) -> SwarmResult<()> {
        let distinct: HashSet<&String> = self.templates.values().collect();
        for template in distinct {
            let probe = SandboxSpec::new(template.clone()).with_name("startup-probe");
            let sandbox_id = self.provider.create_sandbox(&probe).await.map_err(|e| {
                SwarmError::Unavailable(format!("compute provider (template {template}): {e}"))
            })?;
            self.provider.kill_sandbox(&sandbox_id).await.map_err(|e| {
                SwarmError::Unavailable(format!("compute provider (template {template}): {e}"))
            })?;
            debug!(template, "startup probe passed");
        }
        info!(templates = self.templates.len(), "orchestrator initialized");
        Ok(())
    }

    /// Spawn one agent into a fresh sandbox and announce it to the bus.
    ///
    /// The agent's room is the team id; messages sent before the agent's
    /// transport connects queue on the bus and flush at registration.
    pub async fn spawn_agent(&self, request: SpawnRequest) -> SwarmResult<AgentHandle> {
        let template = self.templates.get(&request.role).ok_or_else(|| {
            SwarmError::Spawn(format!("no sandbox template for role {}", request.role))
        })?;

        let agent_id = format!("agent-{}", uuid::Uuid::new_v4());
        let spec = SandboxSpec::new(template.clone())
            .with_name(&agent_id)
            .with_env("AGENT_ID", &agent_id)
            .with_env("AGENT_ROLE", request.role.to_string())
            .with_env("TEAM_ID", &request.task_id);

        let sandbox_id = self
            .provider
            .create_sandbox(&spec)
            .await
            .map_err(|e| SwarmError::Spawn(format!("{}: {e}", request.role)))?;

        let now = Utc::now();
        let mut handle = AgentHandle {
            agent_id: agent_id.clone(),
            sandbox_id: sandbox_id.clone(),
            role: request.role,
            task_id: request.task_id.clone(),
            status: AgentStatus::Initializing,
            specialization: request.specialization.clone(),
            git_branch: None,
            pr_number: None,
            created_at: now,
            last_activity: now,
        };

        self.write_bootstrap(&handle, &request.skills)
            .await
            .map_err(|e| SwarmError::Spawn(format!("{}: bootstrap: {e}", request.role)))?;

        self.bus
            .reserve(&agent_id, &request.task_id, &request.role.to_string())
            .await;

        {
            let mut rooms = self.rooms.write().await;
            let room = rooms
                .entry(request.task_id.clone())
                .or_insert_with(|| RoomState::new(&request.task_id));
            room.assignments.insert(
                agent_id.clone(),
                AgentAssignment {
                    agent_id: agent_id.clone(),
                    role: request.role,
                    tasks: Vec::new(),
                    dependencies: Vec::new(),
                    estimated_time: 0.0,
                    status: AssignmentStatus::Pending,
                },
            );
            room.last_updated = Utc::now();
        }

        handle.status = AgentStatus::Ready;
        handle.last_activity = Utc::now();
        self.agents
            .write()
            .await
            .insert(agent_id.clone(), handle.clone());

        info!(
            agent_id,
            sandbox_id,
            role = %request.role,
            team_id = request.task_id,
            "agent spawned"
        );
        Ok(handle)
    }

    async fn write_bootstrap(&self, handle: &AgentHandle, skills: &[String]) -> SwarmResult<()> {
        let config = serde_json::json!({
            "agentId": handle.agent_id,
            "role": handle.role,
            "teamId": handle.task_id,
            "specialization": handle.specialization,
            "skills": skills,
        });
        self.provider
            .write_file(
                &handle.sandbox_id,
                "/workspace/agent.json",
                &serde_json::to_string_pretty(&config)?,
            )
            .await?;

        let instructions = format!(
            "# Agent briefing\n\nYou are the {} agent for team {}.\n\
             Connect to the message bus, register into room {}, and wait for\n\
             task assignments. Report completions back on the bus.\n",
            handle.role, handle.task_id, handle.task_id
        );
        self.provider
            .write_file(&handle.sandbox_id, "/workspace/BRIEFING.md", &instructions)
            .await
    }

    /// Analyze a project description, provision a repository, spawn the
    /// derived team concurrently, open its collaboration workflow, and hand
    /// out the first round of tasks.
    ///
    /// Partial success is the contract: on any spawn failure the error names
    /// the failed roles while already-spawned agents keep running; callers
    /// reclaim them with [`terminate_task_agents`](Self::terminate_task_agents).
    pub async fn spawn_project_team(
        &self,
        project_name: &str,
        description: &str,
    ) -> SwarmResult<TeamSpawnResult> {
        let requirements = analyze_project(description);
        let team_id = format!("team-{}", uuid::Uuid::new_v4());
        info!(
            team_id,
            complexity = ?requirements.complexity,
            agents = requirements.required_agents.total,
            tasks = requirements.tasks.len(),
            "spawning project team"
        );

        let repository_url = match &self.git_host {
            Some(host) => Some(host.create_repository(project_name).await?),
            None => None,
        };

        let mut requests = Vec::new();
        for role_req in &requirements.required_agents.roles {
            for i in 0..role_req.count {
                requests.push(SpawnRequest {
                    role: role_req.role,
                    task_id: team_id.clone(),
                    specialization: (role_req.count > 1)
                        .then(|| format!("{}-{}", role_req.role, i + 1)),
                    skills: role_req.skills.clone(),
                });
            }
        }

        let results = join_all(requests.iter().map(|r| self.spawn_agent(r.clone()))).await;

        let mut handles = Vec::new();
        let mut failed_roles = Vec::new();
        for (request, result) in requests.iter().zip(results) {
            match result {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    warn!(role = %request.role, error = %e, "agent spawn failed");
                    failed_roles.push(request.role.to_string());
                }
            }
        }
        if !failed_roles.is_empty() {
            return Err(SwarmError::Spawn(format!(
                "team {team_id}: failed to spawn roles: {}",
                failed_roles.join(", ")
            )));
        }

        let assignments: Vec<(String, AgentRole)> = handles
            .iter()
            .map(|h| (h.agent_id.clone(), h.role))
            .collect();
        self.workflows
            .create_agent_workflow(&team_id, project_name, &assignments)
            .await?;

        if let Some(workflow) = self.workflows.workflow(&team_id).await {
            let pr_number = (workflow.pr_number != 0).then_some(workflow.pr_number);
            let mut agents = self.agents.write().await;
            for handle in &mut handles {
                let branch = format!("{}/{}", workflow.branch_name, handle.agent_id);
                handle.git_branch = Some(branch.clone());
                handle.pr_number = pr_number;
                if let Some(stored) = agents.get_mut(&handle.agent_id) {
                    stored.git_branch = Some(branch);
                    stored.pr_number = pr_number;
                }
            }
        }

        {
            let mut rooms = self.rooms.write().await;
            if let Some(room) = rooms.get_mut(&team_id) {
                room.plan = Some(serde_json::to_value(&requirements)?);
                room.last_updated = Utc::now();
            }
        }

        self.boards
            .write()
            .await
            .insert(team_id.clone(), TaskBoard::new(requirements.tasks.clone()));

        let assigned = self.distribute_initial_tasks(&team_id).await?;
        info!(team_id, assigned, "initial task distribution done");

        Ok(TeamSpawnResult {
            team_id,
            repository_url,
            requirements,
            agents: handles,
        })
    }

    /// Hand out the first round of tasks to a freshly spawned team. Same
    /// rule as [`monitor_and_redistribute`](Self::monitor_and_redistribute).
    pub async fn distribute_initial_tasks(&self, team_id: &str) -> SwarmResult<usize> {
        self.monitor_and_redistribute(team_id).await
    }

    /// One scheduling pass over a team: every ready agent gets the first
    /// runnable task for its role; agents whose remaining tasks are still
    /// blocked stay idle. Returns the number of tasks handed out.
    ///
    /// Pure state machine; the caller owns the cadence (the CLI drives it
    /// from a timer, tests call it directly).
    pub async fn monitor_and_redistribute(&self, team_id: &str) -> SwarmResult<usize> {
        let mut handed_out = Vec::new();
        {
            let mut boards = self.boards.write().await;
            let board = boards
                .get_mut(team_id)
                .ok_or_else(|| SwarmError::NotFound(format!("team {team_id}")))?;
            let mut agents = self.agents.write().await;
            for handle in agents
                .values_mut()
                .filter(|h| h.task_id == team_id && h.status == AgentStatus::Ready)
            {
                let Some(task) = board.next_for_role(handle.role) else {
                    if scheduler::should_agent_sleep(board.tasks(), handle.role) {
                        debug!(agent_id = handle.agent_id, role = %handle.role, "agent idle, work still blocked");
                    }
                    continue;
                };
                board.mark_in_progress(&task.id)?;
                handle.status = AgentStatus::Working;
                handle.last_activity = Utc::now();
                handed_out.push((handle.agent_id.clone(), task));
            }
        }

        {
            let mut rooms = self.rooms.write().await;
            if let Some(room) = rooms.get_mut(team_id) {
                for (agent_id, task) in &handed_out {
                    if let Some(assignment) = room.assignments.get_mut(agent_id) {
                        assignment.tasks.push(task.id.clone());
                        for dep in &task.dependencies {
                            if !assignment.dependencies.contains(dep) {
                                assignment.dependencies.push(dep.clone());
                            }
                        }
                        assignment.estimated_time += task.estimated_hours;
                        assignment.status = AssignmentStatus::Active;
                    }
                }
                room.last_updated = Utc::now();
            }
        }

        for (agent_id, task) in &handed_out {
            let notice = BusMessage::new(
                BusMessageKind::Message,
                "orchestrator",
                team_id,
                serde_json::json!({
                    "event": "task-assigned",
                    "taskId": task.id,
                    "name": task.name,
                    "description": task.description,
                    "estimatedHours": task.estimated_hours,
                }),
            );
            self.bus.send_to_agent(agent_id, notice).await;
            debug!(agent_id, task_id = task.id, "task assigned");
        }
        Ok(handed_out.len())
    }

    /// Record a task completion reported by an agent, then run another
    /// scheduling pass so newly unblocked tasks are handed out immediately.
    pub async fn handle_task_completion(
        &self,
        team_id: &str,
        agent_id: &str,
        task_id: &str,
    ) -> SwarmResult<usize> {
        {
            let mut boards = self.boards.write().await;
            let board = boards
                .get_mut(team_id)
                .ok_or_else(|| SwarmError::NotFound(format!("team {team_id}")))?;
            board.mark_completed(task_id)?;

            let mut agents = self.agents.write().await;
            let handle = agents
                .get_mut(agent_id)
                .ok_or_else(|| SwarmError::NotFound(format!("agent {agent_id}")))?;
            handle.status = AgentStatus::Ready;
            handle.last_activity = Utc::now();
        }

        let done = BusMessage::new(
            BusMessageKind::RoomUpdate,
            agent_id,
            team_id,
            serde_json::json!({ "event": "task-completed", "taskId": task_id }),
        );
        self.bus.broadcast_to_room(team_id, &done, Some(agent_id)).await;
        info!(team_id, agent_id, task_id, "task completed");

        self.monitor_and_redistribute(team_id).await
    }

    /// Append a message to a room's rolling history.
    pub async fn record_room_message(
        &self,
        team_id: &str,
        agent_id: &str,
        content: Value,
    ) -> SwarmResult<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(team_id)
            .ok_or_else(|| SwarmError::NotFound(format!("room {team_id}")))?;
        room.record_message(agent_id, content);
        Ok(())
    }

    /// Publish a shared-knowledge entry into a room.
    pub async fn share_knowledge(
        &self,
        team_id: &str,
        key: &str,
        value: Value,
    ) -> SwarmResult<()> {
        let mut rooms = self.rooms.write().await;
        let room = rooms
            .get_mut(team_id)
            .ok_or_else(|| SwarmError::NotFound(format!("room {team_id}")))?;
        room.knowledge.insert(key.to_string(), value);
        room.last_updated = Utc::now();
        Ok(())
    }

    /// Tear down one agent: kill its sandbox, drop its bus connection, and
    /// remove its room assignment. Accepts an agent id or a sandbox id.
    pub async fn terminate_agent(&self, id: &str) -> SwarmResult<()> {
        let handle = {
            let mut agents = self.agents.write().await;
            let key = if agents.contains_key(id) {
                Some(id.to_string())
            } else {
                agents
                    .values()
                    .find(|h| h.sandbox_id == id)
                    .map(|h| h.agent_id.clone())
            };
            key.and_then(|k| agents.remove(&k))
        }
        .ok_or_else(|| SwarmError::NotFound(format!("agent {id}")))?;

        self.provider.kill_sandbox(&handle.sandbox_id).await?;
        self.bus.disconnect(&handle.agent_id).await;

        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get_mut(&handle.task_id) {
            room.assignments.remove(&handle.agent_id);
            room.last_updated = Utc::now();
        }
        info!(
            agent_id = handle.agent_id,
            sandbox_id = handle.sandbox_id,
            "agent terminated"
        );
        Ok(())
    }

    /// Tear down a whole team, best effort. Each agent yields a
    /// [`Termination`] record; a failed sandbox kill is reported there
    /// instead of aborting the remaining cleanup. The room, board, and
    /// workflow are discarded regardless.
    pub async fn terminate_task_agents(&self, team_id: &str) -> Vec<Termination> {
        let handles: Vec<AgentHandle> = {
            let mut agents = self.agents.write().await;
            let ids: Vec<String> = agents
                .values()
                .filter(|h| h.task_id == team_id)
                .map(|h| h.agent_id.clone())
                .collect();
            ids.iter().filter_map(|id| agents.remove(id)).collect()
        };

        let kills = join_all(handles.iter().map(|h| {
            let provider = Arc::clone(&self.provider);
            async move { provider.kill_sandbox(&h.sandbox_id).await }
        }))
        .await;

        let mut terminations = Vec::with_capacity(handles.len());
        for (handle, kill) in handles.iter().zip(kills) {
            self.bus.disconnect(&handle.agent_id).await;
            let error = kill.err().map(|e| e.to_string());
            if let Some(e) = &error {
                warn!(agent_id = handle.agent_id, error = %e, "sandbox kill failed");
            }
            terminations.push(Termination {
                agent_id: handle.agent_id.clone(),
                sandbox_id: handle.sandbox_id.clone(),
                error,
            });
        }

        self.rooms.write().await.remove(team_id);
        self.boards.write().await.remove(team_id);
        if let Some(workflow) = self.workflows.workflow(team_id).await {
            if !workflow.status.is_terminal() {
                if let Err(e) = self.workflows.close_workflow(team_id).await {
                    warn!(team_id, error = %e, "failed to close workflow");
                }
            }
        }

        info!(team_id, count = terminations.len(), "team terminated");
        terminations
    }

    // --- Accessors ---

    /// Ids of teams with an active task board, sorted.
    pub async fn team_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.boards.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot of a team's room.
    pub async fn room_state(&self, team_id: &str) -> Option<RoomState> {
        self.rooms.read().await.get(team_id).cloned()
    }

    /// Snapshot of a team's task board.
    pub async fn board_tasks(&self, team_id: &str) -> Option<Vec<codeswarm_graph::ProjectTask>> {
        self.boards
            .read()
            .await
            .get(team_id)
            .map(|b| b.tasks().to_vec())
    }

    /// Agents belonging to a team, sorted by agent id.
    pub async fn list_task_agents(&self, team_id: &str) -> Vec<AgentHandle> {
        let agents = self.agents.read().await;
        let mut handles: Vec<AgentHandle> = agents
            .values()
            .filter(|h| h.task_id == team_id)
            .cloned()
            .collect();
        handles.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        handles
    }

    /// One agent's handle.
    pub async fn agent(&self, agent_id: &str) -> Option<AgentHandle> {
        self.agents.read().await.get(agent_id).cloned()
    }

    /// An agent's lifecycle status, looked up by agent id or sandbox id.
    pub async fn agent_status(&self, id: &str) -> Option<AgentStatus> {
        let agents = self.agents.read().await;
        agents
            .get(id)
            .or_else(|| agents.values().find(|h| h.sandbox_id == id))
            .map(|h| h.status)
    }
}
