use chrono::{DateTime, Utc};
use codeswarm_core::AgentRole;
use codeswarm_graph::ProjectRequirements;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Rooms keep only the most recent messages; older ones are dropped.
pub const MAX_ROOM_MESSAGES: usize = 100;

/// Lifecycle status of a spawned agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentStatus {
    /// Sandbox created, bootstrap files being written.
    Initializing,
    /// Idle and eligible for task assignment.
    Ready,
    /// Working an assigned task.
    Working,
    /// Reviewing another agent's output.
    Reviewing,
    /// Finished all of its work.
    Completed,
    /// Unrecoverable failure.
    Failed,
}

/// The orchestrator's record of one spawned agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHandle {
    /// Bus identity, `agent-<uuid>`.
    pub agent_id: String,
    /// The sandbox the agent runs in.
    pub sandbox_id: String,
    /// The agent's role.
    pub role: AgentRole,
    /// The team (and room) the agent belongs to.
    pub task_id: String,
    /// Lifecycle status.
    pub status: AgentStatus,
    /// Optional sub-specialization label when a role has several agents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    /// The agent's branch in the team's collaboration workflow, once opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    /// The team's pull request number, once opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    /// Spawn time.
    pub created_at: DateTime<Utc>,
    /// Last status change or assignment.
    pub last_activity: DateTime<Utc>,
}

/// Parameters for spawning a single agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnRequest {
    /// Role to spawn.
    pub role: AgentRole,
    /// Team id; doubles as the collaboration room id.
    pub task_id: String,
    /// Optional sub-specialization label.
    #[serde(default)]
    pub specialization: Option<String>,
    /// Skills the agent is primed with.
    #[serde(default)]
    pub skills: Vec<String>,
}

/// Status of one agent's assignment inside a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

/// Per-agent assignment record inside a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAssignment {
    /// The agent.
    pub agent_id: String,
    /// Its role.
    pub role: AgentRole,
    /// Task ids handed to this agent, in assignment order.
    pub tasks: Vec<String>,
    /// Dependency ids of the assigned tasks.
    pub dependencies: Vec<String>,
    /// Hours estimated across assigned tasks.
    pub estimated_time: f32,
    /// Assignment status.
    pub status: AssignmentStatus,
}

/// A message retained in a room's rolling history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomMessage {
    /// Sender.
    pub agent_id: String,
    /// Arbitrary payload.
    pub content: Value,
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
}

/// The shared collaboration state of one team room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    /// Room id (same as the team id).
    pub room_id: String,
    /// The team this room serves.
    pub task_id: String,
    /// The team's project plan, set once the task graph is built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Value>,
    /// Per-agent assignments.
    pub assignments: HashMap<String, AgentAssignment>,
    /// Rolling message history, capped at [`MAX_ROOM_MESSAGES`].
    pub messages: Vec<RoomMessage>,
    /// Free-form shared knowledge, keyed by topic.
    pub knowledge: HashMap<String, Value>,
    /// Last mutation time.
    pub last_updated: DateTime<Utc>,
}

impl RoomState {
    /// An empty room for a team.
    pub fn new(team_id: impl Into<String>) -> Self {
        let team_id = team_id.into();
        Self {
            room_id: team_id.clone(),
            task_id: team_id,
            plan: None,
            assignments: HashMap::new(),
            messages: Vec::new(),
            knowledge: HashMap::new(),
            last_updated: Utc::now(),
        }
    }

    /// Append a message, evicting the oldest once the cap is reached.
    pub fn record_message(&mut self, agent_id: impl Into<String>, content: Value) {
        self.messages.push(RoomMessage {
            agent_id: agent_id.into(),
            content,
            timestamp: Utc::now(),
        });
        if self.messages.len() > MAX_ROOM_MESSAGES {
            let excess = self.messages.len() - MAX_ROOM_MESSAGES;
            self.messages.drain(..excess);
        }
        self.last_updated = Utc::now();
    }
}

/// Outcome of tearing down one agent's resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Termination {
    /// The agent whose resources were released.
    pub agent_id: String,
    /// The sandbox that was killed (or failed to be).
    pub sandbox_id: String,
    /// Present when the kill failed; callers decide whether that is fatal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of spawning a full project team.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSpawnResult {
    /// The team id; also the room id and workflow task id.
    pub team_id: String,
    /// URL of the provisioned repository, when a Git host is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    /// The analyzed project requirements the team was built from.
    pub requirements: ProjectRequirements,
    /// The spawned agents.
    pub agents: Vec<AgentHandle>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_room_message_cap() {
        let mut room = RoomState::new("team-1");
        for i in 0..(MAX_ROOM_MESSAGES + 25) {
            room.record_message("agent-a", serde_json::json!({ "seq": i }));
        }
        assert_eq!(room.messages.len(), MAX_ROOM_MESSAGES);
        // Oldest dropped, newest kept.
        assert_eq!(room.messages[0].content["seq"], 25);
        assert_eq!(
            room.messages.last().unwrap().content["seq"],
            MAX_ROOM_MESSAGES + 24
        );
    }

    #[test]
    fn test_agent_status_wire_names() {
        let json = serde_json::to_string(&AgentStatus::Initializing).unwrap();
        assert_eq!(json, "\"initializing\"");
        let json = serde_json::to_string(&AgentStatus::Ready).unwrap();
        assert_eq!(json, "\"ready\"");
    }
}
