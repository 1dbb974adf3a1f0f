//! Live transport connections and the agent roster.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// A live transport connection for one agent.
///
/// Exists only while the transport is up; removed on disconnect or failed
/// liveness check. Messages are pushed through `tx` as serialized JSON.
#[derive(Debug)]
pub struct AgentConnection {
    /// The agent bound to this connection.
    pub agent_id: String,
    /// The room the agent registered into.
    pub room_id: String,
    /// The agent's role (free-form, as announced at registration).
    pub role: String,
    /// Outbound frame channel.
    pub tx: mpsc::UnboundedSender<String>,
    /// Time of the last heartbeat answer.
    pub last_heartbeat: DateTime<Utc>,
    /// False between a ping and its pong; a connection still false at the
    /// next sweep is considered dead.
    pub is_alive: bool,
}

impl AgentConnection {
    /// Create a fresh, alive connection.
    pub fn new(
        agent_id: impl Into<String>,
        room_id: impl Into<String>,
        role: impl Into<String>,
        tx: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            room_id: room_id.into(),
            role: role.into(),
            tx,
            last_heartbeat: Utc::now(),
            is_alive: true,
        }
    }
}

/// A known agent, live or not: room membership survives transport drops so
/// queued messages find their way back after a reconnect.
#[derive(Debug, Clone)]
pub struct RosterEntry {
    /// Room the agent belongs to.
    pub room_id: String,
    /// The agent's role.
    pub role: String,
}
