//! The message bus: registration, room fan-out, direct delivery with offline
//! queueing, request/response correlation, and heartbeat-based liveness.
//!
//! Delivery guarantees: at-least-once, unordered across agents, ordered per
//! connection. No deduplication and no acknowledgement beyond the liveness
//! ping.

use crate::connection::{AgentConnection, RosterEntry};
use chrono::Utc;
use codeswarm_core::protocol::{BusMessage, ControlFrame, ControlKind};
use codeswarm_core::{SwarmError, SwarmResult};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

#[derive(Default)]
struct BusState {
    /// Live connections by agent id.
    connections: HashMap<String, AgentConnection>,
    /// Live agents per room.
    rooms: HashMap<String, HashSet<String>>,
    /// Every agent the bus has been told about, live or offline.
    roster: HashMap<String, RosterEntry>,
    /// Unbounded, non-deduplicated queues for offline agents.
    offline: HashMap<String, VecDeque<BusMessage>>,
    /// Pending request correlation: correlation id → requesting agent.
    pending_requests: HashMap<String, String>,
}

/// The room-scoped message router for agent collaboration.
pub struct MessageBus {
    state: RwLock<BusState>,
}

impl MessageBus {
    /// Create an empty bus.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(BusState::default()),
        })
    }

    /// Announce an agent before its transport connects.
    ///
    /// From this point messages sent to the agent accumulate in its offline
    /// queue and are flushed on [`register`](Self::register).
    pub async fn reserve(&self, agent_id: &str, room_id: &str, role: &str) {
        let mut state = self.state.write().await;
        state.roster.insert(
            agent_id.to_string(),
            RosterEntry {
                room_id: room_id.to_string(),
                role: role.to_string(),
            },
        );
        state.offline.entry(agent_id.to_string()).or_default();
        debug!(agent_id, room_id, "agent reserved on bus");
    }

    /// Bind a transport connection to an agent and room.
    ///
    /// Sends `registered` to the new connection, notifies room peers with
    /// `agent-joined`, then flushes the agent's offline queue in original
    /// send order.
    pub async fn register(
        &self,
        agent_id: &str,
        room_id: &str,
        role: &str,
        tx: mpsc::UnboundedSender<String>,
    ) -> SwarmResult<()> {
        let flushed = {
            let mut state = self.state.write().await;

            let conn = AgentConnection::new(agent_id, room_id, role, tx);
            state.connections.insert(agent_id.to_string(), conn);
            state
                .rooms
                .entry(room_id.to_string())
                .or_default()
                .insert(agent_id.to_string());
            state.roster.insert(
                agent_id.to_string(),
                RosterEntry {
                    room_id: room_id.to_string(),
                    role: role.to_string(),
                },
            );

            let ack = ControlFrame::new(ControlKind::Registered)
                .agent(agent_id)
                .room(room_id);
            Self::push_control(&state, agent_id, &ack);

            let joined = ControlFrame::new(ControlKind::AgentJoined)
                .agent(agent_id)
                .room(room_id)
                .content(serde_json::json!({ "role": role }));
            Self::fanout_control(&state, room_id, &joined, Some(agent_id));

            // Flush under the same lock so nothing sent concurrently can
            // slip in ahead of the queued backlog.
            let queued = state
                .offline
                .get_mut(agent_id)
                .map(std::mem::take)
                .unwrap_or_default();
            for msg in &queued {
                Self::push_message(&state, agent_id, msg);
            }
            queued.len()
        };

        info!(agent_id, room_id, role, flushed, "agent registered");
        Ok(())
    }

    /// Drop an agent's live connection and notify its room peers.
    ///
    /// The roster entry and offline queue survive so the agent can
    /// reconnect and receive anything sent in the meantime.
    pub async fn disconnect(&self, agent_id: &str) -> bool {
        let mut state = self.state.write().await;
        Self::remove_connection(&mut state, agent_id)
    }

    fn remove_connection(state: &mut BusState, agent_id: &str) -> bool {
        let Some(conn) = state.connections.remove(agent_id) else {
            return false;
        };
        let room_id = conn.room_id.clone();
        if let Some(members) = state.rooms.get_mut(&room_id) {
            members.remove(agent_id);
            if members.is_empty() {
                state.rooms.remove(&room_id);
            }
        }
        let left = ControlFrame::new(ControlKind::AgentLeft)
            .agent(agent_id)
            .room(&room_id);
        Self::fanout_control(state, &room_id, &left, Some(agent_id));
        info!(agent_id, room_id = %room_id, "agent disconnected");
        true
    }

    /// Deliver directly to an agent, or enqueue if it has no live
    /// connection. Queued messages are flushed FIFO at registration.
    pub async fn send_to_agent(&self, agent_id: &str, message: BusMessage) {
        let mut state = self.state.write().await;
        let delivered = state
            .connections
            .get(agent_id)
            .map(|conn| Self::try_send(conn, &message))
            .unwrap_or(false);

        if !delivered {
            debug!(agent_id, message_id = %message.message_id, "queued for offline agent");
            state
                .offline
                .entry(agent_id.to_string())
                .or_default()
                .push_back(message);
        }
    }

    /// Fan a message out to every live connection in a room, optionally
    /// excluding one agent (usually the sender).
    pub async fn broadcast_to_room(
        &self,
        room_id: &str,
        message: &BusMessage,
        exclude_agent_id: Option<&str>,
    ) -> usize {
        let state = self.state.read().await;
        let Some(members) = state.rooms.get(room_id) else {
            return 0;
        };
        let mut sent = 0;
        for member in members {
            if exclude_agent_id == Some(member.as_str()) {
                continue;
            }
            if let Some(conn) = state.connections.get(member) {
                if Self::try_send(conn, message) {
                    sent += 1;
                }
            }
        }
        sent
    }

    /// Forward a correlated request to the target agent, recording the
    /// requester so the response can find its way back.
    pub async fn handle_request(&self, target_agent_id: &str, message: BusMessage) -> SwarmResult<()> {
        let correlation_id = message
            .correlation_id
            .clone()
            .ok_or_else(|| SwarmError::Bus("request without correlationId".to_string()))?;
        {
            let mut state = self.state.write().await;
            state
                .pending_requests
                .insert(correlation_id, message.agent_id.clone());
        }
        self.send_to_agent(target_agent_id, message).await;
        Ok(())
    }

    /// Route a response back to the agent that issued the matching request.
    pub async fn handle_response(&self, message: BusMessage) -> SwarmResult<()> {
        let correlation_id = message
            .correlation_id
            .clone()
            .ok_or_else(|| SwarmError::Bus("response without correlationId".to_string()))?;
        let requester = {
            let mut state = self.state.write().await;
            state.pending_requests.remove(&correlation_id)
        };
        let Some(requester) = requester else {
            return Err(SwarmError::NotFound(format!(
                "no pending request for correlation {correlation_id}"
            )));
        };
        self.send_to_agent(&requester, message).await;
        Ok(())
    }

    /// Record a heartbeat answer from an agent.
    pub async fn heartbeat(&self, agent_id: &str) {
        let mut state = self.state.write().await;
        if let Some(conn) = state.connections.get_mut(agent_id) {
            conn.is_alive = true;
            conn.last_heartbeat = Utc::now();
        }
    }

    /// One liveness pass: terminate connections that did not answer the
    /// previous ping, then ping the survivors. Returns the terminated agent
    /// ids.
    pub async fn sweep(&self) -> Vec<String> {
        let mut state = self.state.write().await;

        let dead: Vec<String> = state
            .connections
            .values()
            .filter(|c| !c.is_alive)
            .map(|c| c.agent_id.clone())
            .collect();

        for agent_id in &dead {
            warn!(agent_id, "connection failed liveness check, terminating");
            Self::remove_connection(&mut state, agent_id);
        }

        let ping = ControlFrame::new(ControlKind::Ping);
        for conn in state.connections.values_mut() {
            conn.is_alive = false;
            if let Ok(json) = serde_json::to_string(&ping) {
                let _ = conn.tx.send(json);
            }
        }

        dead
    }

    /// Spawn the background heartbeat loop. Returns the join handle so the
    /// caller can abort it on shutdown.
    pub fn run_heartbeat(
        self: &Arc<Self>,
        interval: std::time::Duration,
    ) -> tokio::task::JoinHandle<()> {
        let bus = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately; skip it so fresh connections get
            // a full interval before their first ping.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let dead = bus.sweep().await;
                if !dead.is_empty() {
                    info!(count = dead.len(), "heartbeat sweep terminated connections");
                }
            }
        })
    }

    // --- Accessors ---

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// Live agents in a room.
    pub async fn room_agents(&self, room_id: &str) -> Vec<String> {
        let state = self.state.read().await;
        state
            .rooms
            .get(room_id)
            .map(|members| {
                let mut agents: Vec<String> = members.iter().cloned().collect();
                agents.sort();
                agents
            })
            .unwrap_or_default()
    }

    /// Queued message count for an agent.
    pub async fn offline_queue_len(&self, agent_id: &str) -> usize {
        self.state
            .read()
            .await
            .offline
            .get(agent_id)
            .map(VecDeque::len)
            .unwrap_or(0)
    }

    /// The roster entry for an agent, if the bus knows it.
    pub async fn roster_entry(&self, agent_id: &str) -> Option<RosterEntry> {
        self.state.read().await.roster.get(agent_id).cloned()
    }

    // --- Send helpers ---

    fn try_send(conn: &AgentConnection, message: &BusMessage) -> bool {
        match serde_json::to_string(message) {
            Ok(json) => conn.tx.send(json).is_ok(),
            Err(e) => {
                warn!(error = %e, "failed to serialize bus message");
                false
            }
        }
    }

    fn push_control(state: &BusState, agent_id: &str, frame: &ControlFrame) {
        if let Some(conn) = state.connections.get(agent_id) {
            if let Ok(json) = serde_json::to_string(frame) {
                let _ = conn.tx.send(json);
            }
        }
    }

    fn push_message(state: &BusState, agent_id: &str, message: &BusMessage) {
        if let Some(conn) = state.connections.get(agent_id) {
            Self::try_send(conn, message);
        }
    }

    fn fanout_control(
        state: &BusState,
        room_id: &str,
        frame: &ControlFrame,
        exclude: Option<&str>,
    ) {
        let Some(members) = state.rooms.get(room_id) else {
            return;
        };
        let Ok(json) = serde_json::to_string(frame) else {
            return;
        };
        for member in members {
            if exclude == Some(member.as_str()) {
                continue;
            }
            if let Some(conn) = state.connections.get(member) {
                let _ = conn.tx.send(json.clone());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use codeswarm_core::protocol::BusMessageKind;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn chat(from: &str, room: &str, text: &str) -> BusMessage {
        BusMessage::new(
            BusMessageKind::Message,
            from,
            room,
            serde_json::json!({ "text": text }),
        )
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            out.push(serde_json::from_str(&raw).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_offline_queue_flushed_in_order() {
        let bus = MessageBus::new();
        bus.reserve("agent-a", "room-1", "backend").await;

        bus.send_to_agent("agent-a", chat("agent-b", "room-1", "first"))
            .await;
        bus.send_to_agent("agent-a", chat("agent-b", "room-1", "second"))
            .await;
        assert_eq!(bus.offline_queue_len("agent-a").await, 2);

        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.register("agent-a", "room-1", "backend", tx).await.unwrap();
        assert_eq!(bus.offline_queue_len("agent-a").await, 0);

        let frames = drain(&mut rx);
        // registered ack, then the two queued messages in send order
        assert_eq!(frames[0]["type"], "registered");
        assert_eq!(frames[1]["content"]["text"], "first");
        assert_eq!(frames[2]["content"]["text"], "second");
    }

    #[tokio::test]
    async fn test_backlog_precedes_messages_sent_after_register() {
        let bus = MessageBus::new();
        bus.reserve("agent-a", "room-1", "backend").await;
        bus.send_to_agent("agent-a", chat("agent-b", "room-1", "queued"))
            .await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        bus.register("agent-a", "room-1", "backend", tx).await.unwrap();
        bus.send_to_agent("agent-a", chat("agent-b", "room-1", "live"))
            .await;

        let frames = drain(&mut rx);
        assert_eq!(frames[0]["type"], "registered");
        assert_eq!(frames[1]["content"]["text"], "queued");
        assert_eq!(frames[2]["content"]["text"], "live");
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let bus = MessageBus::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        bus.register("agent-a", "room-1", "backend", tx_a).await.unwrap();
        bus.register("agent-b", "room-1", "frontend", tx_b).await.unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        let sent = bus
            .broadcast_to_room("room-1", &chat("agent-a", "room-1", "hello"), Some("agent-a"))
            .await;
        assert_eq!(sent, 1);
        assert!(drain(&mut rx_a).is_empty());
        let received = drain(&mut rx_b);
        assert_eq!(received.len(), 1);
        assert_eq!(received[0]["content"]["text"], "hello");
    }

    #[tokio::test]
    async fn test_agent_joined_notifies_peers() {
        let bus = MessageBus::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        bus.register("agent-a", "room-1", "backend", tx_a).await.unwrap();
        drain(&mut rx_a);

        let (tx_b, _rx_b) = mpsc::unbounded_channel();
        bus.register("agent-b", "room-1", "frontend", tx_b).await.unwrap();

        let frames = drain(&mut rx_a);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "agent-joined");
        assert_eq!(frames[0]["agentId"], "agent-b");
    }

    #[tokio::test]
    async fn test_request_response_correlation() {
        let bus = MessageBus::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        bus.register("agent-a", "room-1", "backend", tx_a).await.unwrap();
        bus.register("agent-b", "room-1", "frontend", tx_b).await.unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        let request = BusMessage::new(
            BusMessageKind::Request,
            "agent-a",
            "room-1",
            serde_json::json!({ "question": "schema?" }),
        )
        .with_correlation("corr-1");
        bus.handle_request("agent-b", request).await.unwrap();

        let got = drain(&mut rx_b);
        assert_eq!(got[0]["type"], "request");
        assert_eq!(got[0]["correlationId"], "corr-1");

        let response = BusMessage::new(
            BusMessageKind::Response,
            "agent-b",
            "room-1",
            serde_json::json!({ "answer": "v2" }),
        )
        .with_correlation("corr-1");
        bus.handle_response(response).await.unwrap();

        let got = drain(&mut rx_a);
        assert_eq!(got[0]["type"], "response");
        assert_eq!(got[0]["content"]["answer"], "v2");
    }

    #[tokio::test]
    async fn test_response_without_pending_request_fails() {
        let bus = MessageBus::new();
        let response = BusMessage::new(
            BusMessageKind::Response,
            "agent-b",
            "room-1",
            serde_json::Value::Null,
        )
        .with_correlation("corr-unknown");
        let err = bus.handle_response(response).await.unwrap_err();
        assert!(matches!(err, SwarmError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_sweep_terminates_silent_connection() {
        let bus = MessageBus::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        bus.register("agent-a", "room-1", "backend", tx_a).await.unwrap();
        bus.register("agent-b", "room-1", "frontend", tx_b).await.unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);

        // First sweep pings both.
        assert!(bus.sweep().await.is_empty());
        assert_eq!(drain(&mut rx_a).len(), 1);
        assert_eq!(drain(&mut rx_b).len(), 1);

        // Only agent-a answers.
        bus.heartbeat("agent-a").await;

        let dead = bus.sweep().await;
        assert_eq!(dead, vec!["agent-b".to_string()]);
        assert_eq!(bus.connection_count().await, 1);
        assert_eq!(bus.room_agents("room-1").await, vec!["agent-a".to_string()]);

        // agent-a is told the peer left, then pinged again.
        let frames = drain(&mut rx_a);
        assert_eq!(frames[0]["type"], "agent-left");
        assert_eq!(frames[0]["agentId"], "agent-b");
        assert_eq!(frames[1]["type"], "ping");
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_queues() {
        let bus = MessageBus::new();
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        bus.register("agent-a", "room-1", "backend", tx_a).await.unwrap();
        drop(rx_a);

        bus.send_to_agent("agent-a", chat("agent-b", "room-1", "lost?"))
            .await;
        assert_eq!(bus.offline_queue_len("agent-a").await, 1);
    }

    #[tokio::test]
    async fn test_disconnect_removes_room_membership() {
        let bus = MessageBus::new();
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        bus.register("agent-a", "room-1", "backend", tx_a).await.unwrap();

        assert!(bus.disconnect("agent-a").await);
        assert!(bus.room_agents("room-1").await.is_empty());
        assert!(!bus.disconnect("agent-a").await);
        // Roster survives for reconnects.
        assert!(bus.roster_entry("agent-a").await.is_some());
    }
}
