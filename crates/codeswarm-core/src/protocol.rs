//! Wire protocol for the real-time communication bus.
//!
//! All messages are JSON with camelCase field names. Client-originated
//! messages carry a [`BusMessageKind`]; the server answers with
//! [`ControlKind`] frames (`welcome`, `registered`, `ping`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of a client-originated bus message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BusMessageKind {
    /// Bind this connection to an agent and room.
    Register,
    /// A room-scoped or direct chat message.
    Message,
    /// Liveness answer to a server `ping`.
    Heartbeat,
    /// A mutation of shared room state (plan, knowledge).
    RoomUpdate,
    /// A correlated request addressed to another agent.
    Request,
    /// The answer to a previously forwarded request.
    Response,
}

/// A message on the communication bus.
///
/// Delivery is at-least-once: messages for offline agents are queued
/// unbounded and flushed, in original send order, when the agent registers.
/// There is no deduplication, so consumers must tolerate replays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusMessage {
    /// Message kind discriminator.
    #[serde(rename = "type")]
    pub kind: BusMessageKind,
    /// The agent this message originates from (or is addressed to).
    pub agent_id: String,
    /// The room this message is scoped to.
    pub room_id: String,
    /// Role of the sending agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Arbitrary payload.
    #[serde(default)]
    pub content: serde_json::Value,
    /// Unique id for this message.
    pub message_id: String,
    /// Correlation id tying a request to its response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// UTC timestamp of when the message was created.
    pub timestamp: DateTime<Utc>,
}

impl BusMessage {
    /// Create a new message with a fresh message id and current timestamp.
    pub fn new(
        kind: BusMessageKind,
        agent_id: impl Into<String>,
        room_id: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self {
            kind,
            agent_id: agent_id.into(),
            room_id: room_id.into(),
            role: None,
            content,
            message_id: Uuid::new_v4().to_string(),
            correlation_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the sender's role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Attach a correlation id (for `request`/`response` pairs).
    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Server-to-client control frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlKind {
    /// Sent once on connect, before registration.
    Welcome,
    /// Acknowledges a successful `register`.
    Registered,
    /// A peer joined the room.
    AgentJoined,
    /// A peer left the room (disconnect or failed liveness check).
    AgentLeft,
    /// Liveness probe; the client must answer with `pong`.
    Ping,
    /// Liveness answer.
    Pong,
    /// The server rejected or failed to process a frame.
    Error,
}

/// A server-to-client control frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlFrame {
    /// Control frame kind.
    #[serde(rename = "type")]
    pub kind: ControlKind,
    /// The agent this frame concerns, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// The room this frame concerns, when applicable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// Additional payload (error text, room roster, ...).
    #[serde(default)]
    pub content: serde_json::Value,
    /// UTC timestamp.
    pub timestamp: DateTime<Utc>,
}

impl ControlFrame {
    /// Create a control frame with the current timestamp.
    pub fn new(kind: ControlKind) -> Self {
        Self {
            kind,
            agent_id: None,
            room_id: None,
            content: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Set the agent this frame concerns.
    pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Set the room this frame concerns.
    pub fn room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    /// Set the payload.
    pub fn content(mut self, content: serde_json::Value) -> Self {
        self.content = content;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_message_wire_field_names() {
        let msg = BusMessage::new(
            BusMessageKind::Message,
            "agent-1",
            "room-1",
            serde_json::json!({"text": "hi"}),
        )
        .with_role("backend")
        .with_correlation("corr-9");

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "message");
        assert_eq!(json["agentId"], "agent-1");
        assert_eq!(json["roomId"], "room-1");
        assert_eq!(json["correlationId"], "corr-9");
        assert!(json["messageId"].is_string());
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_bus_message_roundtrip() {
        let msg = BusMessage::new(
            BusMessageKind::Request,
            "agent-2",
            "room-7",
            serde_json::json!({"target": "agent-3"}),
        );
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: BusMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.kind, BusMessageKind::Request);
        assert_eq!(parsed.message_id, msg.message_id);
    }

    #[test]
    fn test_control_kind_kebab_case() {
        let json = serde_json::to_string(&ControlKind::AgentLeft).unwrap();
        assert_eq!(json, "\"agent-left\"");
        let json = serde_json::to_string(&ControlKind::Ping).unwrap();
        assert_eq!(json, "\"ping\"");
    }

    #[test]
    fn test_register_parse_minimal() {
        let raw = r#"{
            "type": "register",
            "agentId": "agent-9",
            "roomId": "room-1",
            "role": "testing",
            "messageId": "m-1",
            "timestamp": "2026-01-01T00:00:00Z"
        }"#;
        let msg: BusMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.kind, BusMessageKind::Register);
        assert_eq!(msg.role.as_deref(), Some("testing"));
        assert!(msg.correlation_id.is_none());
        assert!(msg.content.is_null());
    }
}
