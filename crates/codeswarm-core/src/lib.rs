//! Core types and error definitions for Codeswarm.
//!
//! This crate provides the foundational types shared across all Codeswarm
//! crates: the unified error enum, agent roles, and the real-time wire
//! protocol spoken between agents and the communication bus.
//!
//! # Main types
//!
//! - [`SwarmError`] — Unified error enum for all Codeswarm subsystems.
//! - [`SwarmResult`] — Convenience alias for `Result<T, SwarmError>`.
//! - [`AgentRole`] — The specialization of a worker agent.
//! - [`protocol::BusMessage`] — A message on the real-time communication bus.

/// Wire protocol types for the real-time communication bus.
pub mod protocol;

use serde::{Deserialize, Serialize};

// --- Error types ---

/// Top-level error type for Codeswarm.
///
/// Each variant corresponds to a failure category; callers can match on the
/// category instead of parsing message text.
#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    /// A required collaborator service never became available. Fatal:
    /// orchestrator construction must not proceed.
    #[error("Service not available: {0}")]
    Unavailable(String),

    /// An individual agent spawn failed.
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// An operation referenced an unknown task, agent, room, or workflow.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An error from the sandbox compute provider.
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    /// An error from the communication bus.
    #[error("Bus error: {0}")]
    Bus(String),

    /// An error in the Git collaboration workflow state machine.
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// An error from the Git hosting backend.
    #[error("Git host error: {0}")]
    GitHost(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from an outbound HTTP request.
    #[error("HTTP error: {0}")]
    Http(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`SwarmError`].
pub type SwarmResult<T> = Result<T, SwarmError>;

// --- Roles ---

/// The specialization of a worker agent in the swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Coordinates the team, owns project setup.
    Lead,
    /// Builds user-facing components.
    Frontend,
    /// Builds APIs and server-side features.
    Backend,
    /// Designs and maintains the data layer.
    Database,
    /// Writes and runs tests.
    Testing,
    /// Reviews the team's output before merge.
    Reviewer,
    /// Provisioning, deployment, and scaling work.
    Devops,
}

impl AgentRole {
    /// All roles, in the order teams are assembled.
    pub const ALL: [AgentRole; 7] = [
        AgentRole::Lead,
        AgentRole::Frontend,
        AgentRole::Backend,
        AgentRole::Database,
        AgentRole::Testing,
        AgentRole::Reviewer,
        AgentRole::Devops,
    ];
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRole::Lead => write!(f, "lead"),
            AgentRole::Frontend => write!(f, "frontend"),
            AgentRole::Backend => write!(f, "backend"),
            AgentRole::Database => write!(f, "database"),
            AgentRole::Testing => write!(f, "testing"),
            AgentRole::Reviewer => write!(f, "reviewer"),
            AgentRole::Devops => write!(f, "devops"),
        }
    }
}

impl std::str::FromStr for AgentRole {
    type Err = SwarmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lead" => Ok(AgentRole::Lead),
            "frontend" => Ok(AgentRole::Frontend),
            "backend" => Ok(AgentRole::Backend),
            "database" => Ok(AgentRole::Database),
            "testing" => Ok(AgentRole::Testing),
            "reviewer" => Ok(AgentRole::Reviewer),
            "devops" => Ok(AgentRole::Devops),
            other => Err(SwarmError::Config(format!("unknown agent role: {other}"))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_display_roundtrip() {
        for role in AgentRole::ALL {
            let parsed = AgentRole::from_str(&role.to_string()).unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn test_role_parse_rejects_unknown() {
        let err = AgentRole::from_str("wizard").unwrap_err();
        assert!(matches!(err, SwarmError::Config(_)));
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&AgentRole::Backend).unwrap();
        assert_eq!(json, "\"backend\"");
    }

    #[test]
    fn test_error_display_has_category_prefix() {
        let err = SwarmError::Unavailable("compute provider".into());
        assert!(err.to_string().starts_with("Service not available"));
        let err = SwarmError::NotFound("task abc".into());
        assert!(err.to_string().starts_with("Not found"));
    }
}
