//! Agent lifecycle orchestration and dependency-aware task scheduling.
//!
//! The orchestrator turns a project description into a running team: it
//! derives the task graph and team composition, spawns one sandboxed agent
//! per required seat, announces each agent to the message bus, opens the
//! team's Git collaboration workflow, and hands tasks out as their
//! dependencies complete.
//!
//! # Main types
//!
//! - [`AgentOrchestrator`] — spawn, schedule, and tear down agent teams.
//! - [`TaskBoard`] — the mutable per-team task graph.
//! - [`AgentHandle`] / [`RoomState`] — the orchestrator's state records.

/// The orchestration engine.
pub mod engine;
/// Task selection and the per-team board.
pub mod scheduler;
/// State records and spawn/teardown types.
pub mod types;

pub use engine::AgentOrchestrator;
pub use scheduler::{available_tasks, should_agent_sleep, TaskBoard};
pub use types::{
    AgentAssignment, AgentHandle, AgentStatus, AssignmentStatus, RoomMessage, RoomState,
    SpawnRequest, TeamSpawnResult, Termination, MAX_ROOM_MESSAGES,
};
