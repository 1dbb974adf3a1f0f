//! Real-time communication bus for agent collaboration.
//!
//! A connection-oriented message router: agents register into rooms over
//! WebSocket, messages fan out to rooms or go directly to agents, offline
//! agents accumulate an unbounded queue flushed on reconnect, and a
//! heartbeat sweep terminates connections that stop answering pings.
//!
//! # Main types
//!
//! - [`MessageBus`] — registration, routing, queueing, liveness.
//! - [`AgentConnection`] — one live transport binding.
//! - [`build_router`] — the axum `/ws` + `/health` surface.

/// The message router.
pub mod bus;
/// Live connections and the agent roster.
pub mod connection;
/// WebSocket server surface.
pub mod server;

pub use bus::MessageBus;
pub use connection::{AgentConnection, RosterEntry};
pub use server::build_router;
