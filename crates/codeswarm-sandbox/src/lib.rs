//! Compute provider interface and sandbox backends for Codeswarm.
//!
//! The orchestrator consumes sandboxes through the [`ComputeProvider`] trait;
//! the Docker backend (feature `docker`) runs each sandbox as a resource-
//! limited container, while [`InMemorySandbox`] backs tests and dry runs.
//!
//! # Main types
//!
//! - [`ComputeProvider`] — create/kill sandboxes, write files, execute code.
//! - [`ContainerRuntime`] — lower-level container and network control.
//! - [`SandboxSpec`] — requested template, limits, and environment.
//! - [`DockerProvider`] — bollard-backed implementation (feature `docker`).
//! - [`InMemorySandbox`] — recording test double.

/// Docker-backed provider.
#[cfg(feature = "docker")]
pub mod docker;
/// In-memory recording provider.
pub mod memory;
/// Provider traits and sandbox specs.
pub mod provider;

#[cfg(feature = "docker")]
pub use docker::DockerProvider;
pub use memory::InMemorySandbox;
pub use provider::{
    sanitize_command, ComputeProvider, ContainerRuntime, ContainerStatus, ExecOutcome,
    SandboxSpec,
};
