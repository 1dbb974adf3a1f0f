//! The compute-provider seam: traits the orchestrator consumes to create and
//! control isolated execution environments.

use async_trait::async_trait;
use codeswarm_core::{SwarmError, SwarmResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Requested shape of a sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxSpec {
    /// Execution template — for the Docker backend this is the image name.
    pub template: String,

    /// Optional human-readable name.
    #[serde(default)]
    pub name: Option<String>,

    /// Environment variables injected into the sandbox.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Memory limit in megabytes (default: 512).
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,

    /// CPU core limit (default: 1.0).
    #[serde(default = "default_cpu_limit")]
    pub cpu_limit: f64,

    /// Whether networking is enabled inside the sandbox (default: true —
    /// agents must reach the communication bus).
    #[serde(default = "default_network_enabled")]
    pub network_enabled: bool,

    /// Working directory inside the sandbox (default: "/workspace").
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
}

fn default_memory_limit_mb() -> u64 {
    512
}

fn default_cpu_limit() -> f64 {
    1.0
}

fn default_network_enabled() -> bool {
    true
}

fn default_working_dir() -> String {
    "/workspace".to_string()
}

impl SandboxSpec {
    /// A spec for the given template with default limits.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            name: None,
            env: HashMap::new(),
            memory_limit_mb: default_memory_limit_mb(),
            cpu_limit: default_cpu_limit(),
            network_enabled: default_network_enabled(),
            working_dir: default_working_dir(),
        }
    }

    /// Set the sandbox name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Result of executing code or a command inside a sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecOutcome {
    /// Process exit code (0 means success).
    pub exit_code: i64,
    /// Combined standard output.
    pub output: String,
    /// Present when execution failed (non-zero exit or runtime error).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecOutcome {
    /// True when the execution succeeded.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }
}

/// Coarse container state as reported by the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerStatus {
    /// Runtime-reported state string ("running", "exited", ...).
    pub state: String,
    /// Whether the container is currently running.
    pub running: bool,
}

/// Basic validation of a command string before execution.
///
/// Rejects empty commands and commands containing null bytes.
pub fn sanitize_command(cmd: &str) -> SwarmResult<String> {
    if cmd.trim().is_empty() {
        return Err(SwarmError::Sandbox("empty command rejected".to_string()));
    }
    if cmd.contains('\0') {
        return Err(SwarmError::Sandbox(
            "command contains null bytes".to_string(),
        ));
    }
    Ok(cmd.to_string())
}

/// An opaque provider of isolated, ephemeral execution environments.
///
/// The orchestrator owns exactly one handle per spawned sandbox and treats
/// these calls as suspension points; implementations must be safe to call
/// concurrently.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Create (and start) a sandbox, returning its id.
    async fn create_sandbox(&self, spec: &SandboxSpec) -> SwarmResult<String>;

    /// Destroy a sandbox and release its resources.
    async fn kill_sandbox(&self, sandbox_id: &str) -> SwarmResult<()>;

    /// Write a file inside the sandbox, creating parent directories.
    async fn write_file(&self, sandbox_id: &str, path: &str, content: &str) -> SwarmResult<()>;

    /// Execute a snippet of code in the given language inside the sandbox.
    async fn execute_code(
        &self,
        sandbox_id: &str,
        code: &str,
        language: &str,
    ) -> SwarmResult<ExecOutcome>;
}

/// Lower-level container control for providers backed by a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create a container without starting it.
    async fn create_container(&self, spec: &SandboxSpec) -> SwarmResult<String>;
    /// Start a created container.
    async fn start_container(&self, id: &str) -> SwarmResult<()>;
    /// Stop a running container.
    async fn stop_container(&self, id: &str) -> SwarmResult<()>;
    /// Remove a container (force).
    async fn remove_container(&self, id: &str) -> SwarmResult<()>;
    /// Inspect the container's state.
    async fn container_status(&self, id: &str) -> SwarmResult<ContainerStatus>;
    /// Run a shell command inside the container.
    async fn exec_in_container(&self, id: &str, command: &str) -> SwarmResult<ExecOutcome>;
    /// Create a named network, returning its id.
    async fn create_network(&self, name: &str) -> SwarmResult<String>;
    /// List known network names.
    async fn list_networks(&self) -> SwarmResult<Vec<String>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_defaults() {
        let spec = SandboxSpec::new("ubuntu:22.04");
        assert_eq!(spec.memory_limit_mb, 512);
        assert!((spec.cpu_limit - 1.0).abs() < f64::EPSILON);
        assert!(spec.network_enabled);
        assert_eq!(spec.working_dir, "/workspace");
    }

    #[test]
    fn test_spec_deserialize_with_defaults() {
        let spec: SandboxSpec = serde_json::from_str(r#"{"template": "node:20"}"#).unwrap();
        assert_eq!(spec.template, "node:20");
        assert_eq!(spec.memory_limit_mb, 512);
        assert!(spec.env.is_empty());
    }

    #[test]
    fn test_sanitize_command_rejects_empty() {
        assert!(sanitize_command("").is_err());
        assert!(sanitize_command("   ").is_err());
    }

    #[test]
    fn test_sanitize_command_rejects_null_bytes() {
        assert!(sanitize_command("echo \0hi").is_err());
    }

    #[test]
    fn test_exec_outcome_success() {
        let ok = ExecOutcome {
            exit_code: 0,
            output: "done".into(),
            error: None,
        };
        assert!(ok.is_success());
        let bad = ExecOutcome {
            exit_code: 1,
            output: String::new(),
            error: Some("boom".into()),
        };
        assert!(!bad.is_success());
    }
}
