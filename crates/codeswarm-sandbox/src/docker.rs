//! Docker-backed compute provider (requires the `docker` feature).
//!
//! Each sandbox is one container kept alive with `sleep infinity`; files and
//! code execution go through `docker exec` with `sh -c`.

use crate::provider::{
    sanitize_command, ComputeProvider, ContainerRuntime, ContainerStatus, ExecOutcome,
    SandboxSpec,
};
use async_trait::async_trait;
use bollard::{
    container::{
        Config as ContainerConfig, CreateContainerOptions, LogOutput, RemoveContainerOptions,
        StartContainerOptions, StopContainerOptions,
    },
    exec::{CreateExecOptions, StartExecResults},
    network::{CreateNetworkOptions, ListNetworksOptions},
    Docker,
};
use codeswarm_core::{SwarmError, SwarmResult};
use futures_util::StreamExt;
use tracing::{debug, info};

/// Execution timeout for a single exec inside a sandbox.
const EXEC_TIMEOUT_SECS: u64 = 120;

/// A [`ComputeProvider`] backed by the local Docker daemon.
pub struct DockerProvider {
    client: Docker,
}

impl DockerProvider {
    /// Connect to the local Docker daemon and verify it responds.
    pub async fn connect() -> SwarmResult<Self> {
        let client = Docker::connect_with_local_defaults().map_err(|e| {
            SwarmError::Unavailable(format!("failed to connect to Docker daemon: {e}"))
        })?;
        client
            .ping()
            .await
            .map_err(|e| SwarmError::Unavailable(format!("Docker daemon ping failed: {e}")))?;
        info!("Docker provider connected");
        Ok(Self { client })
    }

    async fn exec(&self, container_id: &str, command: &str) -> SwarmResult<ExecOutcome> {
        let command = sanitize_command(command)?;

        let exec_opts = CreateExecOptions {
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            cmd: Some(vec!["sh".to_string(), "-c".to_string(), command]),
            ..Default::default()
        };

        let exec_created = self
            .client
            .create_exec(container_id, exec_opts)
            .await
            .map_err(|e| SwarmError::Sandbox(format!("failed to create exec: {e}")))?;

        let start_result = self
            .client
            .start_exec(&exec_created.id, None)
            .await
            .map_err(|e| SwarmError::Sandbox(format!("failed to start exec: {e}")))?;

        let mut output = String::new();
        let mut stderr = String::new();

        if let StartExecResults::Attached {
            output: mut stream, ..
        } = start_result
        {
            let deadline = tokio::time::Instant::now()
                + std::time::Duration::from_secs(EXEC_TIMEOUT_SECS);

            loop {
                let chunk = tokio::time::timeout_at(deadline, stream.next()).await;
                match chunk {
                    Ok(Some(Ok(log))) => match log {
                        LogOutput::StdOut { message } => {
                            output.push_str(&String::from_utf8_lossy(&message));
                        }
                        LogOutput::StdErr { message } => {
                            stderr.push_str(&String::from_utf8_lossy(&message));
                        }
                        _ => {}
                    },
                    Ok(Some(Err(e))) => {
                        return Err(SwarmError::Sandbox(format!(
                            "error reading exec output: {e}"
                        )));
                    }
                    Ok(None) => break,
                    Err(_) => {
                        return Ok(ExecOutcome {
                            exit_code: -1,
                            output,
                            error: Some(format!(
                                "command timed out after {EXEC_TIMEOUT_SECS}s"
                            )),
                        });
                    }
                }
            }
        }

        let inspect = self
            .client
            .inspect_exec(&exec_created.id)
            .await
            .map_err(|e| SwarmError::Sandbox(format!("failed to inspect exec: {e}")))?;

        let exit_code = inspect.exit_code.unwrap_or(-1);
        debug!(exit_code, output_len = output.len(), "exec finished");

        Ok(ExecOutcome {
            exit_code,
            output,
            error: if exit_code == 0 { None } else { Some(stderr) },
        })
    }
}

#[async_trait]
impl ContainerRuntime for DockerProvider {
    async fn create_container(&self, spec: &SandboxSpec) -> SwarmResult<String> {
        let memory_bytes = (spec.memory_limit_mb * 1024 * 1024) as i64;
        // Docker CPU quota: period=100_000 µs, quota = period * cpu_limit
        let cpu_quota = (100_000.0 * spec.cpu_limit) as i64;

        let host_config = bollard::models::HostConfig {
            memory: Some(memory_bytes),
            cpu_quota: Some(cpu_quota),
            cpu_period: Some(100_000),
            network_mode: if spec.network_enabled {
                None
            } else {
                Some("none".to_string())
            },
            ..Default::default()
        };

        let env: Vec<String> = spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();

        let container_config = ContainerConfig {
            image: Some(spec.template.clone()),
            working_dir: Some(spec.working_dir.clone()),
            env: Some(env),
            tty: Some(true),
            cmd: Some(vec!["sleep".to_string(), "infinity".to_string()]),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = spec.name.as_ref().map(|name| CreateContainerOptions {
            name: name.clone(),
            ..Default::default()
        });

        let container = self
            .client
            .create_container(options, container_config)
            .await
            .map_err(|e| SwarmError::Sandbox(format!("failed to create container: {e}")))?;

        Ok(container.id)
    }

    async fn start_container(&self, id: &str) -> SwarmResult<()> {
        self.client
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| SwarmError::Sandbox(format!("failed to start container: {e}")))
    }

    async fn stop_container(&self, id: &str) -> SwarmResult<()> {
        self.client
            .stop_container(id, Some(StopContainerOptions { t: 5 }))
            .await
            .map_err(|e| SwarmError::Sandbox(format!("failed to stop container: {e}")))
    }

    async fn remove_container(&self, id: &str) -> SwarmResult<()> {
        self.client
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| SwarmError::Sandbox(format!("failed to remove container: {e}")))
    }

    async fn container_status(&self, id: &str) -> SwarmResult<ContainerStatus> {
        let inspect = self
            .client
            .inspect_container(id, None)
            .await
            .map_err(|e| SwarmError::NotFound(format!("container {id}: {e}")))?;

        let state = inspect.state.unwrap_or_default();
        Ok(ContainerStatus {
            state: state
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            running: state.running.unwrap_or(false),
        })
    }

    async fn exec_in_container(&self, id: &str, command: &str) -> SwarmResult<ExecOutcome> {
        self.exec(id, command).await
    }

    async fn create_network(&self, name: &str) -> SwarmResult<String> {
        let response = self
            .client
            .create_network(CreateNetworkOptions {
                name: name.to_string(),
                ..Default::default()
            })
            .await
            .map_err(|e| SwarmError::Sandbox(format!("failed to create network: {e}")))?;
        Ok(response.id.unwrap_or_default())
    }

    async fn list_networks(&self) -> SwarmResult<Vec<String>> {
        let networks = self
            .client
            .list_networks(None::<ListNetworksOptions<String>>)
            .await
            .map_err(|e| SwarmError::Sandbox(format!("failed to list networks: {e}")))?;
        Ok(networks.into_iter().filter_map(|n| n.name).collect())
    }
}

#[async_trait]
impl ComputeProvider for DockerProvider {
    async fn create_sandbox(&self, spec: &SandboxSpec) -> SwarmResult<String> {
        let id = self.create_container(spec).await?;
        self.start_container(&id).await?;
        info!(sandbox_id = %id, template = %spec.template, "sandbox started");
        Ok(id)
    }

    async fn kill_sandbox(&self, sandbox_id: &str) -> SwarmResult<()> {
        // Best-effort stop, then force remove.
        let _ = self.stop_container(sandbox_id).await;
        self.remove_container(sandbox_id).await?;
        info!(sandbox_id = %sandbox_id, "sandbox removed");
        Ok(())
    }

    async fn write_file(&self, sandbox_id: &str, path: &str, content: &str) -> SwarmResult<()> {
        // Single-quote escaping keeps arbitrary content intact through sh -c.
        let escaped = content.replace('\'', r"'\''");
        let parent = match path.rfind('/') {
            Some(idx) if idx > 0 => &path[..idx],
            _ => ".",
        };
        let command =
            format!("mkdir -p '{parent}' && printf '%s' '{escaped}' > '{path}'");
        let outcome = self.exec(sandbox_id, &command).await?;
        if outcome.is_success() {
            Ok(())
        } else {
            Err(SwarmError::Sandbox(format!(
                "failed to write {path}: {}",
                outcome.error.unwrap_or_default()
            )))
        }
    }

    async fn execute_code(
        &self,
        sandbox_id: &str,
        code: &str,
        language: &str,
    ) -> SwarmResult<ExecOutcome> {
        let (path, runner) = match language {
            "python" => ("/tmp/snippet.py", "python3 /tmp/snippet.py"),
            "javascript" | "typescript" => ("/tmp/snippet.js", "node /tmp/snippet.js"),
            "shell" | "bash" | "sh" => ("/tmp/snippet.sh", "sh /tmp/snippet.sh"),
            other => {
                return Err(SwarmError::Sandbox(format!(
                    "unsupported language: {other}"
                )))
            }
        };
        self.write_file(sandbox_id, path, code).await?;
        self.exec(sandbox_id, runner).await
    }
}
