use clap::{Parser, Subcommand};
use codeswarm_bus::{build_router, MessageBus};
use codeswarm_core::AgentRole;
use codeswarm_graph::analyze_project;
use codeswarm_orchestrator::AgentOrchestrator;
use codeswarm_sandbox::{ComputeProvider, InMemorySandbox};
use codeswarm_workflow::{GitHost, GitHubHost};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codeswarm", about = "Codeswarm — sandboxed AI agent team orchestrator")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "codeswarm.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the message bus and orchestrator
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Analyze a project description and print the derived plan
    Plan {
        /// Free-text project description
        description: String,
    },
}

#[derive(Deserialize, Default)]
struct SwarmConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    scheduler: SchedulerConfig,
    #[serde(default)]
    sandbox: SandboxConfig,
    #[serde(default)]
    github: Option<GithubConfig>,
}

#[derive(Deserialize)]
struct ServerConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Deserialize)]
struct SchedulerConfig {
    #[serde(default = "default_heartbeat_secs")]
    heartbeat_secs: u64,
    #[serde(default = "default_redistribution_secs")]
    redistribution_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            redistribution_secs: default_redistribution_secs(),
        }
    }
}

#[derive(Deserialize)]
struct SandboxConfig {
    /// "docker" or "memory"
    #[serde(default = "default_backend")]
    backend: String,
    #[serde(default = "default_template")]
    default_template: String,
    /// Per-role template overrides, keyed by role name.
    #[serde(default)]
    templates: HashMap<String, String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            default_template: default_template(),
            templates: HashMap::new(),
        }
    }
}

#[derive(Deserialize)]
struct GithubConfig {
    owner: String,
    repo: String,
    token: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    4000
}
fn default_heartbeat_secs() -> u64 {
    15
}
fn default_redistribution_secs() -> u64 {
    30
}
fn default_backend() -> String {
    "memory".to_string()
}
fn default_template() -> String {
    "codeswarm-agent:latest".to_string()
}

fn role_templates(config: &SandboxConfig) -> HashMap<AgentRole, String> {
    let mut templates = HashMap::new();
    for role in AgentRole::ALL {
        let template = config
            .templates
            .get(&role.to_string())
            .cloned()
            .unwrap_or_else(|| config.default_template.clone());
        templates.insert(role, template);
    }
    templates
}

async fn build_provider(config: &SandboxConfig) -> anyhow::Result<Arc<dyn ComputeProvider>> {
    match config.backend.as_str() {
        "memory" => {
            warn!("using in-memory sandbox backend, agents are not isolated");
            Ok(Arc::new(InMemorySandbox::new()))
        }
        #[cfg(feature = "docker")]
        "docker" => {
            let provider = codeswarm_sandbox::DockerProvider::connect().await?;
            Ok(Arc::new(provider))
        }
        #[cfg(not(feature = "docker"))]
        "docker" => anyhow::bail!("this build was compiled without the docker feature"),
        other => anyhow::bail!("unknown sandbox backend '{other}'"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();

    // Missing config file means defaults; a present but invalid one is fatal.
    let config: SwarmConfig = match tokio::fs::read_to_string(&cli.config).await {
        Ok(raw) => toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid config '{}': {e}", cli.config.display()))?,
        Err(_) => {
            info!(path = %cli.config.display(), "no config file, using defaults");
            SwarmConfig::default()
        }
    };

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or(config.server.host);
            let port = port.unwrap_or(config.server.port);

            let provider = build_provider(&config.sandbox).await?;
            let git_host: Option<Arc<dyn GitHost>> = config.github.as_ref().map(|g| {
                Arc::new(GitHubHost::new(
                    g.owner.clone(),
                    g.repo.clone(),
                    g.token.clone(),
                )) as Arc<dyn GitHost>
            });
            if git_host.is_none() {
                warn!("no [github] config, collaboration workflows run host-less");
            }

            let bus = MessageBus::new();
            let orchestrator = Arc::new(AgentOrchestrator::new(
                provider,
                bus.clone(),
                git_host,
                role_templates(&config.sandbox),
            ));
            orchestrator.initialize().await?;

            let heartbeat =
                bus.run_heartbeat(Duration::from_secs(config.scheduler.heartbeat_secs));

            // Periodic scheduling pass over every active team.
            let redistributor = {
                let orchestrator = Arc::clone(&orchestrator);
                let period = Duration::from_secs(config.scheduler.redistribution_secs);
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(period);
                    ticker.tick().await;
                    loop {
                        ticker.tick().await;
                        for team_id in orchestrator.team_ids().await {
                            match orchestrator.monitor_and_redistribute(&team_id).await {
                                Ok(0) => {}
                                Ok(n) => info!(team_id, assigned = n, "redistributed tasks"),
                                Err(e) => warn!(team_id, error = %e, "redistribution failed"),
                            }
                        }
                    }
                })
            };

            let app = build_router(bus);
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!("Codeswarm bus listening on {}", addr);
            axum::serve(listener, app).await?;

            heartbeat.abort();
            redistributor.abort();
        }
        Commands::Plan { description } => {
            let requirements = analyze_project(&description);
            println!("{}", serde_json::to_string_pretty(&requirements)?);
        }
    }

    Ok(())
}
