//! Task graph builder: turns a free-text project description into a
//! dependency-ordered task graph with a derived team composition.
//!
//! The pipeline is pure: keyword-based factor extraction, a weighted
//! complexity score, a fixed task template set conditioned on the factors,
//! and role head-counts scaled by the complexity tier.
//!
//! # Main types
//!
//! - [`analyze_project`] — The one-call entry point.
//! - [`ProjectRequirements`] — Complexity, team, tasks, and dependency edges.
//! - [`ProjectTask`] — A single node in the task graph.
//! - [`ComplexityFactors`] — The extracted boolean/categorical factors.

/// Keyword extraction and the weighted complexity score.
pub mod analyzer;
/// Conditional task templates and team derivation.
pub mod templates;
/// Shared graph types.
pub mod types;
/// Dangling-edge and cycle checks.
pub mod validate;

pub use analyzer::{complexity_level, complexity_score, extract_factors, ComplexityFactors};
pub use templates::{derive_required_agents, generate_tasks};
pub use types::{
    Complexity, DependencyKind, ProjectRequirements, ProjectTask, RequiredAgents,
    RoleRequirement, TaskDependency, TaskPriority, TaskStatus,
};
pub use validate::{dangling_dependencies, has_cycle};

/// Build full project requirements from a free-text description.
///
/// Pure function of the input text: the same description always yields the
/// same complexity, tasks, and team. Missing factors simply produce the
/// minimal task set (setup, unit tests, code review).
pub fn analyze_project(description: &str) -> ProjectRequirements {
    let factors = extract_factors(description);
    let score = complexity_score(&factors);
    let complexity = complexity_level(score);
    let tasks = generate_tasks(&factors);
    let required_agents = derive_required_agents(&tasks, complexity, &factors);

    let dependencies = tasks
        .iter()
        .filter(|t| !t.dependencies.is_empty())
        .map(|t| TaskDependency {
            task_id: t.id.clone(),
            depends_on: t.dependencies.clone(),
            kind: DependencyKind::Blocking,
        })
        .collect();

    ProjectRequirements {
        complexity,
        estimated_hours: tasks.iter().map(|t| t.estimated_hours).sum(),
        required_agents,
        tasks,
        dependencies,
    }
}
