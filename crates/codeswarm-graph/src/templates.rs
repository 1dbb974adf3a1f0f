//! Fixed task templates conditioned on the extracted complexity factors.
//!
//! The template chain is: setup → [database] → [backend API] → [frontend UI]
//! → [auth] → per-feature → [deployment] → unit tests → code review. Each
//! task is pre-wired with dependencies referencing earlier task ids, so the
//! generated graph never has dangling edges.

use crate::analyzer::ComplexityFactors;
use crate::types::{
    Complexity, ProjectTask, RequiredAgents, RoleRequirement, TaskPriority,
};
use codeswarm_core::AgentRole;
use std::collections::HashMap;

const FRONTEND_TECH: &[&str] = &["react", "vue", "angular", "svelte", "typescript"];

fn has_frontend_tech(factors: &ComplexityFactors) -> bool {
    factors
        .technologies
        .iter()
        .any(|t| FRONTEND_TECH.contains(&t.as_str()))
}

fn needs_backend(factors: &ComplexityFactors) -> bool {
    factors.has_database
        || factors.has_auth
        || factors.has_realtime
        || factors.has_payments
        || factors.has_ml
        || !factors.features.is_empty()
        || !factors.integrations.is_empty()
}

fn needs_frontend(factors: &ComplexityFactors) -> bool {
    has_frontend_tech(factors) || !factors.features.is_empty()
}

/// Generate the dependency-ordered task list for the given factors.
///
/// A description with no recognized factors produces the minimal set:
/// setup, unit tests, code review.
pub fn generate_tasks(factors: &ComplexityFactors) -> Vec<ProjectTask> {
    let mut tasks: Vec<ProjectTask> = Vec::new();

    tasks.push(ProjectTask::new(
        "setup",
        "Project Setup",
        "Initialize the repository, toolchain, and project scaffolding",
        AgentRole::Lead,
        4.0,
        TaskPriority::Critical,
    ));

    if factors.has_database {
        tasks.push(
            ProjectTask::new(
                "database",
                "Database Design",
                "Design the schema and set up migrations",
                AgentRole::Database,
                8.0,
                TaskPriority::High,
            )
            .with_dependencies(vec!["setup".into()]),
        );
    }

    if needs_backend(factors) {
        let mut deps = vec!["setup".to_string()];
        if factors.has_database {
            deps.push("database".into());
        }
        tasks.push(
            ProjectTask::new(
                "backend",
                "API Development",
                "Implement the server-side API endpoints and business logic",
                AgentRole::Backend,
                16.0,
                TaskPriority::High,
            )
            .with_dependencies(deps),
        );
    }

    if needs_frontend(factors) {
        tasks.push(
            ProjectTask::new(
                "frontend",
                "UI Components",
                "Build the user-facing components and views",
                AgentRole::Frontend,
                16.0,
                TaskPriority::Medium,
            )
            .with_dependencies(vec!["setup".into()]),
        );
    }

    if factors.has_auth {
        let dep = if tasks.iter().any(|t| t.id == "backend") {
            "backend"
        } else {
            "setup"
        };
        tasks.push(
            ProjectTask::new(
                "auth",
                "Authentication System",
                "Implement signup, login, and session handling",
                AgentRole::Backend,
                8.0,
                TaskPriority::High,
            )
            .with_dependencies(vec![dep.into()]),
        );
    }

    let feature_role = if tasks.iter().any(|t| t.id == "frontend") {
        AgentRole::Frontend
    } else {
        AgentRole::Backend
    };
    for feature in &factors.features {
        let mut deps = Vec::new();
        for base in ["backend", "frontend"] {
            if tasks.iter().any(|t| t.id == base) {
                deps.push(base.to_string());
            }
        }
        if deps.is_empty() {
            deps.push("setup".into());
        }
        tasks.push(
            ProjectTask::new(
                format!("feature-{feature}"),
                format!("{} Feature", capitalize(feature)),
                format!("Implement the {feature} feature end to end"),
                feature_role,
                6.0,
                TaskPriority::Medium,
            )
            .with_dependencies(deps),
        );
    }

    if factors.requires_scaling {
        let dep = if tasks.iter().any(|t| t.id == "backend") {
            "backend"
        } else {
            "setup"
        };
        tasks.push(
            ProjectTask::new(
                "deployment",
                "Deployment Pipeline",
                "Set up the build pipeline, environments, and horizontal scaling",
                AgentRole::Devops,
                8.0,
                TaskPriority::Medium,
            )
            .with_dependencies(vec![dep.into()]),
        );
    }

    // Unit tests wait on every implementation task created so far.
    let impl_ids: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
    tasks.push(
        ProjectTask::new(
            "tests",
            "Unit Tests",
            "Write unit and integration tests for all delivered work",
            AgentRole::Testing,
            12.0,
            TaskPriority::High,
        )
        .with_dependencies(impl_ids),
    );

    tasks.push(
        ProjectTask::new(
            "review",
            "Code Review",
            "Review the full changeset for quality and consistency",
            AgentRole::Reviewer,
            4.0,
            TaskPriority::Medium,
        )
        .with_dependencies(vec!["tests".into()]),
    );

    tasks
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// How many agents a scaling role gets per complexity tier, before the
/// task-volume cap.
fn tier_count(complexity: Complexity) -> usize {
    match complexity {
        Complexity::Simple => 1,
        Complexity::Moderate => 2,
        Complexity::Complex => 3,
        Complexity::Enterprise => 4,
    }
}

fn role_skills(role: AgentRole, factors: &ComplexityFactors) -> Vec<String> {
    match role {
        AgentRole::Lead => vec!["planning".into(), "coordination".into()],
        AgentRole::Frontend => {
            let mut skills: Vec<String> = factors
                .technologies
                .iter()
                .filter(|t| FRONTEND_TECH.contains(&t.as_str()))
                .cloned()
                .collect();
            if skills.is_empty() {
                skills.push("ui".into());
            }
            skills
        }
        AgentRole::Backend => {
            let mut skills: Vec<String> = factors
                .technologies
                .iter()
                .filter(|t| !FRONTEND_TECH.contains(&t.as_str()))
                .cloned()
                .collect();
            if skills.is_empty() {
                skills.push("api".into());
            }
            skills
        }
        AgentRole::Database => vec!["schema-design".into(), "migrations".into()],
        AgentRole::Testing => vec!["unit-testing".into(), "integration-testing".into()],
        AgentRole::Reviewer => vec!["code-review".into()],
        AgentRole::Devops => vec!["deployment".into(), "scaling".into()],
    }
}

/// Derive the required team composition from the generated tasks.
///
/// Always includes lead, testing, and reviewer. Backend and frontend counts
/// scale with the complexity tier, capped by the number of tasks targeting
/// that role.
pub fn derive_required_agents(
    tasks: &[ProjectTask],
    complexity: Complexity,
    factors: &ComplexityFactors,
) -> RequiredAgents {
    let mut task_counts: HashMap<AgentRole, usize> = HashMap::new();
    for task in tasks {
        *task_counts.entry(task.assigned_role).or_insert(0) += 1;
    }
    for role in [AgentRole::Lead, AgentRole::Testing, AgentRole::Reviewer] {
        task_counts.entry(role).or_insert(1);
    }

    let mut roles: Vec<RoleRequirement> = Vec::new();
    for role in AgentRole::ALL {
        let Some(&task_count) = task_counts.get(&role) else {
            continue;
        };
        let count = match role {
            AgentRole::Backend | AgentRole::Frontend => {
                tier_count(complexity).min(task_count).max(1)
            }
            _ => 1,
        };
        roles.push(RoleRequirement {
            role,
            count,
            skills: role_skills(role, factors),
        });
    }

    RequiredAgents {
        total: roles.iter().map(|r| r.count).sum(),
        roles,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::analyzer::extract_factors;

    #[test]
    fn test_minimal_description_minimal_tasks() {
        let factors = extract_factors("a thing");
        let tasks = generate_tasks(&factors);
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["setup", "tests", "review"]);
    }

    #[test]
    fn test_react_postgres_auth_scenario_tasks() {
        let factors = extract_factors(
            "Build a React dashboard with user authentication and a Postgres database",
        );
        let tasks = generate_tasks(&factors);
        let names: Vec<&str> = tasks.iter().map(|t| t.name.as_str()).collect();
        for expected in [
            "Project Setup",
            "Database Design",
            "API Development",
            "UI Components",
            "Authentication System",
            "Unit Tests",
            "Code Review",
        ] {
            assert!(names.contains(&expected), "missing task: {expected}");
        }
    }

    #[test]
    fn test_dependencies_reference_earlier_tasks_only() {
        let factors = extract_factors(
            "A scalable chat platform with websockets, stripe payments, and mongodb",
        );
        let tasks = generate_tasks(&factors);
        let mut seen: Vec<&str> = Vec::new();
        for task in &tasks {
            for dep in &task.dependencies {
                assert!(
                    seen.contains(&dep.as_str()),
                    "task {} depends on later/unknown id {}",
                    task.id,
                    dep
                );
            }
            seen.push(&task.id);
        }
    }

    #[test]
    fn test_tests_wait_on_all_impl_tasks() {
        let factors = extract_factors("A React app with a postgres database and login");
        let tasks = generate_tasks(&factors);
        let tests_task = tasks.iter().find(|t| t.id == "tests").unwrap();
        let impl_ids: Vec<&str> = tasks
            .iter()
            .filter(|t| t.id != "tests" && t.id != "review")
            .map(|t| t.id.as_str())
            .collect();
        for id in impl_ids {
            assert!(tests_task.dependencies.iter().any(|d| d == id));
        }
    }

    #[test]
    fn test_required_roles_always_include_core_three() {
        let factors = extract_factors("a thing");
        let tasks = generate_tasks(&factors);
        let agents = derive_required_agents(&tasks, Complexity::Simple, &factors);
        let roles: Vec<AgentRole> = agents.roles.iter().map(|r| r.role).collect();
        assert!(roles.contains(&AgentRole::Lead));
        assert!(roles.contains(&AgentRole::Testing));
        assert!(roles.contains(&AgentRole::Reviewer));
    }

    #[test]
    fn test_backend_count_scales_with_tier_capped_by_tasks() {
        let factors = extract_factors("A React app with postgres, login, payments via stripe");
        let tasks = generate_tasks(&factors);
        let backend_tasks = tasks
            .iter()
            .filter(|t| t.assigned_role == AgentRole::Backend)
            .count();

        let agents = derive_required_agents(&tasks, Complexity::Enterprise, &factors);
        let backend = agents
            .roles
            .iter()
            .find(|r| r.role == AgentRole::Backend)
            .unwrap();
        assert!(backend.count <= backend_tasks.max(1));
        assert!(backend.count >= 1);
    }

    #[test]
    fn test_total_is_sum_of_counts() {
        let factors = extract_factors("A React dashboard with postgres and auth");
        let tasks = generate_tasks(&factors);
        let agents = derive_required_agents(&tasks, Complexity::Moderate, &factors);
        let sum: usize = agents.roles.iter().map(|r| r.count).sum();
        assert_eq!(agents.total, sum);
    }
}
