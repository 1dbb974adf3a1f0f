//! Structural validation of generated task graphs.

use crate::types::ProjectTask;
use std::collections::HashMap;

/// Return every dependency id that does not reference a task in the graph.
/// An empty result means the no-dangling-edges invariant holds.
pub fn dangling_dependencies(tasks: &[ProjectTask]) -> Vec<String> {
    let mut missing = Vec::new();
    for task in tasks {
        for dep in &task.dependencies {
            if !tasks.iter().any(|t| &t.id == dep) && !missing.contains(dep) {
                missing.push(dep.clone());
            }
        }
    }
    missing
}

/// Check for cycles in the dependency graph.
/// Returns true if a cycle is detected.
pub fn has_cycle(tasks: &[ProjectTask]) -> bool {
    let by_id: HashMap<&str, &ProjectTask> =
        tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut visited: HashMap<&str, u8> = HashMap::new();
    for task in tasks {
        if dfs_cycle(task.id.as_str(), &by_id, &mut visited) {
            return true;
        }
    }
    false
}

fn dfs_cycle<'a>(
    id: &'a str,
    by_id: &HashMap<&'a str, &'a ProjectTask>,
    visited: &mut HashMap<&'a str, u8>,
) -> bool {
    match visited.get(id) {
        Some(1) => return true,  // back edge = cycle
        Some(2) => return false, // already processed
        _ => {}
    }
    visited.insert(id, 1); // mark as in progress
    if let Some(task) = by_id.get(id) {
        for dep in &task.dependencies {
            if dfs_cycle(dep.as_str(), by_id, visited) {
                return true;
            }
        }
    }
    visited.insert(id, 2); // mark as done
    false
}
