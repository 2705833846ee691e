use crate::graph::TaskGraph;
use serde::Serialize;
use std::collections::HashSet;

/// Result of checking an assembled graph for issues
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckResult {
    pub cycles: Vec<Vec<String>>,
    pub dangling_refs: Vec<DanglingRef>,
    pub ok: bool,
}

/// A reference to a record that was never fetched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DanglingRef {
    pub from: String,
    pub to: String,
    pub relation: Relation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Relation {
    DependsOn,
    Project,
    Column,
    Owner,
}

/// Find dependency cycles. Each cycle is listed as the PHIDs along it,
/// starting from the first task of the cycle the search reached.
pub fn check_cycles(graph: &TaskGraph) -> Vec<Vec<String>> {
    let mut cycles = Vec::new();
    let mut visited: HashSet<&str> = HashSet::new();

    for start in graph.tasks() {
        if !visited.insert(start.phid.as_str()) {
            continue;
        }
        // (task, index of the next dependency to follow)
        let mut stack: Vec<(&str, usize)> = vec![(start.phid.as_str(), 0)];
        let mut on_path: HashSet<&str> = HashSet::from([start.phid.as_str()]);

        while let Some(&(node, next)) = stack.last() {
            let deps = graph
                .get_task(node)
                .map(|t| t.depends_on.as_slice())
                .unwrap_or_default();

            let Some(dep) = deps.get(next) else {
                on_path.remove(node);
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }

            let dep = dep.as_str();
            if !graph.contains(dep) {
                continue;
            }
            if on_path.contains(dep) {
                if let Some(pos) = stack.iter().position(|(id, _)| *id == dep) {
                    cycles.push(stack[pos..].iter().map(|(id, _)| id.to_string()).collect());
                }
            } else if visited.insert(dep) {
                on_path.insert(dep);
                stack.push((dep, 0));
            }
        }
    }

    cycles
}

/// Find references to tasks, projects, columns and owners that did not resolve.
pub fn check_dangling(graph: &TaskGraph) -> Vec<DanglingRef> {
    let mut dangling = Vec::new();
    let mut push = |from: &str, to: &str, relation: Relation| {
        dangling.push(DanglingRef {
            from: from.to_string(),
            to: to.to_string(),
            relation,
        });
    };

    for task in graph.tasks() {
        for dep in &task.depends_on {
            if !graph.contains(dep) {
                push(&task.phid, dep, Relation::DependsOn);
            }
        }
        for project in &task.project_phids {
            if graph.project(project).is_none() {
                push(&task.phid, project, Relation::Project);
            }
        }
        for column in task.columns.values() {
            if graph.column(column).is_none() {
                push(&task.phid, column, Relation::Column);
            }
        }
        if let Some(owner) = task.owner()
            && graph.user(owner).is_none()
        {
            push(&task.phid, owner, Relation::Owner);
        }
    }

    dangling
}

pub fn check_all(graph: &TaskGraph) -> CheckResult {
    let cycles = check_cycles(graph);
    let dangling_refs = check_dangling(graph);
    let ok = cycles.is_empty() && dangling_refs.is_empty();
    CheckResult {
        cycles,
        dangling_refs,
        ok,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{make_task, make_task_with_deps, task_phid};

    fn graph_of(tasks: Vec<crate::graph::Task>) -> TaskGraph {
        let mut graph = TaskGraph::new();
        for task in tasks {
            graph.insert_task(task);
        }
        graph
    }

    #[test]
    fn test_no_cycles_in_chain() {
        let graph = graph_of(vec![
            make_task_with_deps(3, "C", &[2]),
            make_task_with_deps(2, "B", &[1]),
            make_task(1, "A"),
        ]);
        assert!(check_cycles(&graph).is_empty());
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let graph = graph_of(vec![
            make_task_with_deps(4, "Top", &[2, 3]),
            make_task_with_deps(2, "Left", &[1]),
            make_task_with_deps(3, "Right", &[1]),
            make_task(1, "Bottom"),
        ]);
        assert!(check_cycles(&graph).is_empty());
    }

    #[test]
    fn test_two_task_cycle() {
        let graph = graph_of(vec![
            make_task_with_deps(1, "A", &[2]),
            make_task_with_deps(2, "B", &[1]),
        ]);
        let cycles = check_cycles(&graph);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 2);
        assert!(cycles[0].contains(&task_phid(1)));
        assert!(cycles[0].contains(&task_phid(2)));
    }

    #[test]
    fn test_self_cycle() {
        let graph = graph_of(vec![make_task_with_deps(1, "A", &[1])]);
        assert_eq!(check_cycles(&graph), vec![vec![task_phid(1)]]);
    }

    #[test]
    fn test_dangling_dependency_and_owner() {
        let mut owned = make_task_with_deps(1, "A", &[404]);
        owned.owner_phid = Some("PHID-USER-gone".to_string());
        let graph = graph_of(vec![owned]);

        let dangling = check_dangling(&graph);
        assert_eq!(dangling.len(), 2);
        assert_eq!(dangling[0].relation, Relation::DependsOn);
        assert_eq!(dangling[0].to, task_phid(404));
        assert_eq!(dangling[1].relation, Relation::Owner);

        let result = check_all(&graph);
        assert!(!result.ok);
    }

    #[test]
    fn test_clean_graph_is_ok() {
        let graph = graph_of(vec![make_task_with_deps(2, "B", &[1]), make_task(1, "A")]);
        assert!(check_all(&graph).ok);
    }
}
