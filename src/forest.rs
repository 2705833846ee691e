//! The dependency forest: which tasks are roots, what hangs below each,
//! and the depth-first order renderers emit them in.

use std::collections::HashSet;

use crate::graph::{Task, TaskGraph};

/// A task reached by the walk
#[derive(Debug, Clone, Copy)]
pub struct Visit<'g> {
    pub root: &'g Task,
    pub task: &'g Task,
    pub parent: Option<&'g Task>,
    pub depth: usize,
}

#[derive(Debug, Clone, Copy)]
pub enum WalkEvent<'g> {
    Enter(Visit<'g>),
    Leave(&'g Task),
}

pub struct Forest<'g> {
    graph: &'g TaskGraph,
    targets: HashSet<&'g str>,
}

impl<'g> Forest<'g> {
    pub fn new(graph: &'g TaskGraph) -> Self {
        Self {
            graph,
            targets: graph.dependency_targets(),
        }
    }

    pub fn graph(&self) -> &'g TaskGraph {
        self.graph
    }

    /// A root is not depended on by any other fetched task.
    pub fn is_root(&self, task: &Task) -> bool {
        !self.targets.contains(task.phid.as_str())
    }

    /// Roots, highest id first.
    pub fn roots(&self) -> Vec<&'g Task> {
        let mut roots: Vec<&Task> = self.graph.tasks().filter(|t| self.is_root(t)).collect();
        roots.sort_by(|a, b| b.id.cmp(&a.id));
        roots
    }

    /// Fetched tasks `task` depends on, lowest id first. Dependencies that
    /// were never fetched are left out.
    pub fn children(&self, task: &Task) -> Vec<&'g Task> {
        let mut children: Vec<&Task> = task
            .depends_on
            .iter()
            .filter(|phid| **phid != task.phid)
            .filter_map(|phid| self.graph.get_task(phid))
            .collect();
        children.sort_by_key(|t| t.id);
        children.dedup_by_key(|t| t.id);
        children
    }

    /// Depth-first walk from every root.
    ///
    /// Uses an explicit stack, so long dependency chains cannot overflow.
    /// A child that is already on the path from its root is skipped, which
    /// keeps the walk finite on cyclic input.
    pub fn walk(&self) -> Vec<WalkEvent<'g>> {
        let mut events = Vec::new();

        for root in self.roots() {
            let mut stack = vec![WalkEvent::Enter(Visit {
                root,
                task: root,
                parent: None,
                depth: 0,
            })];
            let mut path: HashSet<&str> = HashSet::new();

            while let Some(event) = stack.pop() {
                match event {
                    WalkEvent::Enter(visit) => {
                        path.insert(visit.task.phid.as_str());
                        stack.push(WalkEvent::Leave(visit.task));
                        for child in self.children(visit.task).into_iter().rev() {
                            if path.contains(child.phid.as_str()) {
                                tracing::warn!(
                                    "dependency cycle: {} depends on its ancestor {}",
                                    visit.task.monogram(),
                                    child.monogram()
                                );
                                continue;
                            }
                            stack.push(WalkEvent::Enter(Visit {
                                root: visit.root,
                                task: child,
                                parent: Some(visit.task),
                                depth: visit.depth + 1,
                            }));
                        }
                        events.push(event);
                    }
                    WalkEvent::Leave(task) => {
                        path.remove(task.phid.as_str());
                        events.push(event);
                    }
                }
            }
        }

        events
    }

    /// Just the visits of [`Forest::walk`].
    pub fn visits(&self) -> Vec<Visit<'g>> {
        self.walk()
            .into_iter()
            .filter_map(|event| match event {
                WalkEvent::Enter(visit) => Some(visit),
                WalkEvent::Leave(_) => None,
            })
            .collect()
    }

    /// Tasks the walk never reaches. Only happens when every task that
    /// leads to them is itself inside a dependency cycle.
    pub fn unreachable(&self) -> Vec<&'g Task> {
        let reached: HashSet<&str> = self
            .visits()
            .iter()
            .map(|v| v.task.phid.as_str())
            .collect();
        self.graph
            .tasks()
            .filter(|t| !reached.contains(t.phid.as_str()))
            .collect()
    }
}
