//! Resolving the projects, columns and owners tasks refer to.

use crate::conduit::ConduitError;
use crate::graph::{Column, Project, TaskGraph};
use crate::pagination::Fetcher;

/// Look up every project, column and owner referenced by the tasks in
/// `graph`, and derive the priority table. Ids that resolve to nothing
/// are left out.
pub fn resolve(fetcher: &Fetcher<'_>, graph: &mut TaskGraph) -> Result<(), ConduitError> {
    let projects = graph.project_phids();
    fetcher.batched(
        "projects",
        &projects,
        |repo, chunk| repo.lookup_projects(chunk),
        |found| found.into_iter().for_each(|p| graph.merge_project(p)),
    )?;
    fetcher.batched(
        "project handles",
        &projects,
        |repo, chunk| repo.resolve_handles(chunk),
        |found| {
            found
                .into_values()
                .for_each(|h| graph.merge_project(Project::from(h)))
        },
    )?;

    let columns = graph.column_phids();
    fetcher.batched(
        "columns",
        &columns,
        |repo, chunk| repo.resolve_handles(chunk),
        |found| {
            found
                .into_values()
                .for_each(|h| graph.insert_column(Column::from(h)))
        },
    )?;

    let owners = graph.owner_phids();
    fetcher.batched(
        "owners",
        &owners,
        |repo, chunk| repo.lookup_users(chunk),
        |found| found.into_iter().for_each(|u| graph.insert_user(u)),
    )?;

    graph.derive_priorities();
    tracing::info!(
        projects = projects.len(),
        columns = columns.len(),
        owners = owners.len(),
        priorities = graph.priorities().len(),
        "references resolved"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::NoRetry;
    use crate::test_helpers::{FakeRepository, make_handle, make_task, make_user};

    fn project(phid: &str, name: &str) -> Project {
        Project {
            phid: phid.to_string(),
            id: Some(1),
            name: Some(name.to_string()),
            color: Some("blue".to_string()),
            ..Project::default()
        }
    }

    #[test]
    fn test_project_passes_are_merged() {
        let mut repo = FakeRepository::new();
        repo.add_project(project("PHID-PROJ-1", "Infra"));
        let mut handle = make_handle("PHID-PROJ-1", "Infrastructure");
        handle.status = Some("archived".to_string());
        repo.add_handle(handle);

        let mut graph = TaskGraph::new();
        let mut task = make_task(1, "Tagged");
        task.project_phids = vec!["PHID-PROJ-1".to_string()];
        graph.insert_task(task);

        resolve(&Fetcher::new(&repo, &NoRetry), &mut graph).unwrap();

        let resolved = graph.project("PHID-PROJ-1").unwrap();
        assert_eq!(resolved.name.as_deref(), Some("Infra"));
        assert_eq!(resolved.color.as_deref(), Some("blue"));
        assert_eq!(resolved.full_name.as_deref(), Some("Infrastructure"));
        assert_eq!(resolved.status.as_deref(), Some("archived"));
        assert!(resolved.uri.is_some());
    }

    #[test]
    fn test_columns_and_owners_resolve_and_missing_ones_are_skipped() {
        let mut repo = FakeRepository::new();
        repo.add_handle(make_handle("PHID-PCOL-1", "Doing"));
        repo.add_user(make_user("PHID-USER-1", "alice"));

        let mut graph = TaskGraph::new();
        let mut a = make_task(1, "A");
        a.project_phids = vec!["PHID-PROJ-1".to_string()];
        a.columns.insert("PHID-PROJ-1".to_string(), "PHID-PCOL-1".to_string());
        a.owner_phid = Some("PHID-USER-1".to_string());
        let mut b = make_task(2, "B");
        b.owner_phid = Some("PHID-USER-gone".to_string());
        graph.insert_task(a);
        graph.insert_task(b);

        resolve(&Fetcher::new(&repo, &NoRetry), &mut graph).unwrap();

        assert_eq!(graph.column("PHID-PCOL-1").unwrap().name, "Doing");
        assert_eq!(graph.user("PHID-USER-1").unwrap().user_name, "alice");
        assert!(graph.user("PHID-USER-gone").is_none());
        assert_eq!(repo.calls("user.query"), vec![2]);
    }

    #[test]
    fn test_no_references_means_no_requests() {
        let repo = FakeRepository::new();
        let mut graph = TaskGraph::new();
        graph.insert_task(make_task(1, "Bare"));

        resolve(&Fetcher::new(&repo, &NoRetry), &mut graph).unwrap();

        assert_eq!(repo.total_calls(), 0);
        assert_eq!(graph.priorities().len(), 1);
    }

    #[test]
    fn test_owner_lookups_are_batched() {
        let repo = FakeRepository::new();
        let mut graph = TaskGraph::new();
        for id in 1..=120 {
            let mut task = make_task(id, "Owned");
            task.owner_phid = Some(format!("PHID-USER-{}", id));
            graph.insert_task(task);
        }

        resolve(&Fetcher::new(&repo, &NoRetry), &mut graph).unwrap();

        assert_eq!(repo.calls("user.query"), vec![100, 20]);
    }
}
