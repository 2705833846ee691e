//! Fetching a saved query's tasks together with the tasks they depend on.

use std::collections::BTreeSet;

use crate::conduit::ConduitError;
use crate::graph::TaskGraph;
use crate::pagination::Fetcher;
use crate::repository::TaskLookup;

/// How far to follow dependency edges past the query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClosureMode {
    /// Fetch the direct dependencies of the query results, once.
    #[default]
    Immediate,
    /// Keep fetching dependencies of dependencies until nothing new turns up.
    Transitive,
}

/// Run the saved query `query_key` and fill `graph` with its tasks and
/// their dependencies.
pub fn resolve(
    fetcher: &Fetcher<'_>,
    graph: &mut TaskGraph,
    query_key: &str,
    mode: ClosureMode,
) -> Result<(), ConduitError> {
    let hits = fetcher.fetch_all("search", |repo, after| repo.search(query_key, after))?;
    let ids: Vec<u64> = hits.keys().copied().collect();
    fetcher.batched(
        "query results",
        &ids,
        |repo, chunk| repo.lookup_tasks(TaskLookup::Ids(chunk)),
        |found| found.into_values().for_each(|t| graph.insert_task(t)),
    )?;
    tracing::info!(query = query_key, hits = ids.len(), tasks = graph.len(), "query fetched");

    expand(fetcher, graph, mode)?;
    Ok(())
}

/// Fetch dependencies missing from `graph`. Returns how many tasks were added.
///
/// Each PHID is requested at most once, so ids that resolve to nothing
/// cannot keep the transitive mode from reaching its fixpoint.
pub fn expand(
    fetcher: &Fetcher<'_>,
    graph: &mut TaskGraph,
    mode: ClosureMode,
) -> Result<usize, ConduitError> {
    let start = graph.len();
    let mut requested: BTreeSet<String> = BTreeSet::new();
    let mut pass = 0;

    loop {
        let missing: Vec<String> = graph
            .missing_dependencies()
            .into_iter()
            .filter(|phid| !requested.contains(phid))
            .collect();
        if missing.is_empty() {
            break;
        }

        pass += 1;
        requested.extend(missing.iter().cloned());
        let before = graph.len();
        fetcher.batched(
            "dependencies",
            &missing,
            |repo, chunk| repo.lookup_tasks(TaskLookup::Phids(chunk)),
            |found| found.into_values().for_each(|t| graph.insert_task(t)),
        )?;
        let resolved = graph.len() - before;
        tracing::info!(pass, requested = missing.len(), resolved, "dependencies fetched");
        if resolved < missing.len() {
            tracing::debug!(
                dangling = missing.len() - resolved,
                "some dependencies did not resolve"
            );
        }

        if mode == ClosureMode::Immediate {
            break;
        }
    }

    Ok(graph.len() - start)
}
