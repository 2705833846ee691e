//! The fetch stages in the order they run, each filling in its part of
//! one [`TaskGraph`].

use crate::closure::{self, ClosureMode};
use crate::conduit::ConduitError;
use crate::graph::TaskGraph;
use crate::pagination::{BATCH_SIZE, Fetcher};
use crate::references;
use crate::repository::TaskRepository;
use crate::retry::RetryPolicy;
use crate::transactions;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub query_key: String,
    pub mode: ClosureMode,
    pub batch_size: usize,
}

impl PipelineOptions {
    pub fn new(query_key: impl Into<String>) -> Self {
        Self {
            query_key: query_key.into(),
            mode: ClosureMode::default(),
            batch_size: BATCH_SIZE,
        }
    }
}

/// Fetch everything needed to render `options.query_key`.
pub fn assemble(
    repo: &dyn TaskRepository,
    retry: &dyn RetryPolicy,
    options: &PipelineOptions,
) -> Result<TaskGraph, ConduitError> {
    let fetcher = Fetcher::new(repo, retry).with_batch_size(options.batch_size);
    let mut graph = TaskGraph::new();

    let statuses = fetcher.call(|repo| repo.open_statuses())?;
    graph.set_open_statuses(statuses);

    closure::resolve(&fetcher, &mut graph, &options.query_key, options.mode)?;
    transactions::project(&fetcher, &mut graph)?;
    references::resolve(&fetcher, &mut graph)?;

    tracing::info!(
        tasks = graph.len(),
        open = graph.open_count(),
        "task graph assembled"
    );
    Ok(graph)
}
