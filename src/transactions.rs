//! Deriving points and workboard columns from task transaction logs.

use std::collections::BTreeMap;

use crate::conduit::ConduitError;
use crate::graph::{Change, Task, TaskGraph, Transaction};
use crate::pagination::Fetcher;

/// Fetch the transaction log of every task in `graph` and replay it
/// onto the task.
pub fn project(fetcher: &Fetcher<'_>, graph: &mut TaskGraph) -> Result<(), ConduitError> {
    let ids: Vec<u64> = graph.tasks().map(|t| t.id).collect();
    let mut logs: BTreeMap<u64, Vec<Transaction>> = BTreeMap::new();
    fetcher.batched(
        "transactions",
        &ids,
        |repo, chunk| repo.transactions_for(chunk),
        |batch| logs.extend(batch),
    )?;

    let mut with_points = 0;
    for task in graph.tasks_mut() {
        let log = logs.remove(&task.id).unwrap_or_default();
        replay(task, log);
        if task.points.is_some() {
            with_points += 1;
        }
    }
    tracing::info!(tasks = ids.len(), with_points, "transactions replayed");
    Ok(())
}

/// Replace the derived fields of `task` with the latest values in `log`.
///
/// The log is ordered by creation time first; entries with equal
/// timestamps keep their relative order.
pub fn replay(task: &mut Task, mut log: Vec<Transaction>) {
    log.sort_by_key(|txn| txn.created);

    task.points = None;
    task.columns.clear();
    for txn in log {
        match txn.change {
            Change::Points(points) => task.points = points,
            Change::Columns(moves) => {
                for m in moves {
                    task.columns.insert(m.board_phid, m.column_phid);
                }
            }
            Change::Other(_) => {}
        }
    }

    let projects = &task.project_phids;
    task.columns.retain(|board, _| projects.contains(board));
}
