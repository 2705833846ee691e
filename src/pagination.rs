//! Paged and batched access to a [`TaskRepository`].

use std::collections::BTreeMap;

use crate::conduit::ConduitError;
use crate::repository::{SearchHit, TaskRepository};
use crate::retry::{RetryPolicy, with_retry};

/// Ids per lookup request
pub const BATCH_SIZE: usize = 100;

/// An item of a cursor-paginated listing
pub trait Paginated {
    type Key: Ord;

    fn key(&self) -> Self::Key;

    /// Cursor that continues the listing after this item
    fn cursor(&self) -> String;
}

impl Paginated for SearchHit {
    type Key = u64;

    fn key(&self) -> u64 {
        self.id
    }

    fn cursor(&self) -> String {
        self.id.to_string()
    }
}

/// A repository together with the retry policy and batch size every
/// request of a run goes through.
pub struct Fetcher<'a> {
    repo: &'a dyn TaskRepository,
    retry: &'a dyn RetryPolicy,
    batch_size: usize,
}

impl<'a> Fetcher<'a> {
    pub fn new(repo: &'a dyn TaskRepository, retry: &'a dyn RetryPolicy) -> Self {
        Self {
            repo,
            retry,
            batch_size: BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// A single request, retried according to the policy.
    pub fn call<T>(
        &self,
        mut op: impl FnMut(&dyn TaskRepository) -> Result<T, ConduitError>,
    ) -> Result<T, ConduitError> {
        with_retry(self.retry, || op(self.repo))
    }

    /// Request pages until one comes back empty, continuing each time
    /// after the last item of the previous page.
    pub fn fetch_all<T: Paginated>(
        &self,
        what: &str,
        mut page: impl FnMut(&dyn TaskRepository, Option<&str>) -> Result<Vec<T>, ConduitError>,
    ) -> Result<BTreeMap<T::Key, T>, ConduitError> {
        let mut items = BTreeMap::new();
        let mut cursor: Option<String> = None;

        loop {
            let batch = self.call(|repo| page(repo, cursor.as_deref()))?;
            let Some(last) = batch.last() else {
                break;
            };
            cursor = Some(last.cursor());

            let delta = batch.len();
            for item in batch {
                items.insert(item.key(), item);
            }
            tracing::info!(fetched = items.len(), delta, "{what}: page received");
        }

        Ok(items)
    }

    /// Issue `op` once per chunk of `ids`, handing each response to `merge`.
    /// Returns the number of requests made.
    pub fn batched<I, T>(
        &self,
        what: &str,
        ids: &[I],
        mut op: impl FnMut(&dyn TaskRepository, &[I]) -> Result<T, ConduitError>,
        mut merge: impl FnMut(T),
    ) -> Result<usize, ConduitError> {
        let mut requests = 0;
        for chunk in ids.chunks(self.batch_size) {
            let response = self.call(|repo| op(repo, chunk))?;
            merge(response);
            requests += 1;
            tracing::debug!(
                batch = requests,
                size = chunk.len(),
                total = ids.len(),
                "{what}: batch done"
            );
        }
        Ok(requests)
    }
}
