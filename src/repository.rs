//! The remote operations the pipeline needs, independent of transport.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::conduit::ConduitError;
use crate::graph::{HandleRecord, Project, Task, Transaction, User};

/// One result of a saved-query search
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    pub id: u64,
    pub phid: String,
}

/// How to address tasks in a direct lookup
#[derive(Debug, Clone, Copy)]
pub enum TaskLookup<'a> {
    Ids(&'a [u64]),
    Phids(&'a [String]),
}

impl TaskLookup<'_> {
    pub fn len(&self) -> usize {
        match self {
            TaskLookup::Ids(ids) => ids.len(),
            TaskLookup::Phids(phids) => phids.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Read-only access to a task tracker.
///
/// Every call is a single blocking request. Lookups return only the
/// records that exist, so a response may be shorter than its request.
pub trait TaskRepository {
    /// One page of a saved query, starting after the hit whose id is `after`.
    fn search(&self, query_key: &str, after: Option<&str>) -> Result<Vec<SearchHit>, ConduitError>;

    /// Tasks by id or PHID, keyed by PHID.
    fn lookup_tasks(&self, lookup: TaskLookup<'_>) -> Result<BTreeMap<String, Task>, ConduitError>;

    /// Transaction logs keyed by numeric task id.
    fn transactions_for(&self, ids: &[u64]) -> Result<BTreeMap<u64, Vec<Transaction>>, ConduitError>;

    /// Generic handle lookup, used for project and column names.
    fn resolve_handles(&self, phids: &[String]) -> Result<BTreeMap<String, HandleRecord>, ConduitError>;

    fn lookup_projects(&self, phids: &[String]) -> Result<Vec<Project>, ConduitError>;

    fn lookup_users(&self, phids: &[String]) -> Result<Vec<User>, ConduitError>;

    /// Status codes the tracker treats as open.
    fn open_statuses(&self) -> Result<BTreeSet<String>, ConduitError>;

    /// The authenticated user; used to check credentials before fetching.
    fn whoami(&self) -> Result<User, ConduitError>;
}
