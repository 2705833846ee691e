//! In-memory tracker and record builders for tests.

use chrono::DateTime;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use crate::conduit::ConduitError;
use crate::graph::{Change, ColumnMove, HandleRecord, Project, Task, Transaction, User};
use crate::repository::{SearchHit, TaskLookup, TaskRepository};

pub fn task_phid(id: u64) -> String {
    format!("PHID-TASK-{}", id)
}

/// Create an open, normal-priority task with the given id and title.
pub fn make_task(id: u64, title: &str) -> Task {
    let mut task = Task {
        id,
        phid: task_phid(id),
        title: title.to_string(),
        uri: format!("https://phab.example.com/T{}", id),
        status: "open".to_string(),
        status_name: "Open".to_string(),
        is_closed: false,
        priority: "Normal".to_string(),
        priority_color: "orange".to_string(),
        ..Task::default()
    };
    task.raw = raw_record(&task);
    task
}

/// Create a task depending on the given task ids.
pub fn make_task_with_deps(id: u64, title: &str, deps: &[u64]) -> Task {
    let mut task = make_task(id, title);
    task.depends_on = deps.iter().map(|d| task_phid(*d)).collect();
    task.raw = raw_record(&task);
    task
}

/// The `maniphest.query` record a task would have been decoded from.
pub fn raw_record(task: &Task) -> Value {
    json!({
        "id": task.id.to_string(),
        "phid": task.phid,
        "title": task.title,
        "uri": task.uri,
        "status": task.status,
        "statusName": task.status_name,
        "isClosed": task.is_closed,
        "priority": task.priority,
        "priorityColor": task.priority_color,
        "ownerPHID": task.owner_phid,
        "projectPHIDs": task.project_phids,
        "dependsOnTaskPHIDs": task.depends_on,
    })
}

fn at(secs: i64) -> DateTime<chrono::Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

pub fn points_txn(secs: i64, points: Option<f64>) -> Transaction {
    Transaction {
        created: at(secs),
        change: Change::Points(points),
    }
}

pub fn column_txn(secs: i64, board: &str, column: &str) -> Transaction {
    Transaction {
        created: at(secs),
        change: Change::Columns(vec![ColumnMove {
            board_phid: board.to_string(),
            column_phid: column.to_string(),
        }]),
    }
}

pub fn make_user(phid: &str, user_name: &str) -> User {
    let raw = json!({ "phid": phid, "userName": user_name, "realName": user_name.to_uppercase() });
    User {
        phid: phid.to_string(),
        user_name: user_name.to_string(),
        raw,
    }
}

pub fn make_handle(phid: &str, name: &str) -> HandleRecord {
    HandleRecord {
        phid: phid.to_string(),
        uri: Some(format!("https://phab.example.com/{}", phid)),
        name: Some(name.to_string()),
        full_name: Some(name.to_string()),
        status: Some("open".to_string()),
    }
}

/// A tracker held in memory. Records every request (method and batch
/// size) and can be scripted to time out or fail.
#[derive(Default)]
pub struct FakeRepository {
    tasks: BTreeMap<String, Task>,
    queries: BTreeMap<String, Vec<u64>>,
    page_size: Option<usize>,
    transactions: BTreeMap<u64, Vec<Transaction>>,
    handles: BTreeMap<String, HandleRecord>,
    projects: BTreeMap<String, Project>,
    users: BTreeMap<String, User>,
    open_statuses: BTreeSet<String>,
    timeouts: RefCell<BTreeMap<String, u32>>,
    failures: RefCell<BTreeSet<String>>,
    calls: RefCell<Vec<(String, usize)>>,
    cursors: RefCell<Vec<Option<String>>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self {
            open_statuses: ["open".to_string()].into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn add_task(&mut self, task: Task) {
        self.tasks.insert(task.phid.clone(), task);
    }

    /// Define a saved query; hits are served newest (highest id) first.
    pub fn set_query(&mut self, key: &str, ids: impl IntoIterator<Item = u64>) {
        let mut ids: Vec<u64> = ids.into_iter().collect();
        ids.sort_unstable_by(|a, b| b.cmp(a));
        self.queries.insert(key.to_string(), ids);
    }

    pub fn set_page_size(&mut self, size: usize) {
        self.page_size = Some(size);
    }

    pub fn add_transactions(&mut self, id: u64, log: Vec<Transaction>) {
        self.transactions.entry(id).or_default().extend(log);
    }

    pub fn add_handle(&mut self, handle: HandleRecord) {
        self.handles.insert(handle.phid.clone(), handle);
    }

    pub fn add_project(&mut self, project: Project) {
        self.projects.insert(project.phid.clone(), project);
    }

    pub fn add_user(&mut self, user: User) {
        self.users.insert(user.phid.clone(), user);
    }

    pub fn set_open_statuses(&mut self, statuses: &[&str]) {
        self.open_statuses = statuses.iter().map(|s| s.to_string()).collect();
    }

    /// Make the next `count` calls of `method` time out.
    pub fn time_out(&self, method: &str, count: u32) {
        self.timeouts.borrow_mut().insert(method.to_string(), count);
    }

    /// Make every call of `method` fail with an API error.
    pub fn fail(&self, method: &str) {
        self.failures.borrow_mut().insert(method.to_string());
    }

    /// Batch sizes of the calls made to `method`, in order.
    pub fn calls(&self, method: &str) -> Vec<usize> {
        self.calls
            .borrow()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, size)| *size)
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.borrow().len()
    }

    /// The `after` cursor of every search call, in order.
    pub fn search_cursors(&self) -> Vec<Option<String>> {
        self.cursors.borrow().clone()
    }

    fn record(&self, method: &str, size: usize) -> Result<(), ConduitError> {
        self.calls.borrow_mut().push((method.to_string(), size));

        if let Some(remaining) = self.timeouts.borrow_mut().get_mut(method)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(ConduitError::Timeout {
                method: method.to_string(),
            });
        }
        if self.failures.borrow().contains(method) {
            return Err(ConduitError::Api {
                method: method.to_string(),
                code: "ERR-CONDUIT-CORE".to_string(),
                info: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

impl TaskRepository for FakeRepository {
    fn search(&self, query_key: &str, after: Option<&str>) -> Result<Vec<SearchHit>, ConduitError> {
        self.record("maniphest.search", 1)?;
        self.cursors.borrow_mut().push(after.map(str::to_string));

        let Some(ids) = self.queries.get(query_key) else {
            return Err(ConduitError::Api {
                method: "maniphest.search".to_string(),
                code: "ERR-CONDUIT-CORE".to_string(),
                info: format!("unknown query \"{}\"", query_key),
            });
        };
        let after: Option<u64> = after.and_then(|a| a.parse().ok());
        Ok(ids
            .iter()
            .filter(|id| after.is_none_or(|a| **id < a))
            .take(self.page_size.unwrap_or(100))
            .map(|id| SearchHit {
                id: *id,
                phid: task_phid(*id),
            })
            .collect())
    }

    fn lookup_tasks(&self, lookup: TaskLookup<'_>) -> Result<BTreeMap<String, Task>, ConduitError> {
        self.record("maniphest.query", lookup.len())?;
        let found = match lookup {
            TaskLookup::Ids(ids) => self
                .tasks
                .values()
                .filter(|t| ids.contains(&t.id))
                .cloned()
                .collect::<Vec<_>>(),
            TaskLookup::Phids(phids) => phids
                .iter()
                .filter_map(|p| self.tasks.get(p))
                .cloned()
                .collect(),
        };
        Ok(found.into_iter().map(|t| (t.phid.clone(), t)).collect())
    }

    fn transactions_for(&self, ids: &[u64]) -> Result<BTreeMap<u64, Vec<Transaction>>, ConduitError> {
        self.record("maniphest.gettasktransactions", ids.len())?;
        Ok(ids
            .iter()
            .map(|id| (*id, self.transactions.get(id).cloned().unwrap_or_default()))
            .collect())
    }

    fn resolve_handles(&self, phids: &[String]) -> Result<BTreeMap<String, HandleRecord>, ConduitError> {
        self.record("phid.query", phids.len())?;
        Ok(phids
            .iter()
            .filter_map(|p| self.handles.get(p))
            .map(|h| (h.phid.clone(), h.clone()))
            .collect())
    }

    fn lookup_projects(&self, phids: &[String]) -> Result<Vec<Project>, ConduitError> {
        self.record("project.query", phids.len())?;
        Ok(phids.iter().filter_map(|p| self.projects.get(p)).cloned().collect())
    }

    fn lookup_users(&self, phids: &[String]) -> Result<Vec<User>, ConduitError> {
        self.record("user.query", phids.len())?;
        Ok(phids.iter().filter_map(|p| self.users.get(p)).cloned().collect())
    }

    fn open_statuses(&self) -> Result<BTreeSet<String>, ConduitError> {
        self.record("maniphest.querystatuses", 0)?;
        Ok(self.open_statuses.clone())
    }

    fn whoami(&self) -> Result<User, ConduitError> {
        self.record("user.whoami", 0)?;
        Ok(make_user("PHID-USER-me", "me"))
    }
}
