use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// A Maniphest task, as returned by `maniphest.query`, plus the fields
/// derived from its transaction log.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Task {
    #[serde(deserialize_with = "de_id")]
    pub id: u64,
    pub phid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "statusName")]
    pub status_name: String,
    #[serde(default, rename = "isClosed")]
    pub is_closed: bool,
    #[serde(default)]
    pub priority: String,
    #[serde(default, rename = "priorityColor")]
    pub priority_color: String,
    #[serde(default, rename = "ownerPHID")]
    pub owner_phid: Option<String>,
    #[serde(default, rename = "projectPHIDs", deserialize_with = "de_phid_list")]
    pub project_phids: Vec<String>,
    #[serde(default, rename = "dependsOnTaskPHIDs", deserialize_with = "de_phid_list")]
    pub depends_on: Vec<String>,
    /// The record exactly as the API returned it, for extra-field paths
    #[serde(skip)]
    pub raw: Value,
    /// Estimate, from the latest `points` transaction
    #[serde(skip)]
    pub points: Option<f64>,
    /// Board (project PHID) -> column PHID, from the latest move on each board
    #[serde(skip)]
    pub columns: BTreeMap<String, String>,
}

impl Task {
    /// Decode a task record, keeping the untouched record in `raw`.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let mut task: Task = serde_json::from_value(value.clone())?;
        task.raw = value;
        Ok(task)
    }

    /// `T123`-style display name
    pub fn monogram(&self) -> String {
        format!("T{}", self.id)
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner_phid.as_deref().filter(|phid| !phid.is_empty())
    }
}

/// Conduit sends numeric ids as strings in older methods and as numbers in newer ones.
fn de_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Num(u64),
        Str(String),
    }
    match Id::deserialize(deserializer)? {
        Id::Num(n) => Ok(n),
        Id::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// PHP serializes empty or sparse lists as objects; accept either shape.
fn de_phid_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(_, v)| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    })
}

/// One move of a task onto a workboard column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMove {
    pub board_phid: String,
    pub column_phid: String,
}

/// The part of a transaction the projection cares about
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Points(Option<f64>),
    Columns(Vec<ColumnMove>),
    Other(String),
}

/// An entry of a task's transaction log
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub created: DateTime<Utc>,
    pub change: Change,
}

/// Generic handle record from `phid.query`
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct HandleRecord {
    pub phid: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "fullName")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// A project (tag), built up from `project.query` and `phid.query`
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Project {
    pub phid: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, rename = "fullName")]
    pub full_name: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn de_opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl Project {
    /// Fold a later, possibly partial, record for the same project into this one.
    pub fn merge(&mut self, other: Project) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.id, other.id);
        take(&mut self.name, other.name);
        take(&mut self.color, other.color);
        take(&mut self.full_name, other.full_name);
        take(&mut self.uri, other.uri);
        take(&mut self.status, other.status);
    }

    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.full_name.as_deref())
            .unwrap_or(&self.phid)
    }
}

impl From<HandleRecord> for Project {
    fn from(handle: HandleRecord) -> Self {
        Project {
            phid: handle.phid,
            full_name: handle.full_name,
            uri: handle.uri,
            status: handle.status,
            ..Project::default()
        }
    }
}

/// A workboard column
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Column {
    pub phid: String,
    pub name: String,
}

impl From<HandleRecord> for Column {
    fn from(handle: HandleRecord) -> Self {
        let name = handle
            .name
            .or(handle.full_name)
            .unwrap_or_else(|| handle.phid.clone());
        Column {
            phid: handle.phid,
            name,
        }
    }
}

/// A user record from `user.query` / `user.whoami`
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct User {
    pub phid: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(skip)]
    pub raw: Value,
}

impl User {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let mut user: User = serde_json::from_value(value.clone())?;
        user.raw = value;
        Ok(user)
    }

    pub fn handle(&self) -> String {
        format!("@{}", self.user_name)
    }
}

/// Everything fetched for one run: the tasks keyed by PHID and the
/// records they reference.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    tasks: BTreeMap<String, Task>,
    projects: BTreeMap<String, Project>,
    columns: BTreeMap<String, Column>,
    users: BTreeMap<String, User>,
    priorities: BTreeMap<String, String>,
    open_statuses: BTreeSet<String>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_task(&mut self, task: Task) {
        self.tasks.insert(task.phid.clone(), task);
    }

    pub fn get_task(&self, phid: &str) -> Option<&Task> {
        self.tasks.get(phid)
    }

    pub fn contains(&self, phid: &str) -> bool {
        self.tasks.contains_key(phid)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn tasks_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.values_mut()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn open_count(&self) -> usize {
        self.tasks().filter(|t| !t.is_closed).count()
    }

    /// PHIDs some fetched task depends on. Self edges are ignored.
    pub fn dependency_targets(&self) -> HashSet<&str> {
        self.tasks()
            .flat_map(|t| {
                t.depends_on
                    .iter()
                    .filter(move |dep| **dep != t.phid)
                    .map(String::as_str)
            })
            .collect()
    }

    /// Dependency PHIDs that are not in the graph (yet).
    pub fn missing_dependencies(&self) -> BTreeSet<String> {
        self.tasks()
            .flat_map(|t| t.depends_on.iter())
            .filter(|phid| !phid.is_empty() && !self.contains(phid))
            .cloned()
            .collect()
    }

    pub fn project_phids(&self) -> Vec<String> {
        distinct(self.tasks().flat_map(|t| t.project_phids.iter()))
    }

    pub fn column_phids(&self) -> Vec<String> {
        distinct(self.tasks().flat_map(|t| t.columns.values()))
    }

    pub fn owner_phids(&self) -> Vec<String> {
        distinct(self.tasks().filter_map(|t| t.owner_phid.as_ref()))
    }

    pub fn merge_project(&mut self, project: Project) {
        match self.projects.get_mut(&project.phid) {
            Some(existing) => existing.merge(project),
            None => {
                self.projects.insert(project.phid.clone(), project);
            }
        }
    }

    pub fn project(&self, phid: &str) -> Option<&Project> {
        self.projects.get(phid)
    }

    pub fn insert_column(&mut self, column: Column) {
        self.columns.insert(column.phid.clone(), column);
    }

    pub fn column(&self, phid: &str) -> Option<&Column> {
        self.columns.get(phid)
    }

    pub fn insert_user(&mut self, user: User) {
        self.users.insert(user.phid.clone(), user);
    }

    pub fn user(&self, phid: &str) -> Option<&User> {
        self.users.get(phid)
    }

    /// Rebuild the priority color -> name table from the fetched tasks.
    pub fn derive_priorities(&mut self) {
        self.priorities = self
            .tasks
            .values()
            .filter(|t| !t.priority_color.is_empty())
            .map(|t| (t.priority_color.clone(), t.priority.clone()))
            .collect();
    }

    pub fn priorities(&self) -> &BTreeMap<String, String> {
        &self.priorities
    }

    pub fn set_open_statuses(&mut self, statuses: BTreeSet<String>) {
        self.open_statuses = statuses;
    }

    pub fn open_statuses(&self) -> &BTreeSet<String> {
        &self.open_statuses
    }
}

fn distinct<'a>(ids: impl Iterator<Item = &'a String>) -> Vec<String> {
    ids.filter(|id| !id.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{make_task, task_phid};
    use serde_json::json;

    #[test]
    fn test_task_graph_new_is_empty() {
        let graph = TaskGraph::new();
        assert!(graph.is_empty());
        assert_eq!(graph.len(), 0);
    }

    #[test]
    fn test_task_from_query_record() {
        let record = json!({
            "id": "42",
            "phid": "PHID-TASK-aaa",
            "title": "Fix the frobnicator",
            "uri": "https://phab.example.com/T42",
            "status": "open",
            "statusName": "Open",
            "isClosed": false,
            "priority": "High",
            "priorityColor": "red",
            "ownerPHID": null,
            "projectPHIDs": ["PHID-PROJ-1"],
            "dependsOnTaskPHIDs": ["PHID-TASK-bbb"],
            "auxiliary": {"std:maniphest:team": "core"}
        });
        let task = Task::from_value(record.clone()).unwrap();
        assert_eq!(task.id, 42);
        assert_eq!(task.monogram(), "T42");
        assert_eq!(task.priority_color, "red");
        assert_eq!(task.owner(), None);
        assert_eq!(task.project_phids, vec!["PHID-PROJ-1"]);
        assert_eq!(task.depends_on, vec!["PHID-TASK-bbb"]);
        assert_eq!(task.raw, record);
        assert_eq!(task.points, None);
        assert!(task.columns.is_empty());
    }

    #[test]
    fn test_task_accepts_numeric_id_and_object_lists() {
        let record = json!({
            "id": 7,
            "phid": "PHID-TASK-7",
            "projectPHIDs": {},
            "dependsOnTaskPHIDs": {"1": "PHID-TASK-1"}
        });
        let task = Task::from_value(record).unwrap();
        assert_eq!(task.id, 7);
        assert!(task.project_phids.is_empty());
        assert_eq!(task.depends_on, vec!["PHID-TASK-1"]);
    }

    #[test]
    fn test_project_merge_extends_partial_record() {
        let mut project = Project {
            phid: "PHID-PROJ-1".to_string(),
            id: Some(3),
            name: Some("Infra".to_string()),
            color: Some("blue".to_string()),
            ..Project::default()
        };
        project.merge(Project::from(HandleRecord {
            phid: "PHID-PROJ-1".to_string(),
            uri: Some("https://phab.example.com/tag/infra/".to_string()),
            full_name: Some("Infrastructure".to_string()),
            status: Some("open".to_string()),
            ..HandleRecord::default()
        }));
        assert_eq!(project.id, Some(3));
        assert_eq!(project.name.as_deref(), Some("Infra"));
        assert_eq!(project.color.as_deref(), Some("blue"));
        assert_eq!(project.full_name.as_deref(), Some("Infrastructure"));
        assert_eq!(project.status.as_deref(), Some("open"));
        assert_eq!(project.display_name(), "Infra");
    }

    #[test]
    fn test_unused_record_fields_stay_in_the_raw_record() {
        let handle: HandleRecord = serde_json::from_value(json!({
            "phid": "PHID-PCOL-1",
            "name": "Doing",
            "typeName": "Workboard Column",
            "uri": "https://phab.example.com/project/board/1/"
        }))
        .unwrap();
        assert_eq!(
            Column::from(handle),
            Column {
                phid: "PHID-PCOL-1".to_string(),
                name: "Doing".to_string(),
            }
        );

        let user = User::from_value(json!({
            "phid": "PHID-USER-1",
            "userName": "alice",
            "realName": "Alice A."
        }))
        .unwrap();
        assert_eq!(user.handle(), "@alice");
        assert_eq!(user.raw["realName"], "Alice A.");
    }

    #[test]
    fn test_missing_dependencies_skips_known_tasks() {
        let mut graph = TaskGraph::new();
        let mut five = make_task(5, "Five");
        five.depends_on = vec![task_phid(3), task_phid(9)];
        graph.insert_task(five);
        graph.insert_task(make_task(3, "Three"));

        let missing: Vec<_> = graph.missing_dependencies().into_iter().collect();
        assert_eq!(missing, vec![task_phid(9)]);
    }

    #[test]
    fn test_dependency_targets_ignore_self_edges() {
        let mut graph = TaskGraph::new();
        let mut task = make_task(1, "Loop");
        task.depends_on = vec![task_phid(1), task_phid(2)];
        graph.insert_task(task);

        let targets = graph.dependency_targets();
        assert!(!targets.contains(task_phid(1).as_str()));
        assert!(targets.contains(task_phid(2).as_str()));
    }

    #[test]
    fn test_derive_priorities_maps_color_to_name() {
        let mut graph = TaskGraph::new();
        let mut high = make_task(1, "High");
        high.priority = "High".to_string();
        high.priority_color = "red".to_string();
        graph.insert_task(high);
        graph.insert_task(make_task(2, "Normal"));
        graph.derive_priorities();

        assert_eq!(graph.priorities().get("red").map(String::as_str), Some("High"));
        assert_eq!(
            graph.priorities().get("orange").map(String::as_str),
            Some("Normal")
        );
    }

    #[test]
    fn test_reference_id_sets_are_distinct_and_non_empty() {
        let mut graph = TaskGraph::new();
        let mut a = make_task(1, "A");
        a.project_phids = vec!["PHID-PROJ-1".to_string(), String::new()];
        a.owner_phid = Some("PHID-USER-1".to_string());
        let mut b = make_task(2, "B");
        b.project_phids = vec!["PHID-PROJ-1".to_string(), "PHID-PROJ-2".to_string()];
        b.owner_phid = Some("PHID-USER-1".to_string());
        graph.insert_task(a);
        graph.insert_task(b);

        assert_eq!(graph.project_phids(), vec!["PHID-PROJ-1", "PHID-PROJ-2"]);
        assert_eq!(graph.owner_phids(), vec!["PHID-USER-1"]);
    }
}
