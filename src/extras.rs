//! User-defined output columns read from a task's raw record.
//!
//! A field is written `Name:path.to.value`. The path is followed through
//! the record one segment at a time: object keys by name, array elements
//! by index. Anything that does not resolve yields `None` rather than an
//! error.

use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::graph::{Task, TaskGraph};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtraFieldError {
    #[error("invalid extra field '{0}': expected 'Field Name:dot.separated.path'")]
    MissingSeparator(String),
    #[error("invalid extra field '{0}': the field name is empty")]
    EmptyName(String),
    #[error("invalid extra field '{0}': the path is empty or has an empty segment")]
    EmptyPath(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraField {
    pub name: String,
    pub path: Vec<String>,
}

impl FromStr for ExtraField {
    type Err = ExtraFieldError;

    // The name ends at the first ':'; custom field keys such as
    // `std:maniphest:team` keep their colons in the path.
    fn from_str(arg: &str) -> Result<Self, Self::Err> {
        let (name, path) = arg
            .split_once(':')
            .ok_or_else(|| ExtraFieldError::MissingSeparator(arg.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ExtraFieldError::EmptyName(arg.to_string()));
        }
        let path: Vec<String> = path.trim().split('.').map(str::to_string).collect();
        if path.iter().any(String::is_empty) {
            return Err(ExtraFieldError::EmptyPath(arg.to_string()));
        }
        Ok(ExtraField {
            name: name.to_string(),
            path,
        })
    }
}

impl fmt::Display for ExtraField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.path.join("."))
    }
}

impl ExtraField {
    /// The value at this field's path in `record`, as display text.
    pub fn extract(&self, record: &Value) -> Option<String> {
        lookup(record, &self.path).and_then(display)
    }
}

/// Follow `path` into `value`.
pub fn lookup<'v>(value: &'v Value, path: &[String]) -> Option<&'v Value> {
    path.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn display(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// The record extra-field paths are evaluated against: the task as the
/// API returned it, with the resolved owner and the derived fields added.
pub fn task_record(task: &Task, graph: &TaskGraph) -> Value {
    let mut record = match &task.raw {
        Value::Object(map) => map.clone(),
        _ => Map::new(),
    };
    if let Some(owner) = task.owner().and_then(|phid| graph.user(phid)) {
        record.insert("owner".to_string(), owner.raw.clone());
    }
    record.insert("points".to_string(), points_value(task.points));
    record.insert("columns".to_string(), json!(task.columns));
    Value::Object(record)
}

/// Whole estimates become integers, as in the Points column.
fn points_value(points: Option<f64>) -> Value {
    match points {
        Some(p) if p.fract() == 0.0 && p.abs() < 1e15 => json!(p as i64),
        Some(p) => json!(p),
        None => Value::Null,
    }
}
