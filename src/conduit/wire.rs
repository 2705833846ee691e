use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::ConduitError;
use crate::graph::{Change, ColumnMove, HandleRecord, Project, Task, Transaction, User};
use crate::repository::SearchHit;

/// Every Conduit response is wrapped in this envelope
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_info: Option<String>,
}

/// Unwrap the envelope of a response body, surfacing API errors.
pub fn decode(method: &str, body: &str) -> Result<Value, ConduitError> {
    let envelope: Envelope = serde_json::from_str(body).map_err(|source| ConduitError::Decode {
        method: method.to_string(),
        source,
    })?;
    if let Some(code) = envelope.error_code {
        return Err(ConduitError::Api {
            method: method.to_string(),
            code,
            info: envelope.error_info.unwrap_or_default(),
        });
    }
    Ok(envelope.result)
}

/// PHP encodes an empty dictionary as `[]`; treat both shapes as key/value pairs.
fn entries(value: Value) -> Vec<(String, Value)> {
    match value {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    data: Vec<SearchHit>,
}

/// `maniphest.search`
pub fn search_hits(result: Value) -> Result<Vec<SearchHit>, serde_json::Error> {
    let result: SearchResult = serde_json::from_value(result)?;
    Ok(result.data)
}

/// `maniphest.query`: a dictionary keyed by task PHID
pub fn tasks(result: Value) -> Result<BTreeMap<String, Task>, serde_json::Error> {
    entries(result)
        .into_iter()
        .map(|(_, record)| Task::from_value(record).map(|t| (t.phid.clone(), t)))
        .collect()
}

#[derive(Debug, Deserialize)]
struct TransactionRecord {
    #[serde(rename = "transactionType", default)]
    transaction_type: String,
    #[serde(rename = "newValue", default)]
    new_value: Value,
    #[serde(rename = "dateCreated", default)]
    date_created: Value,
}

/// `maniphest.gettasktransactions`: a dictionary keyed by the numeric
/// task id (as a string), each holding that task's log.
pub fn transactions(
    result: Value,
) -> Result<BTreeMap<u64, Vec<Transaction>>, serde_json::Error> {
    let mut logs = BTreeMap::new();
    for (key, records) in entries(result) {
        let Ok(id) = key.trim().parse::<u64>() else {
            tracing::warn!("ignoring transactions for unparseable task id {key:?}");
            continue;
        };
        let records: Vec<TransactionRecord> = match records {
            Value::Null => Vec::new(),
            Value::Object(_) => entries(records)
                .into_iter()
                .map(|(_, r)| serde_json::from_value(r))
                .collect::<Result<_, _>>()?,
            other => serde_json::from_value(other)?,
        };
        let log: Vec<Transaction> = records.into_iter().filter_map(transaction).collect();
        logs.insert(id, log);
    }
    Ok(logs)
}

fn transaction(record: TransactionRecord) -> Option<Transaction> {
    let created = timestamp(&record.date_created)?;
    let change = match record.transaction_type.as_str() {
        "points" => Change::Points(number(&record.new_value)),
        "core:columns" => Change::Columns(column_moves(&record.new_value)),
        "projectcolumn" => Change::Columns(legacy_column_move(&record.new_value)),
        other => Change::Other(other.to_string()),
    };
    Some(Transaction { created, change })
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let secs = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    DateTime::from_timestamp(secs, 0)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn column_moves(value: &Value) -> Vec<ColumnMove> {
    let Value::Array(moves) = value else {
        return Vec::new();
    };
    moves
        .iter()
        .filter_map(|m| {
            Some(ColumnMove {
                board_phid: m.get("boardPHID")?.as_str()?.to_string(),
                column_phid: m.get("columnPHID")?.as_str()?.to_string(),
            })
        })
        .collect()
}

fn legacy_column_move(value: &Value) -> Vec<ColumnMove> {
    let Some(board) = value.get("projectPHID").and_then(Value::as_str) else {
        return Vec::new();
    };
    let column = match value.get("columnPHIDs") {
        Some(Value::Array(columns)) => columns.iter().find_map(Value::as_str),
        Some(Value::Object(columns)) => columns.values().find_map(Value::as_str),
        _ => None,
    };
    column
        .map(|column| ColumnMove {
            board_phid: board.to_string(),
            column_phid: column.to_string(),
        })
        .into_iter()
        .collect()
}

/// `phid.query`: a dictionary keyed by PHID
pub fn handles(result: Value) -> Result<BTreeMap<String, HandleRecord>, serde_json::Error> {
    entries(result)
        .into_iter()
        .map(|(_, record)| {
            serde_json::from_value::<HandleRecord>(record).map(|h| (h.phid.clone(), h))
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ProjectQueryResult {
    #[serde(default)]
    data: Value,
}

/// `project.query`
pub fn projects(result: Value) -> Result<Vec<Project>, serde_json::Error> {
    let result: ProjectQueryResult = serde_json::from_value(result)?;
    entries(result.data)
        .into_iter()
        .map(|(_, record)| serde_json::from_value(record))
        .collect()
}

/// `user.query`
pub fn users(result: Value) -> Result<Vec<User>, serde_json::Error> {
    entries(result)
        .into_iter()
        .map(|(_, record)| User::from_value(record))
        .collect()
}

/// `maniphest.querystatuses`
pub fn open_statuses(result: Value) -> BTreeSet<String> {
    let open = result.get("openStatuses").cloned().unwrap_or(Value::Null);
    entries(open)
        .into_iter()
        .filter_map(|(_, v)| v.as_str().map(str::to_string))
        .collect()
}
