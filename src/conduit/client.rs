//! Blocking Conduit client
//!
//! Every method is a form-encoded POST to `{host}/api/{method}` carrying
//! the JSON parameters and the API token.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use reqwest::blocking::Client as HttpClient;
use serde_json::{Value, json};

use super::{ConduitError, wire};
use crate::config::Credentials;
use crate::graph::{HandleRecord, Project, Task, Transaction, User};
use crate::repository::{SearchHit, TaskLookup, TaskRepository};

/// Page size requested from `maniphest.search`
const SEARCH_LIMIT: usize = 100;

pub struct ConduitClient {
    http: HttpClient,
    api_base: String,
    token: String,
}

impl ConduitClient {
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self, ConduitError> {
        let http = HttpClient::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(timeout)
            .build()
            .map_err(|e| ConduitError::from_reqwest("client", e))?;

        Ok(Self {
            http,
            api_base: credentials.api_base.clone(),
            token: credentials.token.clone(),
        })
    }

    /// Call a Conduit method and return the unwrapped `result`.
    fn call(&self, method: &str, mut params: Value) -> Result<Value, ConduitError> {
        params["__conduit__"] = json!({ "token": self.token });
        let url = format!("{}{}", self.api_base, method);
        tracing::debug!(method, "conduit request");

        let body = self
            .http
            .post(&url)
            .form(&[
                ("params", params.to_string()),
                ("output", "json".to_string()),
                ("__conduit__", "1".to_string()),
            ])
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::text)
            .map_err(|e| ConduitError::from_reqwest(method, e))?;

        wire::decode(method, &body)
    }

    fn call_decoded<T>(
        &self,
        method: &str,
        params: Value,
        parse: impl FnOnce(Value) -> Result<T, serde_json::Error>,
    ) -> Result<T, ConduitError> {
        let result = self.call(method, params)?;
        parse(result).map_err(|source| ConduitError::Decode {
            method: method.to_string(),
            source,
        })
    }
}

impl TaskRepository for ConduitClient {
    fn search(&self, query_key: &str, after: Option<&str>) -> Result<Vec<SearchHit>, ConduitError> {
        let mut params = json!({
            "queryKey": query_key,
            "limit": SEARCH_LIMIT,
        });
        if let Some(after) = after {
            params["after"] = json!(after);
        }
        self.call_decoded("maniphest.search", params, wire::search_hits)
    }

    fn lookup_tasks(&self, lookup: TaskLookup<'_>) -> Result<BTreeMap<String, Task>, ConduitError> {
        let params = match lookup {
            TaskLookup::Ids(ids) => json!({ "ids": ids }),
            TaskLookup::Phids(phids) => json!({ "phids": phids }),
        };
        self.call_decoded("maniphest.query", params, wire::tasks)
    }

    fn transactions_for(&self, ids: &[u64]) -> Result<BTreeMap<u64, Vec<Transaction>>, ConduitError> {
        self.call_decoded(
            "maniphest.gettasktransactions",
            json!({ "ids": ids }),
            wire::transactions,
        )
    }

    fn resolve_handles(&self, phids: &[String]) -> Result<BTreeMap<String, HandleRecord>, ConduitError> {
        self.call_decoded("phid.query", json!({ "phids": phids }), wire::handles)
    }

    fn lookup_projects(&self, phids: &[String]) -> Result<Vec<Project>, ConduitError> {
        self.call_decoded("project.query", json!({ "phids": phids }), wire::projects)
    }

    fn lookup_users(&self, phids: &[String]) -> Result<Vec<User>, ConduitError> {
        self.call_decoded("user.query", json!({ "phids": phids }), wire::users)
    }

    fn open_statuses(&self) -> Result<BTreeSet<String>, ConduitError> {
        self.call_decoded("maniphest.querystatuses", json!({}), |result| {
            Ok(wire::open_statuses(result))
        })
    }

    fn whoami(&self) -> Result<User, ConduitError> {
        self.call_decoded("user.whoami", json!({}), User::from_value)
    }
}
