//! Conduit, Phabricator's HTTP API
//!
//! `client` talks to a live install, `wire` decodes the response shapes
//! into the domain types in [`crate::graph`].

pub mod client;
pub mod wire;

pub use client::ConduitClient;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConduitError {
    #[error("{method}: request timed out")]
    Timeout { method: String },
    #[error("{method}: HTTP error: {source}")]
    Http {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{method}: {code}: {info}")]
    Api {
        method: String,
        code: String,
        info: String,
    },
    #[error("{method}: unexpected response: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ConduitError {
    pub fn from_reqwest(method: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ConduitError::Timeout {
                method: method.to_string(),
            }
        } else {
            ConduitError::Http {
                method: method.to_string(),
                source,
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ConduitError::Timeout { .. })
    }

    pub fn method(&self) -> &str {
        match self {
            ConduitError::Timeout { method }
            | ConduitError::Http { method, .. }
            | ConduitError::Api { method, .. }
            | ConduitError::Decode { method, .. } => method,
        }
    }
}
