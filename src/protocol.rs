//! HTTP API message types.
//!
//! Request bodies derive `Deserialize`, responses derive `Serialize`. Field
//! names are the wire names used by the dashboard.

use serde::{Deserialize, Serialize};

use crate::process::{Instance, Snapshot};

/// `GET /api/instances`
#[derive(Debug, Serialize, Deserialize)]
pub struct InstancesResponse {
    pub instances: Vec<Instance>,
    pub count: usize,
    pub last_updated: String,
}

impl From<&Snapshot> for InstancesResponse {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            instances: snapshot.instances.clone(),
            count: snapshot.instances.len(),
            last_updated: snapshot.last_updated(),
        }
    }
}

/// Body of `POST /api/start` and `POST /api/shell`.
///
/// A missing `name` decodes as empty and fails the config lookup.
#[derive(Debug, Deserialize)]
pub struct NameRequest {
    #[serde(default)]
    pub name: String,
}

/// Body of `POST /api/stop`.
#[derive(Debug, Deserialize)]
pub struct StopRequest {
    #[serde(default)]
    pub pid: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: &'static str,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub status: &'static str,
    pub pid: String,
}

/// Failure body. Sent with HTTP 200.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl ToString) -> Self {
        Self {
            error: error.to_string(),
        }
    }

    pub fn invalid_request() -> Self {
        Self::new("Invalid request")
    }
}
