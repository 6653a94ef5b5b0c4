use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::QueryServiceError;

/// Opaque execution id issued by the engine for one submitted query.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryExecutionHandle(pub String);

impl fmt::Display for QueryExecutionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuerySubmission {
    pub query_text: String,
    pub database: String,
    pub output_location: String,
    pub workgroup: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl QueryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for QueryState {
    type Err = QueryServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(Self::Queued),
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(QueryServiceError::Decode(format!("unknown query state `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryStatus {
    pub state: QueryState,
    pub reason: Option<String>,
}

impl QueryStatus {
    pub fn new(state: QueryState) -> Self {
        Self { state, reason: None }
    }

    pub fn with_reason(state: QueryState, reason: impl Into<String>) -> Self {
        Self { state, reason: Some(reason.into()) }
    }
}

/// One page of raw results as the engine reports them. The first row echoes
/// the column labels; cells the engine leaves out are `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResultPage {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub next_token: Option<String>,
}

/// Control-plane calls against the managed query engine.
#[async_trait]
pub trait QueryService: Send + Sync {
    async fn start_query(
        &self,
        submission: &QuerySubmission,
    ) -> Result<QueryExecutionHandle, QueryServiceError>;

    async fn query_status(
        &self,
        handle: &QueryExecutionHandle,
    ) -> Result<QueryStatus, QueryServiceError>;

    async fn query_results(
        &self,
        handle: &QueryExecutionHandle,
        max_results: u32,
    ) -> Result<ResultPage, QueryServiceError>;
}
