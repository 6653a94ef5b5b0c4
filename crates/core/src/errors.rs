use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification carried by error envelopes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    UnknownTool,
    InvalidRequest,
    MissingParameter,
    InvalidParameter,
    ServiceFailure,
    Timeout,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UnknownTool => "unknown_tool",
            Self::InvalidRequest => "invalid_request",
            Self::MissingParameter => "missing_parameter",
            Self::InvalidParameter => "invalid_parameter",
            Self::ServiceFailure => "service_failure",
            Self::Timeout => "timeout",
        }
    }

    /// Transient classes are worth retrying later with the same input; the rest
    /// need a different tool or parameter value.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::ServiceFailure | Self::Timeout)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BindError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),
    #[error("Invalid value for parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// Failures talking to the managed query engine.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueryServiceError {
    #[error("query service request failed: {0}")]
    Transport(String),
    #[error("query service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("could not decode query service response: {0}")]
    Decode(String),
    #[error("query service credentials unavailable: {0}")]
    Credentials(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("{0}")]
    ServiceFailure(String),
    #[error("Query timeout - exceeded maximum wait time ({attempts} status checks)")]
    Timeout { attempts: u32 },
}

impl From<QueryServiceError> for QueryError {
    fn from(value: QueryServiceError) -> Self {
        Self::ServiceFailure(value.to_string())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    /// The invocation itself could not be read, before any tool was chosen.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    Query(#[from] QueryError),
}

impl ToolError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::UnknownTool(_) => ErrorClass::UnknownTool,
            Self::InvalidRequest(_) => ErrorClass::InvalidRequest,
            Self::Bind(BindError::MissingParameter(_)) => ErrorClass::MissingParameter,
            Self::Bind(BindError::InvalidParameter { .. }) => ErrorClass::InvalidParameter,
            Self::Query(QueryError::ServiceFailure(_)) => ErrorClass::ServiceFailure,
            Self::Query(QueryError::Timeout { .. }) => ErrorClass::Timeout,
        }
    }
}
