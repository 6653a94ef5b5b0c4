pub mod binder;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod query;
pub mod templates;

pub use binder::{bind, parameters_from_json, BoundQuery, Parameters};
pub use dispatch::{resolve_tool_name, ResultMetadata, ToolDispatcher, ToolResponseEnvelope};
pub use errors::{BindError, ErrorClass, QueryError, QueryServiceError, ToolError};
pub use query::{
    PollPolicy, QueryCoordinator, QueryExecutionHandle, QueryResult, QueryService, QueryState,
    QueryStatus, QuerySubmission, QueryTarget, ResultPage, ResultRow,
};
pub use templates::{ParameterKind, ParameterRule, QueryTemplate, TemplateStore};
