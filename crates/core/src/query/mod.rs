//! Managed-query execution: submit, poll, classify, materialize.

pub mod coordinator;
pub mod result;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;
pub mod service;

pub use coordinator::{PollPolicy, QueryCoordinator, QueryTarget};
pub use result::{QueryResult, ResultRow};
pub use service::{
    QueryExecutionHandle, QueryService, QueryState, QueryStatus, QuerySubmission, ResultPage,
};
