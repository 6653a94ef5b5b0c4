use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::QueryConfig;
use crate::errors::QueryError;
use crate::query::result::QueryResult;
use crate::query::service::{QueryService, QueryState, QuerySubmission};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;
/// Largest page the engine returns from a single results call.
pub const MAX_RESULT_PAGE_SIZE: u32 = 100;

const UNKNOWN_FAILURE_REASON: &str = "Unknown error";

/// Bounds on the status polling loop. The engine offers no completion
/// notification, so the only way to observe a query is to ask repeatedly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub page_size: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            page_size: MAX_RESULT_PAGE_SIZE,
        }
    }
}

/// Where submitted queries run and where the engine writes result files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryTarget {
    pub database: String,
    pub output_location: String,
    pub workgroup: Option<String>,
}

impl From<&QueryConfig> for QueryTarget {
    fn from(config: &QueryConfig) -> Self {
        Self {
            database: config.database.clone(),
            output_location: config.output_location.clone(),
            workgroup: config.workgroup.clone(),
        }
    }
}

/// Runs one query to completion: submit, poll until terminal or out of
/// attempts, then fetch and shape a single page of results.
#[derive(Clone)]
pub struct QueryCoordinator {
    service: Arc<dyn QueryService>,
    target: QueryTarget,
    policy: PollPolicy,
}

impl QueryCoordinator {
    pub fn new(service: Arc<dyn QueryService>, target: QueryTarget) -> Self {
        Self { service, target, policy: PollPolicy::default() }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub async fn execute(&self, query_text: &str) -> Result<QueryResult, QueryError> {
        let submission = QuerySubmission {
            query_text: query_text.to_string(),
            database: self.target.database.clone(),
            output_location: self.target.output_location.clone(),
            workgroup: self.target.workgroup.clone(),
        };

        let handle = self.service.start_query(&submission).await.map_err(|error| {
            error!(event_name = "query.submit_failed", error = %error, "query submission failed");
            QueryError::from(error)
        })?;
        info!(
            event_name = "query.submitted",
            execution_id = %handle,
            database = %self.target.database,
            "started query execution"
        );

        for attempt in 1..=self.policy.max_attempts {
            let status = self.service.query_status(&handle).await?;
            debug!(
                event_name = "query.polled",
                execution_id = %handle,
                attempt,
                state = status.state.as_str(),
                "polled query status"
            );

            match status.state {
                QueryState::Succeeded => {
                    let page_size = self.policy.page_size.clamp(1, MAX_RESULT_PAGE_SIZE);
                    let page = self.service.query_results(&handle, page_size).await?;
                    let result = QueryResult::from_page(page);
                    if result.truncated {
                        warn!(
                            event_name = "query.results_truncated",
                            execution_id = %handle,
                            returned_rows = result.row_count(),
                            "result set exceeds a single page; remaining rows were not fetched"
                        );
                    }
                    info!(
                        event_name = "query.succeeded",
                        execution_id = %handle,
                        attempts = attempt,
                        row_count = result.row_count(),
                        "query execution succeeded"
                    );
                    return Ok(result);
                }
                QueryState::Failed | QueryState::Cancelled => {
                    let reason = status
                        .reason
                        .filter(|reason| !reason.trim().is_empty())
                        .unwrap_or_else(|| UNKNOWN_FAILURE_REASON.to_string());
                    error!(
                        event_name = "query.failed",
                        execution_id = %handle,
                        state = status.state.as_str(),
                        reason = %reason,
                        "query execution did not succeed"
                    );
                    return Err(QueryError::ServiceFailure(reason));
                }
                QueryState::Queued | QueryState::Running => {
                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.policy.interval).await;
                    }
                }
            }
        }

        warn!(
            event_name = "query.timed_out",
            execution_id = %handle,
            attempts = self.policy.max_attempts,
            "query did not reach a terminal state within the polling budget"
        );
        Err(QueryError::Timeout { attempts: self.policy.max_attempts })
    }
}
