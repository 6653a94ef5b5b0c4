//! In-memory [`QueryService`] that replays a fixed status script.
//!
//! Used by tests across the workspace.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::QueryServiceError;
use crate::query::service::{
    QueryExecutionHandle, QueryService, QueryState, QueryStatus, QuerySubmission, ResultPage,
};

#[derive(Debug)]
pub struct ScriptedQueryService {
    statuses: Vec<QueryStatus>,
    page: ResultPage,
    submit_error: Option<QueryServiceError>,
    status_error: Option<QueryServiceError>,
    submissions: Mutex<Vec<QuerySubmission>>,
    polls: AtomicU32,
    fetches: AtomicU32,
    last_max_results: AtomicU32,
}

impl ScriptedQueryService {
    /// Replays `statuses` one per poll; the last entry repeats forever.
    pub fn new(statuses: Vec<QueryStatus>, page: ResultPage) -> Self {
        Self {
            statuses,
            page,
            submit_error: None,
            status_error: None,
            submissions: Mutex::new(Vec::new()),
            polls: AtomicU32::new(0),
            fetches: AtomicU32::new(0),
            last_max_results: AtomicU32::new(0),
        }
    }

    /// Reports `Running` for `attempt - 1` polls, then `Succeeded`.
    pub fn succeeding_on_attempt(attempt: u32, page: ResultPage) -> Self {
        let mut statuses: Vec<QueryStatus> = (1..attempt.max(1))
            .map(|index| {
                let state = if index == 1 { QueryState::Queued } else { QueryState::Running };
                QueryStatus::new(state)
            })
            .collect();
        statuses.push(QueryStatus::new(QueryState::Succeeded));
        Self::new(statuses, page)
    }

    pub fn never_finishing() -> Self {
        Self::new(vec![QueryStatus::new(QueryState::Running)], ResultPage::default())
    }

    pub fn ending_in(status: QueryStatus) -> Self {
        Self::new(vec![status], ResultPage::default())
    }

    pub fn with_submit_error(mut self, error: QueryServiceError) -> Self {
        self.submit_error = Some(error);
        self
    }

    pub fn with_status_error(mut self, error: QueryServiceError) -> Self {
        self.status_error = Some(error);
        self
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> u32 {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn last_max_results(&self) -> u32 {
        self.last_max_results.load(Ordering::SeqCst)
    }

    pub fn submissions(&self) -> Vec<QuerySubmission> {
        self.submissions.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

/// A page with the header echo prepended, as the engine returns it.
pub fn page_with_header(columns: &[&str], rows: &[&[&str]]) -> ResultPage {
    let header = columns.iter().map(|column| Some(column.to_string())).collect();
    let data = rows.iter().map(|row| row.iter().map(|cell| Some(cell.to_string())).collect());

    ResultPage {
        columns: columns.iter().map(|column| column.to_string()).collect(),
        rows: std::iter::once(header).chain(data).collect(),
        next_token: None,
    }
}

#[async_trait]
impl QueryService for ScriptedQueryService {
    async fn start_query(
        &self,
        submission: &QuerySubmission,
    ) -> Result<QueryExecutionHandle, QueryServiceError> {
        if let Some(error) = &self.submit_error {
            return Err(error.clone());
        }

        let mut submissions = self
            .submissions
            .lock()
            .map_err(|_| QueryServiceError::Transport("scripted service lock poisoned".into()))?;
        submissions.push(submission.clone());
        Ok(QueryExecutionHandle(format!("scripted-{}", submissions.len())))
    }

    async fn query_status(
        &self,
        _handle: &QueryExecutionHandle,
    ) -> Result<QueryStatus, QueryServiceError> {
        let index = self.polls.fetch_add(1, Ordering::SeqCst) as usize;
        if let Some(error) = &self.status_error {
            return Err(error.clone());
        }

        self.statuses
            .get(index)
            .or_else(|| self.statuses.last())
            .cloned()
            .ok_or_else(|| QueryServiceError::Decode("scripted service has no statuses".into()))
    }

    async fn query_results(
        &self,
        _handle: &QueryExecutionHandle,
        max_results: u32,
    ) -> Result<ResultPage, QueryServiceError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.last_max_results.store(max_results, Ordering::SeqCst);
        Ok(self.page.clone())
    }
}
