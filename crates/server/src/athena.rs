//! [`QueryService`] over the Athena JSON 1.1 control-plane protocol.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use querydesk_core::config::{AwsConfig, QueryConfig};
use querydesk_core::{
    QueryExecutionHandle, QueryService, QueryServiceError, QueryState, QueryStatus,
    QuerySubmission, ResultPage,
};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::sigv4::{self, Credentials, SigningRequest};

const SERVICE_NAME: &str = "athena";
const TARGET_PREFIX: &str = "AmazonAthena";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

#[derive(Clone, Debug)]
pub struct AthenaQueryService {
    client: Client,
    endpoint: Url,
    region: String,
    credentials: Option<Credentials>,
}

impl AthenaQueryService {
    pub fn from_config(query: &QueryConfig, aws: &AwsConfig) -> Result<Self, QueryServiceError> {
        let endpoint = Url::parse(&query.endpoint_url()).map_err(|error| {
            QueryServiceError::Transport(format!("invalid query endpoint: {error}"))
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(query.timeout_secs))
            .build()
            .map_err(|error| QueryServiceError::Transport(error.to_string()))?;

        let credentials = match (&aws.access_key_id, &aws.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => Some(Credentials {
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                session_token: aws.session_token.clone(),
            }),
            (None, None) => None,
            _ => {
                return Err(QueryServiceError::Credentials(
                    "access key id and secret access key must be set together".to_string(),
                ))
            }
        };

        Ok(Self { client, endpoint, region: query.region.clone(), credentials })
    }

    pub fn is_signed(&self) -> bool {
        self.credentials.is_some()
    }

    async fn call<Req, Resp>(&self, action: &str, body: &Req) -> Result<Resp, QueryServiceError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let payload =
            serde_json::to_vec(body).map_err(|error| QueryServiceError::Decode(error.to_string()))?;
        let target = format!("{TARGET_PREFIX}.{action}");

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header("content-type", CONTENT_TYPE)
            .header("x-amz-target", &target);

        if let Some(credentials) = &self.credentials {
            let host = host_header(&self.endpoint)?;
            let signing = SigningRequest {
                method: "POST",
                host: &host,
                path: self.endpoint.path(),
                headers: &[("content-type", CONTENT_TYPE), ("x-amz-target", &target)],
                payload: &payload,
            };
            for (name, value) in
                sigv4::sign(&signing, credentials, &self.region, SERVICE_NAME, Utc::now())
            {
                request = request.header(name, value);
            }
        }

        debug!(event_name = "athena.request", action, "calling query engine");
        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|error| QueryServiceError::Transport(error.to_string()))?;

        let status = response.status();
        let bytes =
            response.bytes().await.map_err(|error| QueryServiceError::Transport(error.to_string()))?;

        if !status.is_success() {
            return Err(QueryServiceError::Status {
                status: status.as_u16(),
                message: error_message(&bytes),
            });
        }

        serde_json::from_slice(&bytes).map_err(|error| QueryServiceError::Decode(error.to_string()))
    }
}

#[async_trait]
impl QueryService for AthenaQueryService {
    async fn start_query(
        &self,
        submission: &QuerySubmission,
    ) -> Result<QueryExecutionHandle, QueryServiceError> {
        let request = StartQueryExecutionRequest {
            query_string: &submission.query_text,
            client_request_token: Uuid::new_v4().to_string(),
            query_execution_context: QueryExecutionContext { database: &submission.database },
            result_configuration: ResultConfiguration {
                output_location: &submission.output_location,
            },
            work_group: submission.workgroup.as_deref(),
        };

        let response: StartQueryExecutionResponse =
            self.call("StartQueryExecution", &request).await?;
        Ok(QueryExecutionHandle(response.query_execution_id))
    }

    async fn query_status(
        &self,
        handle: &QueryExecutionHandle,
    ) -> Result<QueryStatus, QueryServiceError> {
        let request = ExecutionIdRequest { query_execution_id: &handle.0, max_results: None };
        let response: GetQueryExecutionResponse = self.call("GetQueryExecution", &request).await?;

        let status = response.query_execution.status;
        Ok(QueryStatus { state: status.state.parse::<QueryState>()?, reason: status.state_change_reason })
    }

    async fn query_results(
        &self,
        handle: &QueryExecutionHandle,
        max_results: u32,
    ) -> Result<ResultPage, QueryServiceError> {
        let request =
            ExecutionIdRequest { query_execution_id: &handle.0, max_results: Some(max_results) };
        let response: GetQueryResultsResponse = self.call("GetQueryResults", &request).await?;

        let columns = response
            .result_set
            .result_set_metadata
            .column_info
            .into_iter()
            .map(|column| column.label.or(column.name).unwrap_or_default())
            .collect();
        let rows = response
            .result_set
            .rows
            .into_iter()
            .map(|row| row.data.into_iter().map(|datum| datum.var_char_value).collect())
            .collect();

        Ok(ResultPage { columns, rows, next_token: response.next_token })
    }
}

fn host_header(endpoint: &Url) -> Result<String, QueryServiceError> {
    let host = endpoint
        .host_str()
        .ok_or_else(|| QueryServiceError::Transport("query endpoint has no host".to_string()))?;
    Ok(match endpoint.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Pulls the most specific message out of an engine error body.
fn error_message(body: &[u8]) -> String {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let field = |name: &str| {
        parsed.as_ref().and_then(|value| value.get(name)).and_then(Value::as_str).map(str::to_string)
    };

    let kind = field("__type").map(|kind| kind.rsplit('#').next().unwrap_or_default().to_string());
    let message = field("Message").or_else(|| field("message"));

    match (kind, message) {
        (Some(kind), Some(message)) => format!("{kind}: {message}"),
        (None, Some(message)) => message,
        (Some(kind), None) => kind,
        (None, None) => String::from_utf8_lossy(body).trim().to_string(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryExecutionRequest<'a> {
    query_string: &'a str,
    client_request_token: String,
    query_execution_context: QueryExecutionContext<'a>,
    result_configuration: ResultConfiguration<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    work_group: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecutionContext<'a> {
    database: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResultConfiguration<'a> {
    output_location: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ExecutionIdRequest<'a> {
    query_execution_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_results: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StartQueryExecutionResponse {
    query_execution_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryExecutionResponse {
    query_execution: QueryExecution,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct QueryExecution {
    status: ExecutionStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ExecutionStatus {
    state: String,
    #[serde(default)]
    state_change_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetQueryResultsResponse {
    result_set: ResultSet,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultSet {
    #[serde(default)]
    rows: Vec<Row>,
    result_set_metadata: ResultSetMetadata,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ResultSetMetadata {
    #[serde(default)]
    column_info: Vec<ColumnInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ColumnInfo {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Row {
    #[serde(default)]
    data: Vec<Datum>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Datum {
    #[serde(default)]
    var_char_value: Option<String>,
}
