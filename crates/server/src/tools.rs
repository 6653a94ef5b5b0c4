//! Tool invocation routes.
//!
//! - `POST /api/v1/tools/invoke`            invoke by `{tool_id, parameters}`
//! - `POST /api/v1/tools/{tool_id}/invoke`  invoke with the parameters object as body
//! - `GET  /api/v1/tools`                   tool schema catalogue
//!
//! Every invocation answers 200 with a response envelope; failures are data.

use axum::{
    body::Bytes,
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use querydesk_core::{parameters_from_json, ToolDispatcher, ToolError, ToolResponseEnvelope};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

#[derive(Clone)]
pub struct ToolsState {
    dispatcher: ToolDispatcher,
}

#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub tool_id: String,
    #[serde(default)]
    pub parameters: Value,
}

pub fn router(dispatcher: ToolDispatcher) -> Router {
    Router::new()
        .route("/api/v1/tools", get(list_tools))
        .route("/api/v1/tools/invoke", post(invoke_tool))
        .route("/api/v1/tools/{tool_id}/invoke", post(invoke_named_tool))
        .with_state(ToolsState { dispatcher })
}

async fn list_tools(State(state): State<ToolsState>) -> Json<Value> {
    let tools = state.dispatcher.templates().tool_schemas();
    Json(json!({ "tools": tools }))
}

/// The body is decoded here rather than by an extractor so that an unreadable
/// request still answers with an error envelope.
async fn invoke_tool(State(state): State<ToolsState>, body: Bytes) -> Json<Value> {
    let request = match serde_json::from_slice::<InvokeRequest>(&body) {
        Ok(request) => request,
        Err(error) => {
            warn!(
                event_name = "tool.invalid_request",
                correlation_id = "http",
                error = %error,
                "rejected unreadable invocation body"
            );
            let failure = ToolError::InvalidRequest(error.to_string());
            return Json(ToolResponseEnvelope::error(&failure).to_json());
        }
    };
    let parameters = parameters_from_json(&request.parameters);
    let envelope = state.dispatcher.dispatch(&request.tool_id, &parameters).await;
    Json(envelope.to_json())
}

async fn invoke_named_tool(
    Path(tool_id): Path<String>,
    State(state): State<ToolsState>,
    body: Bytes,
) -> Json<Value> {
    // An empty or non-JSON body means no parameters; binding reports what is missing.
    let arguments = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let envelope = state.dispatcher.dispatch(&tool_id, &parameters_from_json(&arguments)).await;
    Json(envelope.to_json())
}
