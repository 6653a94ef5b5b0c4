//! Hosted agent entry point.
//!
//! `POST /invocations` takes `{"prompt": "..."}` and answers with the
//! agent's `{status, result, metadata}` object. Like the tool routes it
//! always answers 200, with failures carried in the body.

use std::sync::Arc;

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use querydesk_agent::AgentRuntime;
use serde_json::{json, Value};
use tracing::warn;

#[derive(Clone)]
pub struct InvocationsState {
    agent: Option<Arc<AgentRuntime>>,
}

pub fn router(agent: Option<Arc<AgentRuntime>>) -> Router {
    Router::new().route("/invocations", post(invoke_agent)).with_state(InvocationsState { agent })
}

async fn invoke_agent(State(state): State<InvocationsState>, body: Bytes) -> Json<Value> {
    let Some(agent) = state.agent else {
        warn!(
            event_name = "agent.unavailable",
            correlation_id = "http",
            "invocation received but no language model client is configured"
        );
        return Json(json!({ "status": "error", "error": "Agent runtime is not configured" }));
    };

    // Unreadable bodies carry no prompt; the runtime reports that itself.
    let payload = serde_json::from_slice(&body).unwrap_or(Value::Null);
    Json(agent.handle_payload(&payload).await)
}
