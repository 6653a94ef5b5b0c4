use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use querydesk_core::config::{AppConfig, EngineAccess};
use serde::Serialize;

#[derive(Clone, Debug)]
pub struct HealthState {
    endpoint: String,
    access: EngineAccess,
    tool_count: usize,
}

impl HealthState {
    pub fn from_config(config: &AppConfig, tool_count: usize) -> Self {
        Self {
            endpoint: config.query.endpoint_url(),
            access: config.engine_access(),
            tool_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub query_engine: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let query_engine = query_engine_check(&state);
    let ready = state.access.is_ready();

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: format!("{} tools registered", state.tool_count),
        },
        query_engine,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn query_engine_check(state: &HealthState) -> HealthCheck {
    match state.access {
        EngineAccess::Signed => HealthCheck {
            status: "ready",
            detail: format!("signed requests to {}", state.endpoint),
        },
        EngineAccess::UnsignedOverride => HealthCheck {
            status: "ready",
            detail: format!("unsigned requests to {}", state.endpoint),
        },
        EngineAccess::Unconfigured => HealthCheck {
            status: "degraded",
            detail: "no AWS credentials configured for the managed query engine".to_string(),
        },
    }
}
