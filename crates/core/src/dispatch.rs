//! Tool invocation boundary.
//!
//! [`ToolDispatcher::dispatch`] is the only entry point the hosting process
//! and the agent call. Every failure below it is converted into an error
//! envelope here, so a bad invocation never takes the host down.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::binder::{bind, Parameters};
use crate::errors::{ErrorClass, ToolError};
use crate::query::{QueryCoordinator, QueryResult, ResultRow};
use crate::templates::TemplateStore;

/// Separator the gateway puts between its target name and the tool name.
pub const GATEWAY_TOOL_DELIMITER: &str = "___";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResultMetadata {
    pub columns: Vec<String>,
    pub row_count: usize,
    pub truncated: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResponseEnvelope {
    Success { data: Vec<ResultRow>, metadata: ResultMetadata },
    Error { error: String, error_class: ErrorClass },
}

impl ToolResponseEnvelope {
    pub fn success(result: QueryResult) -> Self {
        let metadata = ResultMetadata {
            columns: result.columns,
            row_count: result.rows.len(),
            truncated: result.truncated,
        };
        Self::Success { data: result.rows, metadata }
    }

    pub fn error(error: &ToolError) -> Self {
        Self::Error { error: error.to_string(), error_class: error.class() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            Self::Success { .. } => None,
            Self::Error { error_class, .. } => Some(*error_class),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|error| {
            serde_json::json!({
                "status": "error",
                "error": format!("could not serialize tool response: {error}"),
                "error_class": ErrorClass::ServiceFailure,
            })
        })
    }
}

/// Strips a gateway target prefix (`<target>___<tool>`) if present.
pub fn resolve_tool_name(raw: &str) -> &str {
    match raw.find(GATEWAY_TOOL_DELIMITER) {
        Some(index) => &raw[index + GATEWAY_TOOL_DELIMITER.len()..],
        None => raw,
    }
}

#[derive(Clone)]
pub struct ToolDispatcher {
    templates: Arc<TemplateStore>,
    coordinator: QueryCoordinator,
}

impl ToolDispatcher {
    pub fn new(templates: Arc<TemplateStore>, coordinator: QueryCoordinator) -> Self {
        Self { templates, coordinator }
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub async fn dispatch(&self, tool_id: &str, parameters: &Parameters) -> ToolResponseEnvelope {
        let correlation_id = Uuid::new_v4().to_string();
        let tool_id = resolve_tool_name(tool_id);

        match self.run(tool_id, parameters, &correlation_id).await {
            Ok(result) => {
                info!(
                    event_name = "tool.completed",
                    correlation_id = %correlation_id,
                    tool_id,
                    row_count = result.row_count(),
                    "tool invocation completed"
                );
                ToolResponseEnvelope::success(result)
            }
            Err(failure) => {
                let class = failure.class();
                if class.is_transient() {
                    error!(
                        event_name = "tool.failed",
                        correlation_id = %correlation_id,
                        tool_id,
                        error_class = class.as_str(),
                        error = %failure,
                        "tool invocation failed"
                    );
                } else {
                    warn!(
                        event_name = "tool.rejected",
                        correlation_id = %correlation_id,
                        tool_id,
                        error_class = class.as_str(),
                        error = %failure,
                        "tool invocation rejected"
                    );
                }
                ToolResponseEnvelope::error(&failure)
            }
        }
    }

    async fn run(
        &self,
        tool_id: &str,
        parameters: &Parameters,
        correlation_id: &str,
    ) -> Result<QueryResult, ToolError> {
        let template = self
            .templates
            .lookup(tool_id)
            .ok_or_else(|| ToolError::UnknownTool(tool_id.to_string()))?;
        let bound = bind(template, parameters)?;

        info!(
            event_name = "tool.submitted",
            correlation_id,
            tool_id,
            parameter_count = parameters.len(),
            "submitting tool query"
        );
        Ok(self.coordinator.execute(&bound.text).await?)
    }
}
