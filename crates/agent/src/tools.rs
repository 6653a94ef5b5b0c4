use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use querydesk_core::{parameters_from_json, resolve_tool_name, ToolDispatcher};
use serde_json::Value;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// JSON tool description in `{name, description, inputSchema}` form.
    fn schema(&self) -> Value;

    async fn execute(&self, input: Value) -> Result<Value>;
}

/// One query template exposed as an agent tool.
pub struct QueryTool {
    tool_id: String,
    schema: Value,
    dispatcher: Arc<ToolDispatcher>,
}

impl QueryTool {
    pub fn new(tool_id: impl Into<String>, schema: Value, dispatcher: Arc<ToolDispatcher>) -> Self {
        Self { tool_id: tool_id.into(), schema, dispatcher }
    }
}

#[async_trait]
impl Tool for QueryTool {
    fn name(&self) -> &str {
        &self.tool_id
    }

    fn schema(&self) -> Value {
        self.schema.clone()
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let envelope = self.dispatcher.dispatch(&self.tool_id, &parameters_from_json(&input)).await;
        Ok(envelope.to_json())
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Registers one [`QueryTool`] per template known to `dispatcher`.
    pub fn from_dispatcher(dispatcher: ToolDispatcher) -> Self {
        let dispatcher = Arc::new(dispatcher);
        let mut registry = Self::default();
        for template in dispatcher.templates().catalog() {
            registry.register(QueryTool::new(
                template.tool_id.clone(),
                template.tool_schema(),
                Arc::clone(&dispatcher),
            ));
        }
        registry
    }

    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    /// Looks a tool up by plain or gateway-prefixed name.
    pub fn get(&self, raw_name: &str) -> Option<&dyn Tool> {
        self.tools.get(resolve_tool_name(raw_name)).map(|tool| &**tool)
    }

    pub async fn invoke(&self, raw_name: &str, input: Value) -> Result<Value> {
        let tool = self.get(raw_name).ok_or_else(|| anyhow!("Unknown tool: {raw_name}"))?;
        tool.execute(input).await
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn schemas(&self) -> Vec<Value> {
        self.tools.values().map(|tool| tool.schema()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::Result;
    use async_trait::async_trait;
    use querydesk_core::query::scripted::{page_with_header, ScriptedQueryService};
    use querydesk_core::{PollPolicy, QueryCoordinator, QueryTarget, TemplateStore, ToolDispatcher};
    use serde_json::{json, Value};

    use super::{Tool, ToolRegistry};

    fn dispatcher(service: Arc<ScriptedQueryService>) -> ToolDispatcher {
        let target = QueryTarget {
            database: "analytics".to_string(),
            output_location: "s3://results/".to_string(),
            workgroup: None,
        };
        let policy = PollPolicy { interval: Duration::ZERO, max_attempts: 3, page_size: 100 };
        ToolDispatcher::new(
            Arc::new(TemplateStore::builtin()),
            QueryCoordinator::new(service, target).with_policy(policy),
        )
    }

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn schema(&self) -> Value {
            json!({ "name": "echo" })
        }

        async fn execute(&self, input: Value) -> Result<Value> {
            Ok(input)
        }
    }

    #[test]
    fn registry_holds_one_tool_per_template() {
        let service = Arc::new(ScriptedQueryService::never_finishing());
        let registry = ToolRegistry::from_dispatcher(dispatcher(service));

        assert_eq!(registry.len(), 6);
        assert!(registry.get("get_sales_summary").is_some());
        assert!(registry.get("athena-target___get_inventory_status").is_some());
        assert!(registry.get("get_everything").is_none());
        assert_eq!(registry.schemas().len(), 6);
    }

    #[tokio::test]
    async fn invoking_a_query_tool_returns_the_envelope() {
        let service = Arc::new(ScriptedQueryService::succeeding_on_attempt(
            1,
            page_with_header(&["region", "revenue"], &[&["WEST", "100"]]),
        ));
        let registry = ToolRegistry::from_dispatcher(dispatcher(service));

        let output = registry
            .invoke("gateway___get_regional_breakdown", json!({ "months": 3 }))
            .await
            .expect("tool output");

        assert_eq!(output["status"], "success");
        assert_eq!(output["data"][0]["region"], "WEST");
    }

    #[tokio::test]
    async fn unknown_names_are_errors_and_custom_tools_register() {
        let mut registry = ToolRegistry::default();
        assert!(registry.is_empty());
        registry.register(Echo);

        let echoed = registry.invoke("echo", json!({ "a": 1 })).await.expect("echo output");
        assert_eq!(echoed, json!({ "a": 1 }));

        let error = registry.invoke("missing", Value::Null).await.expect_err("unknown tool");
        assert_eq!(error.to_string(), "Unknown tool: missing");
    }
}
