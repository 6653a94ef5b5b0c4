use std::sync::Arc;

use anyhow::{bail, Result};
use querydesk_core::config::AgentConfig;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm::{LlmClient, LlmRequest, LlmTurn, Message, ModelParams};
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

pub const SYSTEM_PROMPT: &str = "\
You are a data analytics assistant with access to a sales database through managed queries.

You can help with:
- Sales analysis and trends
- Customer insights and segmentation
- Product performance metrics
- Regional breakdowns
- Inventory management
- Order details and tracking

Available tools:
1. get_sales_summary - monthly sales trends for the last 6 months
2. get_top_customers - top customers by lifetime value
3. get_product_performance - product sales over a number of months
4. get_regional_breakdown - performance across regions over a number of months
5. get_inventory_status - inventory levels at one warehouse
6. get_order_details - complete details for one order

When responding:
- Be concise and data-driven
- Format numerical results clearly, using tables where they help
- Highlight key findings
- Ask a clarifying question when a required parameter is missing
- Suggest related analyses that might be useful

Always cite which tool produced the data.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentReply {
    pub answer: String,
    pub iterations: u32,
    pub tool_calls: usize,
}

pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    tools: ToolRegistry,
    params: ModelParams,
    max_iterations: u32,
    system_prompt: String,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, tools: ToolRegistry, params: ModelParams) -> Self {
        Self {
            llm,
            tools,
            params,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn from_config(llm: Arc<dyn LlmClient>, tools: ToolRegistry, config: &AgentConfig) -> Self {
        Self::new(llm, tools, ModelParams::from(config)).with_max_iterations(config.max_iterations)
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Runs model turns until the model answers, executing every requested
    /// tool call in between. Fails once `max_iterations` turns pass without
    /// an answer.
    pub async fn run(&self, prompt: &str) -> Result<AgentReply> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            bail!("No prompt provided");
        }

        let correlation_id = Uuid::new_v4().to_string();
        let schemas = self.tools.schemas();
        let mut messages = vec![Message::User { content: prompt.to_string() }];
        let mut tool_calls = 0;

        for iteration in 1..=self.max_iterations {
            let request = LlmRequest {
                system: &self.system_prompt,
                messages: &messages,
                tools: &schemas,
                params: &self.params,
            };

            match self.llm.complete(request).await? {
                LlmTurn::Answer(answer) => {
                    info!(
                        event_name = "agent.answered",
                        correlation_id = %correlation_id,
                        iterations = iteration,
                        tool_calls,
                        "agent produced an answer"
                    );
                    return Ok(AgentReply { answer, iterations: iteration, tool_calls });
                }
                LlmTurn::ToolCalls { text, calls } => {
                    messages.push(Message::Assistant { content: text, tool_calls: calls.clone() });
                    for call in calls {
                        info!(
                            event_name = "agent.tool_call",
                            correlation_id = %correlation_id,
                            iteration,
                            tool = %call.name,
                            "running tool requested by model"
                        );
                        let content = self.call_tool(&call.name, call.input).await;
                        messages.push(Message::Tool { tool_call_id: call.id, content });
                        tool_calls += 1;
                    }
                }
            }
        }

        warn!(
            event_name = "agent.iteration_limit",
            correlation_id = %correlation_id,
            max_iterations = self.max_iterations,
            tool_calls,
            "agent stopped without an answer"
        );
        bail!("agent reached the iteration limit of {} without an answer", self.max_iterations)
    }

    /// Entry-point shape for hosted invocation: `{prompt}` in, status object out.
    pub async fn handle_payload(&self, payload: &Value) -> Value {
        let prompt = payload.get("prompt").and_then(Value::as_str).unwrap_or_default();
        match self.run(prompt).await {
            Ok(reply) => json!({
                "status": "success",
                "result": reply.answer,
                "metadata": {
                    "model": self.params.model_id,
                    "tools_available": self.tools.len(),
                    "iterations": reply.iterations,
                    "tool_calls": reply.tool_calls,
                }
            }),
            Err(error) => json!({ "status": "error", "error": error.to_string() }),
        }
    }

    /// Tool failures go back to the model as error envelopes instead of ending the run.
    async fn call_tool(&self, name: &str, input: Value) -> Value {
        match self.tools.invoke(name, input).await {
            Ok(output) => output,
            Err(error) => json!({ "status": "error", "error": error.to_string() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use querydesk_core::config::AppConfig;
    use querydesk_core::query::scripted::{page_with_header, ScriptedQueryService};
    use querydesk_core::{PollPolicy, QueryCoordinator, QueryTarget, TemplateStore, ToolDispatcher};
    use serde_json::json;

    use super::{AgentRuntime, SYSTEM_PROMPT};
    use crate::llm::scripted::ScriptedLlm;
    use crate::llm::{LlmTurn, Message, ModelParams, ToolCall};
    use crate::tools::ToolRegistry;

    fn registry(service: Arc<ScriptedQueryService>) -> ToolRegistry {
        let target = QueryTarget {
            database: "analytics".to_string(),
            output_location: "s3://results/".to_string(),
            workgroup: None,
        };
        let policy = PollPolicy { interval: Duration::ZERO, max_attempts: 3, page_size: 100 };
        ToolRegistry::from_dispatcher(ToolDispatcher::new(
            Arc::new(TemplateStore::builtin()),
            QueryCoordinator::new(service, target).with_policy(policy),
        ))
    }

    fn runtime(llm: Arc<ScriptedLlm>, service: Arc<ScriptedQueryService>) -> AgentRuntime {
        AgentRuntime::new(llm, registry(service), ModelParams::from(&AppConfig::default().agent))
    }

    #[tokio::test]
    async fn configured_iteration_cap_is_applied() {
        let mut config = AppConfig::default().agent;
        config.max_iterations = 1;
        let llm = Arc::new(ScriptedLlm::new(vec![LlmTurn::ToolCalls {
            text: String::new(),
            calls: vec![call("call-1", "get_sales_summary", json!({}))],
        }]));

        let agent = AgentRuntime::from_config(llm, registry(inventory_service()), &config);
        let error = agent.run("sales?").await.expect_err("cap of one turn");

        assert!(error.to_string().contains("iteration limit of 1"));
    }

    fn call(id: &str, name: &str, input: serde_json::Value) -> ToolCall {
        ToolCall { id: id.to_string(), name: name.to_string(), input }
    }

    fn inventory_service() -> Arc<ScriptedQueryService> {
        Arc::new(ScriptedQueryService::succeeding_on_attempt(
            1,
            page_with_header(&["product_id", "stock_status"], &[&["P-1", "LOW"]]),
        ))
    }

    #[tokio::test]
    async fn tool_results_are_fed_back_before_the_answer() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            LlmTurn::ToolCalls {
                text: "Checking stock.".to_string(),
                calls: vec![call(
                    "call-1",
                    "gateway___get_inventory_status",
                    json!({ "warehouse_id": "WH001" }),
                )],
            },
            LlmTurn::Answer("P-1 is low (get_inventory_status).".to_string()),
        ]));

        let reply = runtime(llm.clone(), inventory_service())
            .run("What's the inventory status for warehouse WH001?")
            .await
            .expect("agent reply");

        assert_eq!(reply.iterations, 2);
        assert_eq!(reply.tool_calls, 1);
        let second_turn = &llm.requests()[1];
        match second_turn.last() {
            Some(Message::Tool { tool_call_id, content }) => {
                assert_eq!(tool_call_id, "call-1");
                assert_eq!(content["status"], "success");
                assert_eq!(content["data"][0]["stock_status"], "LOW");
            }
            other => panic!("expected a tool result message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_calls_become_error_results() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            LlmTurn::ToolCalls {
                text: String::new(),
                calls: vec![call("call-1", "drop_everything", json!({}))],
            },
            LlmTurn::Answer("That tool does not exist.".to_string()),
        ]));

        runtime(llm.clone(), inventory_service()).run("drop it").await.expect("agent reply");

        match llm.requests()[1].last() {
            Some(Message::Tool { content, .. }) => {
                assert_eq!(content["status"], "error");
                assert_eq!(content["error"], "Unknown tool: drop_everything");
            }
            other => panic!("expected a tool result message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn loop_stops_at_the_iteration_cap() {
        let turns = (0..5)
            .map(|index| LlmTurn::ToolCalls {
                text: String::new(),
                calls: vec![call(&format!("call-{index}"), "get_sales_summary", json!({}))],
            })
            .collect();
        let llm = Arc::new(ScriptedLlm::new(turns));

        let error = runtime(llm.clone(), inventory_service())
            .with_max_iterations(3)
            .run("keep going")
            .await
            .expect_err("iteration cap");

        assert!(error.to_string().contains("iteration limit of 3"));
        assert_eq!(llm.requests().len(), 3);
    }

    #[tokio::test]
    async fn payload_entry_point_reports_errors_and_metadata() {
        let llm = Arc::new(ScriptedLlm::new(vec![LlmTurn::Answer("Sales rose.".to_string())]));
        let agent = runtime(llm, inventory_service());

        let missing = agent.handle_payload(&json!({})).await;
        assert_eq!(missing, json!({ "status": "error", "error": "No prompt provided" }));

        let answered = agent.handle_payload(&json!({ "prompt": "How were sales?" })).await;
        assert_eq!(answered["status"], "success");
        assert_eq!(answered["result"], "Sales rose.");
        assert_eq!(answered["metadata"]["tools_available"], 6);
    }

    #[test]
    fn system_prompt_names_every_builtin_tool() {
        for tool_id in TemplateStore::builtin().tool_ids() {
            assert!(SYSTEM_PROMPT.contains(tool_id), "{tool_id} missing from prompt");
        }
    }
}
