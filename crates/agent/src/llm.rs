use anyhow::Result;
use async_trait::async_trait;
use querydesk_core::config::AgentConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelParams {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl From<&AgentConfig> for ModelParams {
    fn from(config: &AgentConfig) -> Self {
        Self {
            model_id: config.model_id.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User { content: String },
    Assistant { content: String, tool_calls: Vec<ToolCall> },
    Tool { tool_call_id: String, content: Value },
}

/// Everything the model needs for one turn.
#[derive(Clone, Debug, Serialize)]
pub struct LlmRequest<'a> {
    pub system: &'a str,
    pub messages: &'a [Message],
    pub tools: &'a [Value],
    pub params: &'a ModelParams,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LlmTurn {
    Answer(String),
    /// Optional narration plus the calls the model wants run before its next turn.
    ToolCalls { text: String, calls: Vec<ToolCall> },
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest<'_>) -> Result<LlmTurn>;
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::{LlmClient, LlmRequest, LlmTurn, Message};

    /// Replays canned turns and records the message history it was shown.
    #[derive(Default)]
    pub(crate) struct ScriptedLlm {
        turns: Mutex<VecDeque<LlmTurn>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedLlm {
        pub(crate) fn new(turns: Vec<LlmTurn>) -> Self {
            Self { turns: Mutex::new(turns.into()), seen: Mutex::new(Vec::new()) }
        }

        pub(crate) fn requests(&self) -> Vec<Vec<Message>> {
            self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: LlmRequest<'_>) -> Result<LlmTurn> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(request.messages.to_vec());
            }
            let mut turns = self.turns.lock().map_err(|_| anyhow!("script lock poisoned"))?;
            turns.pop_front().ok_or_else(|| anyhow!("script exhausted"))
        }
    }
}

#[cfg(test)]
mod tests {
    use querydesk_core::config::AppConfig;
    use serde_json::json;

    use super::{Message, ModelParams, ToolCall};

    #[test]
    fn model_params_follow_agent_config() {
        let params = ModelParams::from(&AppConfig::default().agent);

        assert_eq!(params.model_id, "us.anthropic.claude-sonnet-4-20250514-v1:0");
        assert_eq!(params.max_tokens, 4096);
        assert!((params.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn messages_serialize_with_role_tag() {
        let message = Message::Assistant {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "call-1".to_string(),
                name: "get_sales_summary".to_string(),
                input: json!({}),
            }],
        };

        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["tool_calls"][0]["name"], "get_sales_summary");
    }
}
