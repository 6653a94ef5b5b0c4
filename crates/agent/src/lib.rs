//! Agent-side glue for the query tools.
//!
//! The model is an external service behind [`llm::LlmClient`]. It never sees
//! query text: it picks a tool and parameters, the [`tools::ToolRegistry`]
//! routes the call through the core dispatcher, and the resulting envelope is
//! handed back as the tool result. [`runtime::AgentRuntime`] bounds that loop.

pub mod llm;
pub mod runtime;
pub mod tools;

pub use llm::{LlmClient, LlmRequest, LlmTurn, Message, ModelParams, ToolCall};
pub use runtime::{AgentReply, AgentRuntime, SYSTEM_PROMPT};
pub use tools::{QueryTool, Tool, ToolRegistry};
