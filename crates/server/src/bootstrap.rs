use std::sync::Arc;

use querydesk_agent::{AgentRuntime, LlmClient, ToolRegistry};
use querydesk_core::config::{AppConfig, ConfigError, LoadOptions};
use querydesk_core::{QueryCoordinator, QueryServiceError, QueryTarget, TemplateStore, ToolDispatcher};
use thiserror::Error;
use tracing::info;

use crate::athena::AthenaQueryService;

pub struct Application {
    pub config: AppConfig,
    pub dispatcher: ToolDispatcher,
    /// Present once a language model client has been attached with [`Application::with_agent`].
    pub agent: Option<Arc<AgentRuntime>>,
}

impl Application {
    /// Builds the agent over this application's dispatcher, so the agent and
    /// the tool routes share one engine client.
    pub fn with_agent(mut self, llm: Arc<dyn LlmClient>) -> Self {
        let tools = ToolRegistry::from_dispatcher(self.dispatcher.clone());
        let runtime = AgentRuntime::from_config(llm, tools, &self.config.agent);
        info!(
            event_name = "system.bootstrap.agent_ready",
            correlation_id = "bootstrap",
            model_id = %self.config.agent.model_id,
            tool_count = runtime.tools().len(),
            "agent runtime attached"
        );
        self.agent = Some(Arc::new(runtime));
        self
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("query engine client could not be built: {0}")]
    QueryClient(#[source] QueryServiceError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        database = %config.query.database,
        region = %config.query.region,
        "starting application bootstrap"
    );

    let dispatcher = build_dispatcher(&config)?;
    info!(
        event_name = "system.bootstrap.dispatcher_ready",
        correlation_id = "bootstrap",
        tool_count = dispatcher.templates().len(),
        signed = config.aws.has_credentials(),
        endpoint = %config.query.endpoint_url(),
        "tool dispatcher ready"
    );

    Ok(Application { config, dispatcher, agent: None })
}

/// Wires the builtin templates to the configured query engine.
pub fn build_dispatcher(config: &AppConfig) -> Result<ToolDispatcher, BootstrapError> {
    let service = AthenaQueryService::from_config(&config.query, &config.aws)
        .map_err(BootstrapError::QueryClient)?;
    let coordinator = QueryCoordinator::new(Arc::new(service), QueryTarget::from(&config.query));
    Ok(ToolDispatcher::new(Arc::new(TemplateStore::builtin()), coordinator))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use async_trait::async_trait;
    use querydesk_agent::{LlmClient, LlmRequest, LlmTurn};
    use querydesk_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::{bootstrap, bootstrap_with_config, BootstrapError};

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_output_location() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                query_output_location: Some("https://not-a-bucket/".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = match result {
            Err(BootstrapError::Config(error)) => error.to_string(),
            Err(other) => panic!("expected config error, got {other}"),
            Ok(_) => panic!("expected bootstrap to fail"),
        };
        assert!(message.contains("query.output_location"));
    }

    #[tokio::test]
    async fn bootstrap_registers_builtin_tools_against_endpoint_override() {
        let mut config = querydesk_core::config::AppConfig::default();
        config.query.endpoint = Some("http://127.0.0.1:4566".to_string());

        let app = bootstrap_with_config(config).await.expect("bootstrap should succeed");

        assert_eq!(app.dispatcher.templates().len(), 6);
        assert_eq!(app.config.query.endpoint_url(), "http://127.0.0.1:4566");
    }

    #[tokio::test]
    async fn malformed_endpoint_is_a_query_client_error() {
        let mut config = querydesk_core::config::AppConfig::default();
        config.query.endpoint = Some("not a url".to_string());

        let result = bootstrap_with_config(config).await;

        assert!(matches!(result, Err(BootstrapError::QueryClient(_))));
    }

    struct Silent;

    #[async_trait]
    impl LlmClient for Silent {
        async fn complete(&self, _request: LlmRequest<'_>) -> Result<LlmTurn> {
            Ok(LlmTurn::Answer(String::new()))
        }
    }

    #[tokio::test]
    async fn attached_agent_sees_every_builtin_tool() {
        let mut config = querydesk_core::config::AppConfig::default();
        config.query.endpoint = Some("http://127.0.0.1:4566".to_string());
        config.agent.max_iterations = 3;

        let app = bootstrap_with_config(config).await.expect("bootstrap should succeed");
        assert!(app.agent.is_none());

        let app = app.with_agent(Arc::new(Silent));
        let agent = app.agent.expect("agent attached");
        assert_eq!(agent.tools().len(), 6);
        assert!(agent.tools().get("gateway___get_sales_summary").is_some());
    }
}
