use toolstream_model::ModelProvider;

use super::Agent;
use crate::config::AgentConfig;
use crate::model_client::ModelClient;
use crate::tool::{BlockingTool, Registry, Tool};

/// [`Agent`] builder.
pub struct AgentBuilder {
    pub(crate) model_client: ModelClient,
    pub(crate) registry: Registry,
    pub(crate) config: AgentConfig,
    pub(crate) system_prompt: Option<String>,
}

impl AgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            registry: Registry::new(),
            config: AgentConfig::default(),
            system_prompt: None,
        }
    }

    /// Sets the system message that opens every new conversation.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Replaces the default configuration.
    #[inline]
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        self.registry.register(tool);
        self
    }

    /// Registers a tool whose body runs on the blocking thread pool.
    #[inline]
    pub fn with_blocking_tool<T: BlockingTool>(mut self, tool: T) -> Self {
        self.registry.register_blocking(tool);
        self
    }

    /// Builds the agent.
    #[inline]
    pub fn build(self) -> Agent {
        Agent::from_builder(self)
    }
}
