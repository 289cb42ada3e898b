use toolstream_core::{
    Agent, AgentBuilder, AgentConfig, TurnEvents, TurnOptions,
};
use toolstream_model::ModelProvider;

use crate::tools::*;

const CONVERSATION_ID: &str = "default";

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    agent_builder: AgentBuilder,
}

impl SessionBuilder {
    /// Creates a session builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(
        provider: M,
    ) -> Self {
        let agent_builder = AgentBuilder::with_model_provider(provider);
        Self { agent_builder }
    }

    /// Sets the system prompt for the agent.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.with_system_prompt(prompt);
        self
    }

    /// Sets the configuration of the agent.
    #[inline]
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.agent_builder = self.agent_builder.with_config(config);
        self
    }

    /// Builds a new session.
    pub fn build(self) -> Session {
        let agent = self
            .agent_builder
            .with_tool(WeatherTool::new())
            .with_tool(SearchWebTool::new())
            .with_tool(StockPriceTool::new())
            .with_blocking_tool(TimeTool::new())
            .build();

        Session { agent }
    }
}

/// A chat session, like a window that displays messages and has a input box.
///
/// The session holds a fully configured agent with the demo tools, and it is
/// basically a wrapper around [`Agent`] that talks in a single conversation.
pub struct Session {
    agent: Agent,
}

impl Session {
    /// Sends a message to the session and returns the events of the turn.
    #[inline]
    pub fn send_message(
        &self,
        message: &str,
        options: TurnOptions,
    ) -> TurnEvents {
        self.agent.run_turn(CONVERSATION_ID, message, options)
    }

    /// Returns the underlying agent.
    #[inline]
    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use toolstream_core::Event;
    use toolstream_test_model::{
        PresetEvent, PresetResponse, TestModelProvider,
    };

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_demo_tools() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_user_input_step();
        model_provider.add_assistant_response_step(
            PresetResponse::with_events([
                PresetEvent::tool_call(
                    0,
                    "call_1",
                    "get_weather",
                    r#"{"city":"London"}"#,
                ),
                PresetEvent::tool_call(
                    1,
                    "call_2",
                    "get_stock_price",
                    r#"{"symbol":"aapl"}"#,
                ),
            ]),
        );
        model_provider.add_history_step();
        model_provider.add_history_step();
        model_provider.add_assistant_response_step(
            PresetResponse::with_events([PresetEvent::message("Done.")]),
        );

        let session =
            SessionBuilder::with_model_provider(model_provider.clone()).build();
        let events = session
            .send_message("Weather in London and AAPL?", TurnOptions::default())
            .collect_all()
            .await;

        assert_eq!(
            events,
            [
                Event::ToolCall {
                    id: "call_1".to_owned(),
                    name: "get_weather".to_owned(),
                    arguments: json!({ "city": "London" }),
                },
                Event::ToolResult {
                    id: "call_1".to_owned(),
                    result: "The weather in London is cloudy and 59°F"
                        .to_owned(),
                    success: true,
                },
                Event::ToolCall {
                    id: "call_2".to_owned(),
                    name: "get_stock_price".to_owned(),
                    arguments: json!({ "symbol": "aapl" }),
                },
                Event::ToolResult {
                    id: "call_2".to_owned(),
                    result: "aapl: $150.25 (+2.1%)".to_owned(),
                    success: true,
                },
                Event::Content {
                    text: "Done.".to_owned(),
                },
                Event::TurnComplete {
                    final_text: "Done.".to_owned(),
                    tool_call_count: 2,
                },
            ]
        );

        let names: Vec<_> = model_provider.requests()[0]
            .tools
            .iter()
            .map(|tool| tool.name.clone())
            .collect();
        assert_eq!(
            names,
            ["get_stock_price", "get_time", "get_weather", "search_web"]
        );
        assert!(session.agent().conversation("default").await.is_some());
    }
}
