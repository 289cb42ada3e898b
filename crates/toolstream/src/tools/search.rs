use std::time::Duration;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use toolstream_core::tool::{Tool, ToolResult};

const LATENCY: Duration = Duration::from_millis(1500);

const RESULTS: &[(&str, &str)] = &[
    ("python", "Python is a high-level programming language..."),
    ("weather", "Weather information can be found on weather.com..."),
    ("news", "Latest news updates available on news websites..."),
];

#[derive(Deserialize, JsonSchema)]
pub struct SearchWebParameters {
    #[schemars(description = "The search query.")]
    query: String,
}

/// A tool that searches the web, answering from a few canned results.
pub struct SearchWebTool {
    parameter_schema: Value,
}

impl SearchWebTool {
    /// Creates a new web search tool.
    #[inline]
    pub fn new() -> Self {
        SearchWebTool {
            parameter_schema: schema_for!(SearchWebParameters).to_value(),
        }
    }
}

impl Default for SearchWebTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for SearchWebTool {
    type Input = SearchWebParameters;

    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Search the web for information."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: SearchWebParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            sleep(LATENCY).await;
            Ok(search(&input.query))
        }
    }
}

fn search(query: &str) -> String {
    let lowered = query.to_lowercase();
    let found = RESULTS
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map_or("No specific results found", |(_, result)| result);
    format!("Search results for '{query}': {found}")
}
