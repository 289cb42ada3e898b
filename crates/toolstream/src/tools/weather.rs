use std::time::Duration;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use toolstream_core::tool::{Tool, ToolResult};

const LATENCY: Duration = Duration::from_secs(1);

#[derive(Deserialize, JsonSchema)]
pub struct WeatherParameters {
    #[schemars(description = "Name of the city, e.g. \"Tokyo\".")]
    city: String,
}

/// A tool that reports the (simulated) current weather of a city.
pub struct WeatherTool {
    parameter_schema: Value,
}

impl WeatherTool {
    /// Creates a new weather tool.
    #[inline]
    pub fn new() -> Self {
        WeatherTool {
            parameter_schema: schema_for!(WeatherParameters).to_value(),
        }
    }
}

impl Default for WeatherTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for WeatherTool {
    type Input = WeatherParameters;

    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a city."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: WeatherParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            sleep(LATENCY).await;
            let weather = lookup(&input.city)
                .unwrap_or("unknown - data not available");
            Ok(format!("The weather in {} is {weather}", input.city))
        }
    }
}

fn lookup(city: &str) -> Option<&'static str> {
    match city {
        "New York" => Some("sunny and 72°F"),
        "London" => Some("cloudy and 59°F"),
        "Tokyo" => Some("rainy and 65°F"),
        "Sydney" => Some("windy and 70°F"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_weather() {
        let tool = WeatherTool::new();
        let input = WeatherParameters {
            city: "Tokyo".to_owned(),
        };
        assert_eq!(
            tool.execute(input).await.unwrap(),
            "The weather in Tokyo is rainy and 65°F"
        );

        let input = WeatherParameters {
            city: "Paris".to_owned(),
        };
        assert_eq!(
            tool.execute(input).await.unwrap(),
            "The weather in Paris is unknown - data not available"
        );
    }

    #[test]
    fn test_schema() {
        let tool = WeatherTool::new();
        let schema = tool.parameter_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["required"][0], "city");
    }
}
