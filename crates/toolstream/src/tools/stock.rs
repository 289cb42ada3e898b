use std::time::Duration;

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::sleep;
use toolstream_core::tool::{Tool, ToolResult};

const LATENCY: Duration = Duration::from_millis(800);

#[derive(Deserialize, JsonSchema)]
pub struct StockPriceParameters {
    #[schemars(description = "Ticker symbol, e.g. \"AAPL\".")]
    symbol: String,
}

/// A tool that quotes the (simulated) price of a stock.
pub struct StockPriceTool {
    parameter_schema: Value,
}

impl StockPriceTool {
    /// Creates a new stock price tool.
    #[inline]
    pub fn new() -> Self {
        StockPriceTool {
            parameter_schema: schema_for!(StockPriceParameters).to_value(),
        }
    }
}

impl Default for StockPriceTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for StockPriceTool {
    type Input = StockPriceParameters;

    fn name(&self) -> &str {
        "get_stock_price"
    }

    fn description(&self) -> &str {
        "Get the current stock price for a ticker symbol."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    #[allow(clippy::manual_async_fn)]
    fn execute(
        &self,
        input: StockPriceParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        async move {
            sleep(LATENCY).await;
            let quote = quote(&input.symbol).unwrap_or("Symbol not found");
            Ok(format!("{}: {quote}", input.symbol))
        }
    }
}

fn quote(symbol: &str) -> Option<&'static str> {
    match symbol.to_uppercase().as_str() {
        "AAPL" => Some("$150.25 (+2.1%)"),
        "GOOGL" => Some("$2,245.80 (-0.5%)"),
        "MSFT" => Some("$305.15 (+1.2%)"),
        "TSLA" => Some("$195.40 (+3.8%)"),
        _ => None,
    }
}
