//! A set of demo tools backed by canned data, handy to watch the
//! orchestrator interleave tool calls with the model output.

mod search;
mod stock;
mod time;
mod weather;

pub use search::SearchWebTool;
pub use stock::StockPriceTool;
pub use time::TimeTool;
pub use weather::WeatherTool;
