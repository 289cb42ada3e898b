use std::time::{Duration, SystemTime, UNIX_EPOCH};

use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;
use toolstream_core::tool::{BlockingTool, Error as ToolError, ToolResult};

const LATENCY: Duration = Duration::from_millis(300);

const TIMEZONES: &[(&str, i64)] = &[
    ("UTC", 0),
    ("GMT", 0),
    ("EST", -5),
    ("PST", -8),
    ("JST", 9),
    ("AEST", 10),
];

#[derive(Deserialize, JsonSchema)]
pub struct TimeParameters {
    #[schemars(
        description = "Timezone abbreviation, one of UTC, GMT, EST, PST, JST \
                       and AEST. Defaults to UTC."
    )]
    timezone: Option<String>,
}

/// A tool that tells the current wall-clock time in a timezone.
///
/// The body is synchronous and runs on the blocking thread pool.
pub struct TimeTool {
    parameter_schema: Value,
}

impl TimeTool {
    /// Creates a new time tool.
    #[inline]
    pub fn new() -> Self {
        TimeTool {
            parameter_schema: schema_for!(TimeParameters).to_value(),
        }
    }
}

impl Default for TimeTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl BlockingTool for TimeTool {
    type Input = TimeParameters;

    fn name(&self) -> &str {
        "get_time"
    }

    fn description(&self) -> &str {
        "Get the current time in a specific timezone."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn execute(&self, input: TimeParameters) -> ToolResult {
        std::thread::sleep(LATENCY);
        let timezone = input.timezone.as_deref().unwrap_or("UTC");
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map_err(|err| {
            ToolError::execution_error().with_reason(err.to_string())
        })?;
        format_time(timezone, now.as_secs())
    }
}

fn format_time(timezone: &str, unix_secs: u64) -> ToolResult {
    let Some(&(_, offset)) = TIMEZONES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(timezone))
    else {
        return Err(ToolError::invalid_input()
            .with_reason(format!("Unknown timezone: {timezone}")));
    };
    let secs_of_day = (unix_secs as i64 + offset * 3600).rem_euclid(86_400);
    let (hour, minute) = (secs_of_day / 3600, secs_of_day % 3600 / 60);
    Ok(format!(
        "Current time in {}: {hour:02}:{minute:02}",
        timezone.to_uppercase()
    ))
}
