use serde::{Deserialize, Serialize};
use toolstream_model::ToolCallDelta;

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
    #[serde(rename = "tool_call_delta")]
    ToolCallDelta(ToolCallDelta),
    /// The connection breaks at this point, and the response fails.
    #[serde(rename = "disconnect")]
    Disconnect,
}

impl PresetEvent {
    /// Creates a text fragment.
    #[inline]
    pub fn message<S: Into<String>>(text: S) -> Self {
        Self::MessageDelta(text.into())
    }

    /// Creates the opening fragment of a tool call, carrying its id and
    /// name but no arguments yet.
    #[inline]
    pub fn tool_call_start<S1: Into<String>, S2: Into<String>>(
        index: u32,
        id: S1,
        name: S2,
    ) -> Self {
        Self::ToolCallDelta(ToolCallDelta {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments: None,
        })
    }

    /// Creates a fragment that appends argument text to a slot.
    #[inline]
    pub fn tool_call_arguments<S: Into<String>>(index: u32, text: S) -> Self {
        Self::ToolCallDelta(ToolCallDelta {
            index,
            id: None,
            name: None,
            arguments: Some(text.into()),
        })
    }

    /// Creates a single fragment carrying a whole tool call.
    #[inline]
    pub fn tool_call<S1, S2, S3>(index: u32, id: S1, name: S2, args: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::ToolCallDelta(ToolCallDelta {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments: Some(args.into()),
        })
    }
}

/// The preset response for an assistant step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request will fail in the first `failure` attempts.
    /// `Some(0)` means the request will fail infinitely.
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failures: None,
        }
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    #[inline]
    pub(crate) fn has_tool_call(&self) -> bool {
        self.events
            .iter()
            .any(|event| matches!(event, PresetEvent::ToolCallDelta(_)))
    }
}
