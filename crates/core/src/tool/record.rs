use serde_json::{Map, Value};
use toolstream_model::{ModelMessage, ToolCallRequest, ToolCallResult};

use super::{Error, ToolResult};

/// The lifecycle of a tool call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CallState {
    /// The call is known but not picked up yet.
    #[default]
    Ready,
    /// The scheduler is running the call.
    Executing,
    /// The tool returned a result.
    Completed,
    /// The call failed, see the result for the reason.
    Failed,
}

/// A tool call of the current turn, along with its outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolCallRecord {
    /// The call id, unique within the conversation.
    pub id: String,
    /// The tool name.
    pub name: String,
    /// The argument text as sent by the model.
    pub raw_arguments: String,
    /// The result text, or the error text if the call failed.
    pub result: Option<String>,
    /// Whether the call succeeded, unset before it finishes.
    pub success: Option<bool>,
    /// The current state.
    pub state: CallState,
}

impl ToolCallRecord {
    /// Creates a record in the `Ready` state.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        raw_arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            raw_arguments: raw_arguments.into(),
            result: None,
            success: None,
            state: CallState::Ready,
        }
    }

    /// Returns the arguments to show to observers.
    ///
    /// Falls back to the raw text as a string value if it is not valid
    /// JSON.
    pub fn arguments(&self) -> Value {
        match self.parse_arguments() {
            Ok(map) => Value::Object(map),
            Err(_) => Value::String(self.raw_arguments.clone()),
        }
    }

    /// Parses the argument text into an argument mapping.
    ///
    /// Empty text stands for no arguments.
    pub fn parse_arguments(&self) -> Result<Map<String, Value>, Error> {
        if self.raw_arguments.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&self.raw_arguments)
            .map_err(|err| Error::invalid_input().with_reason(format!("{err}")))
    }

    /// Returns `true` once the call has finished, either way.
    #[inline]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, CallState::Completed | CallState::Failed)
    }

    /// Assigns the positional fallback id if the model sent none.
    pub(crate) fn ensure_id(&mut self, position: usize) {
        if self.id.is_empty() {
            self.id = format!("tool_{position}");
        }
    }

    #[inline]
    pub(crate) fn start(&mut self) {
        self.state = CallState::Executing;
    }

    pub(crate) fn finish(&mut self, result: ToolResult) {
        match result {
            Ok(output) => {
                trace!("tool call {} completed", self.id);
                self.result = Some(output);
                self.success = Some(true);
                self.state = CallState::Completed;
            }
            Err(err) => {
                warn!("tool call {} ({}) failed: {err}", self.id, self.name);
                self.result = Some(err.to_message(&self.name));
                self.success = Some(false);
                self.state = CallState::Failed;
            }
        }
    }

    /// Returns the call as recorded in an assistant message.
    pub fn to_request(&self) -> ToolCallRequest {
        let arguments = if self.raw_arguments.trim().is_empty() {
            "{}".to_owned()
        } else {
            self.raw_arguments.clone()
        };
        ToolCallRequest {
            id: self.id.clone(),
            name: self.name.clone(),
            arguments,
        }
    }

    /// Returns the tool message answering this call.
    pub fn to_message(&self) -> ModelMessage {
        ModelMessage::Tool(ToolCallResult {
            id: self.id.clone(),
            content: self.result.clone().unwrap_or_default(),
        })
    }
}
