use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request to be sent to the model provider.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelRequest {
    /// The input messages, in causal order.
    pub messages: Vec<ModelMessage>,
    /// Tools that are available to the model.
    pub tools: Vec<ModelTool>,
}

/// The role of a message author.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// The user.
    User,
    /// The model.
    Assistant,
    /// A tool call result.
    Tool,
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ModelMessage {
    /// The system instructions.
    System {
        /// The instruction text.
        content: String,
    },
    /// A user input text.
    User {
        /// The input text.
        content: String,
    },
    /// An assistant response, optionally requesting tool calls.
    Assistant(AssistantMessage),
    /// A tool call result.
    Tool(ToolCallResult),
}

impl ModelMessage {
    /// Creates a system message.
    #[inline]
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self::System {
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Creates an assistant message without tool calls.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self::Assistant(AssistantMessage {
            content: content.into(),
            tool_calls: vec![],
        })
    }

    /// Returns the role of this message.
    pub fn role(&self) -> Role {
        match self {
            ModelMessage::System { .. } => Role::System,
            ModelMessage::User { .. } => Role::User,
            ModelMessage::Assistant(_) => Role::Assistant,
            ModelMessage::Tool(_) => Role::Tool,
        }
    }

    /// Returns the text content of this message.
    pub fn content(&self) -> &str {
        match self {
            ModelMessage::System { content } | ModelMessage::User { content } => {
                content
            }
            ModelMessage::Assistant(msg) => &msg.content,
            ModelMessage::Tool(result) => &result.content,
        }
    }

    /// Returns the tool calls requested by this message.
    ///
    /// Always empty for messages other than assistant messages.
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        match self {
            ModelMessage::Assistant(msg) => &msg.tool_calls,
            _ => &[],
        }
    }

    /// Returns the id of the tool call this message answers, if it is a
    /// tool message.
    pub fn tool_call_ref(&self) -> Option<&str> {
        match self {
            ModelMessage::Tool(result) => Some(&result.id),
            _ => None,
        }
    }
}

/// A message produced by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// The streamed text.
    pub content: String,
    /// Tool calls requested along with the text, in slot order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Describes a tool call request from the model, as recorded in the
/// conversation history.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The arguments exactly as the model produced them, which should be
    /// a JSON object.
    pub arguments: String,
}

/// The result of calling a tool.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The unique identifier for the tool call request.
    #[serde(rename = "tool_call_id")]
    pub id: String,
    /// The result of the tool call, or the error text if it failed.
    pub content: String,
}

/// Describes a tool that can be used by the model.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ModelTool {
    /// Name of the tool.
    pub name: String,
    /// Description of the tool.
    pub description: String,
    /// Parameters definition of the tool.
    ///
    /// For most model providers, the parameters should typically be
    /// defined by a [JSON schema](https://json-schema.org/).
    pub parameters: Value,
}
