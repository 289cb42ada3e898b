use std::future::ready;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::{self, JoinError};
use toolstream_model::ModelTool;
use tracing::Instrument;

use super::{BlockingTool, Error, Tool, ToolResult};

/// A type-erased tool held by a [`Registry`](super::Registry).
pub trait ToolObject: Send + Sync + 'static {
    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Deserializes `arguments` into the input of the tool and runs it.
    fn execute(
        self: Arc<Self>,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>>;

    /// Returns the definition advertised to the model.
    fn definition(&self) -> ModelTool {
        ModelTool {
            name: self.name().to_owned(),
            description: self.description().to_owned(),
            parameters: self.parameter_schema().clone(),
        }
    }
}

pub(crate) struct ToolObjectImpl<T: Tool>(pub T);

impl<T: Tool> ToolObject for ToolObjectImpl<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    fn execute(
        self: Arc<Self>,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        let input: T::Input = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(err) => return Box::pin(ready(Err(invalid_input(err)))),
        };
        let span = debug_span!("tool execute", name = self.0.name());
        Box::pin(self.0.execute(input).instrument(span))
    }
}

pub(crate) struct BlockingToolObjectImpl<T: BlockingTool>(pub T);

impl<T: BlockingTool> ToolObject for BlockingToolObjectImpl<T> {
    #[inline]
    fn name(&self) -> &str {
        self.0.name()
    }

    #[inline]
    fn description(&self) -> &str {
        self.0.description()
    }

    #[inline]
    fn parameter_schema(&self) -> &Value {
        self.0.parameter_schema()
    }

    fn execute(
        self: Arc<Self>,
        arguments: Value,
    ) -> Pin<Box<dyn Future<Output = ToolResult> + Send>> {
        let input: T::Input = match serde_json::from_value(arguments) {
            Ok(input) => input,
            Err(err) => return Box::pin(ready(Err(invalid_input(err)))),
        };
        let span = debug_span!("tool execute", name = self.0.name());
        Box::pin(
            async move {
                task::spawn_blocking(move || self.0.execute(input))
                    .await
                    .unwrap_or_else(|err| Err(join_error(err)))
            }
            .instrument(span),
        )
    }
}

#[inline]
fn invalid_input(err: serde_json::Error) -> Error {
    Error::invalid_input().with_reason(format!("{err}"))
}

/// Converts a tool task that did not return into an execution error.
pub(crate) fn join_error(err: JoinError) -> Error {
    if !err.is_panic() {
        return Error::execution_error().with_reason("task was cancelled");
    }
    let payload = err.into_panic();
    let reason = if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_owned()
    };
    Error::execution_error().with_reason(reason)
}
