//! Tool call supports.

mod error;
mod object;
mod record;
mod registry;
mod scheduler;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::{Error, ErrorKind};
pub use object::ToolObject;
pub use record::{CallState, ToolCallRecord};
pub use registry::Registry;
pub use scheduler::{ExecutionMode, Scheduler};

/// The result of a tool call.
pub type ToolResult = Result<String, Error>;

/// A tool that can be called by the model.
///
/// Implementations of this trait should be stateless, and may not maintain any
/// internal state.
///
/// The tool can be context-aware, meaning it can access additional information
/// about the current execution context, such as an API endpoint or the
/// current user. To do this, make the context an immutable state of the tool,
/// which can be set during initialization, and copy it when executing.
pub trait Tool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned + Send + 'static;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    ///
    /// This method must return a future that is fully independent of `self`,
    /// and the future should be cancellation safe. It is dropped when the
    /// call runs out of time.
    fn execute(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = ToolResult> + Send + 'static;
}

/// A tool whose body is synchronous.
///
/// The body runs on the blocking thread pool of the runtime, so it is free
/// to sleep or do blocking I/O. A body that has started is not interrupted
/// by a timeout, only its result is discarded.
pub trait BlockingTool: Send + Sync + 'static {
    /// The type of input that the tool accepts.
    type Input: DeserializeOwned + Send + 'static;

    /// Returns the name of the tool.
    fn name(&self) -> &str;

    /// Returns the description of the tool.
    fn description(&self) -> &str;

    /// Returns the parameter schema of the tool.
    fn parameter_schema(&self) -> &Value;

    /// Executes the tool with the given input.
    fn execute(&self, input: Self::Input) -> ToolResult;
}
