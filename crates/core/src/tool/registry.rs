use std::collections::BTreeMap;
use std::sync::Arc;

use toolstream_model::ModelTool;

use super::object::{BlockingToolObjectImpl, ToolObjectImpl};
use super::{BlockingTool, Tool, ToolObject};

/// A set of tools, looked up by name.
#[derive(Clone, Default)]
pub struct Registry {
    tools: BTreeMap<String, Arc<dyn ToolObject>>,
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an asynchronous tool.
    #[inline]
    pub fn register<T: Tool>(&mut self, tool: T) {
        self.insert(Arc::new(ToolObjectImpl(tool)));
    }

    /// Registers a tool whose body runs on the blocking thread pool.
    #[inline]
    pub fn register_blocking<T: BlockingTool>(&mut self, tool: T) {
        self.insert(Arc::new(BlockingToolObjectImpl(tool)));
    }

    fn insert(&mut self, tool: Arc<dyn ToolObject>) {
        let name = tool.name().to_owned();
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!("tool {name} is registered twice, the last one wins");
        }
    }

    /// Returns the tool registered under `name`.
    #[inline]
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn ToolObject>> {
        self.tools.get(name).cloned()
    }

    /// Returns the definitions of all tools, sorted by name.
    pub fn definitions(&self) -> Vec<ModelTool> {
        self.tools.values().map(|tool| tool.definition()).collect()
    }

    /// Returns the number of registered tools.
    #[inline]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tool is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
