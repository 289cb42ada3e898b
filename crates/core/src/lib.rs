//! Core logic of the streaming tool-call orchestrator, including the turn
//! state machine, tool scheduling, call assembly and configurations.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod assembler;
mod config;
pub mod conversation;
pub mod event;
mod model_client;
pub mod tool;

pub use agent::{Agent, AgentBuilder, TurnOptions};
pub use config::{AgentConfig, AgentConfigBuilder};
pub use event::{ErrorCode, Event, TurnEvents};
