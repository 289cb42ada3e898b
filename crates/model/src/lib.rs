//! The transport contract between the orchestrator and LLMs.
//!
//! This crate establishes a unified protocol for the agent to talk to
//! various streaming models. A model receives the whole conversation plus
//! the available tool schemas, and answers with a sequence of incremental
//! deltas: text fragments and partial tool call fragments.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to. In particular,
//! reassembling tool call fragments into executable calls is left to the
//! consumer of the response.

#![deny(missing_docs)]

mod error;
mod provider;
mod request;
mod response;

pub use error::*;
pub use provider::*;
pub use request::*;
pub use response::*;
