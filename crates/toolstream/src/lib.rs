//! An out-of-the-box agent that streams tool calls with a set of demo tools.
//!
//! The crate includes a CLI tool for using in the terminal. And you can also
//! use it as a library to bring the orchestrator into your own host apps.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod session;
pub mod tools;

pub use session::{Session, SessionBuilder};

/// Re-exports of [`toolstream_core`] crate.
pub mod core {
    pub use toolstream_core::*;
}
