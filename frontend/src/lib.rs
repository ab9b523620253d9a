//! Learning Flows
//!
//! Reactive value streams for screen state: cold and hot flows, latest-value
//! holders, a dispatcher that lets a slow consumer pick how it falls behind,
//! and scopes that stop all of it when a screen goes away.

pub mod actors;
pub mod config;
pub mod dataflow;
pub mod error;

pub use error::{ConfigError, RelayError, SquareOverflow, TaskError};
