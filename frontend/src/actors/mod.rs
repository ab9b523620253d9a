//! Screen components built on the dataflow primitives
//!
//! Each module here is the state of one demo screen. Components own their
//! state holders and launch their work in the [`Scope`](crate::dataflow::Scope)
//! they are given, so destroying the screen stops everything they started.
//!
//! - **Counter** - latest-value holder bumped by a Relay
//! - **Countdown** - cold timer flow and the basic operators
//! - **Squares** - hot shared flow with a replay history
//! - **Dinner** - one slow consumer under each dispatch policy
//! - **Flattening** - concat / merge / latest flattening
//! - **Connectivity** - network status observed through a trait
//!
//! ## Core Principles
//!
//! 1. **Event-Source Relay Naming** - `{source}_{event}_relay` pattern only
//! 2. **Single Writer** - state is written by the task that owns it
//! 3. **Read-Only Access** - renderers get `StateFlow`/`SharedFlow` views

pub mod connectivity;
pub mod countdown;
pub mod counter;
pub mod dinner;
pub mod flattening;
pub mod squares;

pub use connectivity::{
    ConnectivityDomain, ConnectivityObserver, ProbeTracker, ScriptedConnectivity,
    TcpProbeConnectivity,
};
pub use countdown::{Countdown, CountdownSummary};
pub use counter::Counter;
pub use dinner::{Dinner, DinnerEvent, DinnerReport};
pub use flattening::FlattenMode;
pub use squares::{CollectedSquare, Collector, Squares};
