//! Core dataflow primitives for reactive screen state
//!
//! This module holds everything that is independent of any particular
//! screen: value streams, the holders that keep their latest values, the
//! dispatcher that decides how a slow consumer sees them, and the scopes
//! that bound their lifetime.
//!
//! # Core Components
//!
//! - **[`Flow`]** - Cold, time-scheduled value stream
//! - **[`MutableSharedFlow`]** - Hot broadcast stream with a [`ReplayBuffer`]
//! - **[`MutableStateFlow`]** / **[`StateFlow`]** - Latest-value holder
//! - **[`dispatch`]** - Sequential / buffered / conflated / latest-only delivery
//! - **[`Relay`]** - Event input from the host into a component
//! - **[`Actor`]** - State holder with a single writing task
//! - **[`Scope`]** / **[`LifecycleOwner`]** - Cancellation bound to a screen

pub mod actor;
pub mod dispatch;
pub mod flow;
pub mod lifecycle;
pub mod operators;
pub mod relay;
pub mod replay_buffer;
pub mod scope;
pub mod shared_flow;
pub mod state_flow;

pub use actor::Actor;
pub use dispatch::{DispatchExt, DispatchStats, dispatch};
pub use flow::{Emission, Flow};
pub use lifecycle::{LifecycleOwner, LifecycleState, ViewBinding};
pub use relay::{Relay, relay};
pub use replay_buffer::ReplayBuffer;
pub use scope::{Scope, TaskGuard, TaskHandle};
pub use shared::DispatchPolicy;
pub use shared_flow::{MutableSharedFlow, SharedFlow};
pub use state_flow::{MutableStateFlow, StateFlow};
