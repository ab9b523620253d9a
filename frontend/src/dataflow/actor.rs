//! Single-value Actor for screen state
//!
//! Actor owns a [`MutableStateFlow`] and the task that writes it. Events
//! reach the task through Relays; renderers only get the read-only
//! [`StateFlow`].

use super::scope::{Scope, TaskGuard};
use super::state_flow::{MutableStateFlow, StateFlow};
use std::future::Future;
use std::sync::Arc;

/// Reactive state container with exactly one writer.
///
/// # Core Principles
///
/// - **Single Point of Mutation**: only the processor task writes the state
/// - **Sequential Processing**: events are handled one at a time, in order
/// - **Scoped**: the processor runs in the owner's [`Scope`] and stops with it
///
/// # Examples
///
/// ```rust
/// use frontend::dataflow::{Actor, Scope, relay};
/// use futures::StreamExt;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let scope = Scope::new("counter");
/// let (increment_relay, mut increments) = relay::<i64>();
///
/// let counter = Actor::new(&scope, 0, async move |state| {
///     while let Some(amount) = increments.next().await {
///         state.update(|current| *current += amount);
///     }
/// });
///
/// increment_relay.send(5);
/// assert_eq!(counter.signal().wait_for(|v| *v == 5).await, Some(5));
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Actor<T>
where
    T: Clone + Send + Sync + 'static,
{
    state: MutableStateFlow<T>,
    // The processor stops once the last Actor clone is dropped.
    task: Arc<TaskGuard>,
}

impl<T> Actor<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an Actor with its initial state and processing loop.
    ///
    /// `processor` receives the writable state and usually loops over one or
    /// more relay streams.
    pub fn new<F, Fut>(scope: &Scope, initial_state: T, processor: F) -> Self
    where
        F: FnOnce(MutableStateFlow<T>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let state = MutableStateFlow::new(initial_state);
        let task = scope.launch(processor(state.clone())).into_guard();
        Self {
            state,
            task: Arc::new(task),
        }
    }

    /// Read-only view of the state; the way renderers observe this Actor.
    pub fn signal(&self) -> StateFlow<T> {
        self.state.as_state_flow()
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}
