//! Screen lifecycle and lifecycle-bound collection.
//!
//! A [`LifecycleOwner`] stands for one screen as the host sees it. Its state
//! moves through `Initialized -> Created -> Started -> Resumed` and back, and
//! ends in `Destroyed`, which cancels the owner's [`Scope`].
//!
//! [`LifecycleOwner::repeat_on_lifecycle`] runs a block each time the screen
//! reaches a target state and cancels it when the screen falls below it, so
//! a stopped screen does not keep consuming values it cannot render.

use super::dispatch::dispatch;
use super::scope::{Scope, TaskHandle};
use super::shared_flow::MutableSharedFlow;
use super::state_flow::{MutableStateFlow, StateFlow};
use futures::stream::{BoxStream, Stream, StreamExt};
use shared::DispatchPolicy;
use std::fmt;
use std::future::Future;
use std::pin::pin;

/// Where a screen is in its lifecycle. Ordered: `Destroyed` is the lowest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Destroyed,
    Initialized,
    Created,
    Started,
    Resumed,
}

impl LifecycleState {
    pub fn is_at_least(self, other: LifecycleState) -> bool {
        self >= other
    }
}

/// One screen's lifecycle plus the scope its work runs in.
#[derive(Debug)]
pub struct LifecycleOwner {
    name: String,
    state: MutableStateFlow<LifecycleState>,
    // Every transition in order, the latest one replayed to new listeners.
    transitions: MutableSharedFlow<LifecycleState>,
    scope: Scope,
}

impl LifecycleOwner {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let transitions = MutableSharedFlow::new(1);
        transitions.emit(LifecycleState::Initialized);
        Self {
            scope: Scope::new(name.clone()),
            state: MutableStateFlow::new(LifecycleState::Initialized),
            transitions,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_state(&self) -> LifecycleState {
        self.state.get()
    }

    pub fn state(&self) -> StateFlow<LifecycleState> {
        self.state.as_state_flow()
    }

    /// Scope cancelled when this owner is destroyed.
    pub fn lifecycle_scope(&self) -> &Scope {
        &self.scope
    }

    pub fn on_create(&self) {
        self.move_to(LifecycleState::Created);
    }

    pub fn on_start(&self) {
        self.move_to(LifecycleState::Started);
    }

    pub fn on_resume(&self) {
        self.move_to(LifecycleState::Resumed);
    }

    pub fn on_pause(&self) {
        self.move_to(LifecycleState::Started);
    }

    pub fn on_stop(&self) {
        self.move_to(LifecycleState::Created);
    }

    pub fn on_destroy(&self) {
        self.move_to(LifecycleState::Destroyed);
        self.scope.cancel();
    }

    fn move_to(&self, next: LifecycleState) {
        let previous = self.state.get();
        if previous == LifecycleState::Destroyed {
            log::warn!("'{}' is destroyed, ignoring move to {next:?}", self.name);
            return;
        }
        if self.state.set_neq(next) {
            self.transitions.emit(next);
            log::debug!("'{}' lifecycle {previous:?} -> {next:?}", self.name);
        }
    }

    /// Run `block` every time the lifecycle reaches `target`, cancelling it
    /// whenever the lifecycle drops below `target`.
    ///
    /// # Panics
    ///
    /// Panics if `target` is below `Created`.
    pub fn repeat_on_lifecycle<F, Fut>(&self, target: LifecycleState, mut block: F) -> TaskHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        assert!(
            target >= LifecycleState::Created,
            "repeat_on_lifecycle cannot target {target:?}"
        );
        let mut transitions = self.transitions.subscribe();
        let name = self.name.clone();

        self.scope.launch(async move {
            loop {
                match next_matching(&mut transitions, |state| {
                    state >= target || state == LifecycleState::Destroyed
                })
                .await
                {
                    None | Some(LifecycleState::Destroyed) => return,
                    Some(_) => {}
                }

                log::trace!("'{name}' reached {target:?}, starting block");
                let mut run = pin!(block());
                let interrupted = tokio::select! {
                    () = &mut run => None,
                    below = next_matching(&mut transitions, |state| state < target) => Some(below),
                };
                let below = match interrupted {
                    Some(below) => {
                        log::trace!("'{name}' fell below {target:?}, block cancelled");
                        below
                    }
                    None => next_matching(&mut transitions, |state| state < target).await,
                };
                match below {
                    None | Some(LifecycleState::Destroyed) => return,
                    Some(_) => {}
                }
            }
        })
    }

    /// Collect a fresh stream from `make_stream` while the screen is at least
    /// `Started`, delivering under `policy`.
    ///
    /// Consumer errors end that round of collection and are logged; the next
    /// start begins a new one.
    pub fn collect_lifecycle_flow<M, S, F, Fut, E>(
        &self,
        policy: DispatchPolicy,
        mut make_stream: M,
        consumer: F,
    ) -> TaskHandle
    where
        M: FnMut() -> S + Send + 'static,
        S: Stream + Send + 'static,
        S::Item: Send,
        F: FnMut(S::Item) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let name = self.name.clone();
        self.repeat_on_lifecycle(LifecycleState::Started, move || {
            let stream = make_stream();
            let consumer = consumer.clone();
            let name = name.clone();
            async move {
                if let Err(error) = dispatch(stream, policy, consumer).await {
                    log::error!("'{name}' collection failed: {error}");
                }
            }
        })
    }

    /// [`collect_lifecycle_flow`](Self::collect_lifecycle_flow) where every
    /// new value cancels the previous consumer call.
    pub fn collect_latest_lifecycle_flow<M, S, F, Fut, E>(
        &self,
        make_stream: M,
        consumer: F,
    ) -> TaskHandle
    where
        M: FnMut() -> S + Send + 'static,
        S: Stream + Send + 'static,
        S::Item: Send,
        F: FnMut(S::Item) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        self.collect_lifecycle_flow(DispatchPolicy::LatestOnly, make_stream, consumer)
    }
}

impl Drop for LifecycleOwner {
    fn drop(&mut self) {
        self.scope.cancel();
    }
}

/// Next transition matching `predicate`; transitions are never skipped.
async fn next_matching(
    transitions: &mut BoxStream<'static, LifecycleState>,
    mut predicate: impl FnMut(LifecycleState) -> bool,
) -> Option<LifecycleState> {
    while let Some(state) = transitions.next().await {
        if predicate(state) {
            return Some(state);
        }
    }
    None
}

/// A view reference that only exists between view creation and destruction.
///
/// Reading it outside that window is a programming error and panics.
#[derive(Debug)]
pub struct ViewBinding<T> {
    view: Option<T>,
}

impl<T> ViewBinding<T> {
    pub fn new() -> Self {
        Self { view: None }
    }

    pub fn bind(&mut self, view: T) {
        self.view = Some(view);
    }

    /// Release the view; returns it if one was bound.
    pub fn clear(&mut self) -> Option<T> {
        self.view.take()
    }

    pub fn is_bound(&self) -> bool {
        self.view.is_some()
    }

    #[track_caller]
    pub fn get(&self) -> &T {
        match &self.view {
            Some(view) => view,
            None => panic!("view binding accessed outside of the view lifecycle"),
        }
    }

    #[track_caller]
    pub fn get_mut(&mut self) -> &mut T {
        match &mut self.view {
            Some(view) => view,
            None => panic!("view binding accessed outside of the view lifecycle"),
        }
    }
}

impl<T> Default for ViewBinding<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::Flow;
    use crate::error::TaskError;
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::sleep;

    fn ticks() -> Flow<u32> {
        Flow::every(Duration::from_millis(100), 1..=100)
    }

    #[tokio::test(start_paused = true)]
    async fn collects_only_while_started() {
        let owner = LifecycleOwner::new("second");
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let flow = ticks();
        let task = owner.collect_lifecycle_flow(
            DispatchPolicy::Sequential,
            move || flow.stream(),
            move |value| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push(value);
                    Ok::<_, Infallible>(())
                }
            },
        );

        owner.on_create();
        sleep(Duration::from_millis(500)).await;
        assert!(seen.lock().unwrap().is_empty());

        owner.on_start();
        sleep(Duration::from_millis(350)).await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);

        owner.on_stop();
        sleep(Duration::from_secs(1)).await;
        assert_eq!(seen.lock().unwrap().len(), 3);

        // A restart collects a fresh production from the beginning.
        owner.on_start();
        owner.on_resume();
        sleep(Duration::from_millis(150)).await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 1]);

        owner.on_destroy();
        assert!(owner.lifecycle_scope().is_cancelled());
        assert_eq!(task.join().await, Err(TaskError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn finished_block_waits_for_the_next_start() {
        let owner = LifecycleOwner::new("first");
        let runs = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&runs);
        let _task = owner.repeat_on_lifecycle(LifecycleState::Started, move || {
            let counter = Arc::clone(&counter);
            async move {
                *counter.lock().unwrap() += 1;
            }
        });

        owner.on_start();
        sleep(Duration::from_millis(10)).await;
        owner.on_resume();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(*runs.lock().unwrap(), 1);

        owner.on_stop();
        sleep(Duration::from_millis(10)).await;
        owner.on_start();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(*runs.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_and_start_in_the_same_tick_restarts_the_block() {
        let owner = LifecycleOwner::new("second");
        let runs = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&runs);
        let _task = owner.repeat_on_lifecycle(LifecycleState::Started, move || {
            let counter = Arc::clone(&counter);
            async move {
                *counter.lock().unwrap() += 1;
                std::future::pending::<()>().await;
            }
        });

        owner.on_create();
        owner.on_start();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(*runs.lock().unwrap(), 1);

        owner.on_stop();
        owner.on_start();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(*runs.lock().unwrap(), 2);

        owner.on_destroy();
        sleep(Duration::from_millis(10)).await;
        assert_eq!(owner.lifecycle_scope().active_tasks(), 0);
    }

    #[tokio::test]
    async fn destroyed_owner_ignores_further_events() {
        let owner = LifecycleOwner::new("gone");
        owner.on_create();
        owner.on_destroy();
        owner.on_start();
        assert_eq!(owner.current_state(), LifecycleState::Destroyed);
        assert!(!owner.current_state().is_at_least(LifecycleState::Created));
    }

    #[test]
    fn binding_is_usable_between_bind_and_clear() {
        let mut binding = ViewBinding::new();
        binding.bind(String::from("increment"));
        binding.get_mut().push_str("-label");
        assert_eq!(binding.get(), "increment-label");
        assert_eq!(binding.clear().as_deref(), Some("increment-label"));
        assert!(!binding.is_bound());
    }

    #[test]
    #[should_panic(expected = "outside of the view lifecycle")]
    fn binding_access_after_destroy_panics() {
        let mut binding = ViewBinding::new();
        binding.bind(1u8);
        binding.clear();
        let _ = binding.get();
    }
}
