//! Hot broadcast flow with a replay history.
//!
//! Values are emitted whether or not anyone is listening. Each subscriber
//! gets its own unbounded queue, primed with the replay history at the
//! moment it subscribed, so a slow subscriber never holds back the emitter
//! or the other subscribers.

use super::replay_buffer::ReplayBuffer;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use futures::stream::{BoxStream, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

struct SharedState<T> {
    replay: ReplayBuffer<T>,
    subscribers: Vec<UnboundedSender<T>>,
}

/// Writable hot flow.
pub struct MutableSharedFlow<T> {
    state: Arc<Mutex<SharedState<T>>>,
}

impl<T> Clone for MutableSharedFlow<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> std::fmt::Debug for MutableSharedFlow<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("MutableSharedFlow")
            .field("replay_len", &state.replay.len())
            .field("replay_capacity", &state.replay.capacity())
            .field("subscribers", &state.subscribers.len())
            .finish()
    }
}

fn lock<T>(state: &Mutex<SharedState<T>>) -> MutexGuard<'_, SharedState<T>> {
    // No user code runs under this lock; a poisoned state is still consistent.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> MutableSharedFlow<T>
where
    T: Clone + Send + 'static,
{
    /// Create a flow that replays up to `replay` past values to new subscribers.
    pub fn new(replay: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SharedState {
                replay: ReplayBuffer::new(replay),
                subscribers: Vec::new(),
            })),
        }
    }

    /// Broadcast a value; returns how many live subscribers received it.
    pub fn emit(&self, value: T) -> usize {
        let mut state = lock(&self.state);
        state
            .subscribers
            .retain(|subscriber| subscriber.unbounded_send(value.clone()).is_ok());
        state.replay.push(value);
        state.subscribers.len()
    }

    /// Independent stream: the replay history first, then live values.
    pub fn subscribe(&self) -> BoxStream<'static, T> {
        let (sender, receiver) = unbounded();
        let mut state = lock(&self.state);
        for value in state.replay.iter() {
            // The receiver is still in scope, the send cannot fail.
            let _ = sender.unbounded_send(value.clone());
        }
        state.subscribers.push(sender);
        log::trace!(
            "shared flow subscriber added ({} replayed, {} subscribers)",
            state.replay.len(),
            state.subscribers.len()
        );
        receiver.boxed()
    }

    pub fn replay_cache(&self) -> Vec<T> {
        lock(&self.state).replay.snapshot()
    }

    pub fn subscription_count(&self) -> usize {
        let mut state = lock(&self.state);
        state.subscribers.retain(|subscriber| !subscriber.is_closed());
        state.subscribers.len()
    }

    pub fn reset_replay_cache(&self) {
        lock(&self.state).replay.clear();
    }

    pub fn as_shared_flow(&self) -> SharedFlow<T> {
        SharedFlow {
            inner: self.clone(),
        }
    }
}

/// Read-only view of a [`MutableSharedFlow`].
pub struct SharedFlow<T> {
    inner: MutableSharedFlow<T>,
}

impl<T> Clone for SharedFlow<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> SharedFlow<T>
where
    T: Clone + Send + 'static,
{
    pub fn subscribe(&self) -> BoxStream<'static, T> {
        self.inner.subscribe()
    }

    pub fn replay_cache(&self) -> Vec<T> {
        self.inner.replay_cache()
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.subscription_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[tokio::test]
    async fn late_subscriber_gets_last_five_in_order() {
        let flow = MutableSharedFlow::new(5);
        for v in 1..=7 {
            flow.emit(v);
        }

        let mut late = flow.as_shared_flow().subscribe();
        let replayed: Vec<i32> = late.by_ref().take(5).collect().await;

        assert_eq!(replayed, vec![3, 4, 5, 6, 7]);
        assert!(late.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn without_replay_values_before_subscription_are_lost() {
        let flow = MutableSharedFlow::new(0);
        assert_eq!(flow.emit(1), 0);

        let mut subscriber = flow.subscribe();
        flow.emit(2);

        assert_eq!(subscriber.next().await, Some(2));
        assert!(subscriber.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_live_value() {
        let flow = MutableSharedFlow::new(1);
        let mut first = flow.subscribe();
        let mut second = flow.subscribe();

        assert_eq!(flow.emit("a"), 2);
        assert_eq!(flow.emit("b"), 2);

        assert_eq!(first.next().await, Some("a"));
        assert_eq!(first.next().await, Some("b"));
        assert_eq!(second.next().await, Some("a"));
        assert_eq!(second.next().await, Some("b"));
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let flow = MutableSharedFlow::new(2);
        let keep = flow.subscribe();
        let gone = flow.subscribe();
        assert_eq!(flow.subscription_count(), 2);

        drop(gone);
        assert_eq!(flow.emit(1), 1);
        assert_eq!(flow.subscription_count(), 1);
        drop(keep);
        assert_eq!(flow.subscription_count(), 0);
    }

    #[test]
    fn replay_cache_can_be_reset() {
        let flow = MutableSharedFlow::new(3);
        flow.emit(1);
        flow.emit(2);
        assert_eq!(flow.as_shared_flow().replay_cache(), vec![1, 2]);

        flow.reset_replay_cache();
        assert!(flow.replay_cache().is_empty());
    }
}
