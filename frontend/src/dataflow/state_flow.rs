//! Single-slot holder of the most recent value.
//!
//! [`MutableStateFlow`] is the writer side owned by a component,
//! [`StateFlow`] the read-only view handed to renderers. Both are backed by a
//! `tokio::sync::watch` cell, so the holder is never empty and slow readers
//! only ever see the newest value.

use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;

/// Writable latest-value holder.
#[derive(Debug)]
pub struct MutableStateFlow<T> {
    sender: Arc<watch::Sender<T>>,
}

impl<T> Clone for MutableStateFlow<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

impl<T> MutableStateFlow<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(initial: T) -> Self {
        let (sender, _receiver) = watch::channel(initial);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.sender.borrow().clone()
    }

    /// Overwrite the value and notify every reader.
    pub fn set(&self, value: T) {
        self.sender.send_replace(value);
    }

    /// Mutate in place and notify every reader.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.sender.send_modify(f);
    }

    /// Read-only view for observers.
    pub fn as_state_flow(&self) -> StateFlow<T> {
        StateFlow {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscribe(&self) -> BoxStream<'static, T> {
        self.as_state_flow().subscribe()
    }
}

impl<T> MutableStateFlow<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Overwrite only if the value differs; returns whether it changed.
    pub fn set_neq(&self, value: T) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }
}

/// Read-only view of a [`MutableStateFlow`].
#[derive(Debug, Clone)]
pub struct StateFlow<T> {
    receiver: watch::Receiver<T>,
}

impl<T> StateFlow<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn get(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// The current value first, then every later change.
    ///
    /// Changes made while the reader is busy collapse into the newest one.
    /// The stream ends once every writer has been dropped.
    pub fn subscribe(&self) -> BoxStream<'static, T> {
        let mut receiver = self.receiver.clone();
        let current = receiver.borrow_and_update().clone();
        stream::once(async move { current })
            .chain(stream::unfold(receiver, |mut receiver| async move {
                receiver.changed().await.ok()?;
                let value = receiver.borrow_and_update().clone();
                Some((value, receiver))
            }))
            .boxed()
    }

    /// Wait until the held value satisfies `predicate` and return it.
    ///
    /// Returns `None` if every writer is dropped first.
    pub async fn wait_for(&self, predicate: impl FnMut(&T) -> bool) -> Option<T> {
        let mut receiver = self.receiver.clone();
        let value = receiver.wait_for(predicate).await.ok()?.clone();
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::time::Duration;

    #[test]
    fn always_holds_a_value() {
        let counter = MutableStateFlow::new(0);
        let view = counter.as_state_flow();
        assert_eq!(view.get(), 0);

        counter.set(3);
        counter.update(|v| *v += 1);
        assert_eq!(view.get(), 4);
        assert_eq!(counter.get(), 4);
    }

    #[tokio::test]
    async fn subscribers_start_with_the_current_value() {
        let status = MutableStateFlow::new("idle".to_string());
        status.set("busy".to_string());

        let mut updates = status.subscribe();
        assert_eq!(updates.next().await.as_deref(), Some("busy"));

        status.set("done".to_string());
        assert_eq!(updates.next().await.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn slow_readers_only_see_the_newest_value() {
        let holder = MutableStateFlow::new(0);
        let mut updates = holder.subscribe();
        assert_eq!(updates.next().await, Some(0));

        for v in 1..=5 {
            holder.set(v);
        }
        assert_eq!(updates.next().await, Some(5));
        assert!(updates.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn set_neq_skips_equal_values() {
        let holder = MutableStateFlow::new(1);
        let mut updates = holder.subscribe();
        assert_eq!(updates.next().await, Some(1));

        assert!(!holder.set_neq(1));
        assert!(updates.next().now_or_never().is_none());

        assert!(holder.set_neq(2));
        assert_eq!(updates.next().await, Some(2));
    }

    #[tokio::test]
    async fn stream_ends_when_writer_is_dropped() {
        let holder = MutableStateFlow::new(7);
        let mut updates = holder.subscribe();
        drop(holder);

        assert_eq!(updates.next().await, Some(7));
        assert_eq!(updates.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_resolves_on_matching_value() {
        let holder = MutableStateFlow::new(0);
        let view = holder.as_state_flow();

        let writer = holder.clone();
        tokio::spawn(async move {
            for v in 1..=3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
                writer.set(v);
            }
        });

        assert_eq!(view.wait_for(|v| *v == 3).await, Some(3));
    }
}
