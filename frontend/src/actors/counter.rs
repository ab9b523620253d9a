//! Counter domain: a state holder bumped by an explicit user action.

use crate::dataflow::{Actor, Relay, Scope, StateFlow, relay};
use futures::StreamExt;

/// Click counter shown on the second screen.
#[derive(Clone, Debug)]
pub struct Counter {
    /// Number of increments so far, starting at zero
    count: Actor<i64>,

    // === USER EVENTS ===
    /// User pressed the increment button
    pub increment_clicked_relay: Relay<()>,
}

impl Counter {
    pub fn new(scope: &Scope) -> Self {
        let (increment_clicked_relay, mut increment_clicked_stream) = relay();

        let count = Actor::new(scope, 0, async move |state| {
            while increment_clicked_stream.next().await.is_some() {
                state.update(|count| *count += 1);
                log::debug!("counter incremented to {}", state.get());
            }
        });

        Self {
            count,
            increment_clicked_relay,
        }
    }

    pub fn count(&self) -> StateFlow<i64> {
        self.count.signal()
    }
}
