//! Cold, time-scheduled value streams.
//!
//! A [`Flow`] is only a production schedule. Nothing runs until
//! [`Flow::stream`] is called, and every call starts its own production from
//! the first entry.

use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

/// One scheduled production: wait `delay`, then emit `value`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Emission<T> {
    pub delay: Duration,
    pub value: T,
}

impl<T> Emission<T> {
    pub fn new(delay: Duration, value: T) -> Self {
        Self { delay, value }
    }

    pub fn immediate(value: T) -> Self {
        Self::new(Duration::ZERO, value)
    }
}

/// Cold flow over a fixed schedule.
#[derive(Clone, Debug)]
pub struct Flow<T> {
    schedule: Arc<[Emission<T>]>,
}

impl<T> Flow<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn from_schedule(schedule: impl IntoIterator<Item = Emission<T>>) -> Self {
        Self {
            schedule: schedule.into_iter().collect(),
        }
    }

    /// Emits every value without delay.
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
        Self::from_schedule(values.into_iter().map(Emission::immediate))
    }

    /// Emits `values` with the same `interval` before each one.
    pub fn every(interval: Duration, values: impl IntoIterator<Item = T>) -> Self {
        Self::from_schedule(values.into_iter().map(|value| Emission::new(interval, value)))
    }

    pub fn len(&self) -> usize {
        self.schedule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedule.is_empty()
    }

    /// Start a fresh production of this flow.
    pub fn stream(&self) -> BoxStream<'static, T> {
        let schedule = Arc::clone(&self.schedule);
        stream::iter(0..schedule.len())
            .then(move |index| {
                let Emission { delay, value } = schedule[index].clone();
                async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    value
                }
            })
            .boxed()
    }
}

impl Flow<i64> {
    /// `start`, then one less after every `interval`, ending with zero.
    ///
    /// A non-positive `start` produces just that single value.
    pub fn countdown(start: i64, interval: Duration) -> Self {
        let first = std::iter::once(Emission::immediate(start));
        let rest = (0..start.max(0))
            .rev()
            .map(|value| Emission::new(interval, value));
        Self::from_schedule(first.chain(rest))
    }
}
