//! Value Stream Dispatcher.
//!
//! Delivers the values of a stream to a (possibly slow) consumer under one
//! of the [`DispatchPolicy`] variants:
//!
//! - `Sequential`: the next value is only pulled once the consumer is done
//!   with the previous one.
//! - `Buffered`: producer and consumer run concurrently, joined by a bounded
//!   queue. Nothing is dropped and order is kept.
//! - `Conflated`: one pending slot; a newer value replaces an unconsumed one.
//! - `LatestOnly`: a newer value cancels the consumer's in-flight call.
//!
//! Producer and consumer always run inside the caller's task, so cancelling
//! the task that awaits [`dispatch`] tears down both sides at once.
//!
//! A consumer call that is already running when the stream ends always runs
//! to completion. The first consumer error stops the dispatch and is
//! returned as-is.

use futures::stream::{Stream, StreamExt};
use shared::DispatchPolicy;
use std::future::Future;
use std::pin::pin;
use std::sync::{Mutex, PoisonError};
use tokio::sync::{Notify, mpsc};

/// What happened to the values of one dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Consumer calls that ran to completion.
    pub delivered: usize,
    /// Values replaced in the conflation slot before the consumer saw them.
    pub dropped: usize,
    /// Consumer calls cut short by a newer value.
    pub cancelled: usize,
}

/// Drive `stream` into `consumer` under `policy`.
pub async fn dispatch<S, F, Fut, E>(
    stream: S,
    policy: DispatchPolicy,
    consumer: F,
) -> Result<DispatchStats, E>
where
    S: Stream,
    F: FnMut(S::Item) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    log::trace!("dispatch started ({policy})");
    let stats = match policy {
        DispatchPolicy::Sequential => sequential(stream, consumer).await,
        DispatchPolicy::Buffered { capacity } => buffered(stream, capacity, consumer).await,
        DispatchPolicy::Conflated => conflated(stream, consumer).await,
        DispatchPolicy::LatestOnly => latest_only(stream, consumer).await,
    }?;
    log::debug!(
        "dispatch finished ({policy}): {} delivered, {} dropped, {} cancelled",
        stats.delivered,
        stats.dropped,
        stats.cancelled
    );
    Ok(stats)
}

/// Method form of [`dispatch`].
pub trait DispatchExt: Stream + Sized {
    fn dispatch<F, Fut, E>(
        self,
        policy: DispatchPolicy,
        consumer: F,
    ) -> impl Future<Output = Result<DispatchStats, E>>
    where
        F: FnMut(Self::Item) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        dispatch(self, policy, consumer)
    }
}

impl<S: Stream> DispatchExt for S {}

async fn sequential<S, F, Fut, E>(stream: S, mut consumer: F) -> Result<DispatchStats, E>
where
    S: Stream,
    F: FnMut(S::Item) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let mut stream = pin!(stream);
    let mut stats = DispatchStats::default();
    while let Some(value) = stream.next().await {
        consumer(value).await?;
        stats.delivered += 1;
    }
    Ok(stats)
}

async fn buffered<S, F, Fut, E>(
    stream: S,
    capacity: usize,
    mut consumer: F,
) -> Result<DispatchStats, E>
where
    S: Stream,
    F: FnMut(S::Item) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    // A zero-slot queue cannot hand anything over; one slot is the rendezvous.
    let (sender, mut receiver) = mpsc::channel(capacity.max(1));

    let producer = async move {
        let mut stream = pin!(stream);
        while let Some(value) = stream.next().await {
            if sender.send(value).await.is_err() {
                break;
            }
        }
    };

    let consumer_loop = async move {
        let mut stats = DispatchStats::default();
        while let Some(value) = receiver.recv().await {
            consumer(value).await?;
            stats.delivered += 1;
        }
        Ok(stats)
    };

    run_until_consumer_done(producer, consumer_loop).await
}

struct ConflatedSlot<T> {
    pending: Option<T>,
    dropped: usize,
    closed: bool,
}

async fn conflated<S, F, Fut, E>(stream: S, mut consumer: F) -> Result<DispatchStats, E>
where
    S: Stream,
    F: FnMut(S::Item) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let slot = Mutex::new(ConflatedSlot {
        pending: None,
        dropped: 0,
        closed: false,
    });
    let wake = Notify::new();

    let producer = async {
        let mut stream = pin!(stream);
        while let Some(value) = stream.next().await {
            {
                let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.pending.replace(value).is_some() {
                    slot.dropped += 1;
                    log::trace!("conflated: replaced an unconsumed value");
                }
            }
            wake.notify_one();
        }
        slot.lock().unwrap_or_else(PoisonError::into_inner).closed = true;
        wake.notify_one();
    };

    let consumer_loop = async {
        let mut stats = DispatchStats::default();
        loop {
            let next = {
                let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
                match slot.pending.take() {
                    Some(value) => Some(value),
                    None if slot.closed => break,
                    None => None,
                }
            };
            match next {
                Some(value) => {
                    consumer(value).await?;
                    stats.delivered += 1;
                }
                None => wake.notified().await,
            }
        }
        Ok(stats)
    };

    let mut stats = run_until_consumer_done(producer, consumer_loop).await?;
    stats.dropped = slot.lock().unwrap_or_else(PoisonError::into_inner).dropped;
    Ok(stats)
}

enum LatestStep<T, R> {
    Arrived(Option<T>),
    Finished(R),
}

async fn latest_only<S, F, Fut, E>(stream: S, mut consumer: F) -> Result<DispatchStats, E>
where
    S: Stream,
    F: FnMut(S::Item) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let mut stream = pin!(stream);
    let mut stats = DispatchStats::default();
    let mut in_flight: Option<std::pin::Pin<Box<Fut>>> = None;

    loop {
        let step = match in_flight.as_mut() {
            Some(current) => {
                tokio::select! {
                    biased;
                    next = stream.next() => LatestStep::Arrived(next),
                    result = current => LatestStep::Finished(result),
                }
            }
            None => LatestStep::Arrived(stream.next().await),
        };

        match step {
            LatestStep::Arrived(Some(value)) => {
                if in_flight.take().is_some() {
                    stats.cancelled += 1;
                    log::trace!("latest-only: cancelled in-flight consumer call");
                }
                in_flight = Some(Box::pin(consumer(value)));
            }
            LatestStep::Arrived(None) => {
                if let Some(current) = in_flight.take() {
                    current.await?;
                    stats.delivered += 1;
                }
                return Ok(stats);
            }
            LatestStep::Finished(result) => {
                in_flight = None;
                result?;
                stats.delivered += 1;
            }
        }
    }
}

/// Run producer and consumer side by side in the current task.
///
/// The consumer loop only ends early on error; the producer is then dropped
/// wherever it is suspended. A finished producer leaves the consumer to
/// drain what is queued.
async fn run_until_consumer_done<P, C, E>(producer: P, consumer_loop: C) -> Result<DispatchStats, E>
where
    P: Future<Output = ()>,
    C: Future<Output = Result<DispatchStats, E>>,
{
    let mut producer = pin!(producer);
    let mut consumer_loop = pin!(consumer_loop);
    tokio::select! {
        biased;
        result = &mut consumer_loop => return result,
        () = &mut producer => {}
    }
    consumer_loop.await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::{Emission, Flow};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::{Instant, sleep};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Started(&'static str),
        Finished(&'static str),
    }

    fn abc_flow() -> Flow<&'static str> {
        // B and C both arrive while A is still being consumed.
        Flow::from_schedule([
            Emission::new(Duration::from_millis(100), "A"),
            Emission::new(Duration::from_millis(100), "B"),
            Emission::new(Duration::from_millis(100), "C"),
        ])
    }

    async fn run(
        flow: &Flow<&'static str>,
        policy: DispatchPolicy,
        work: Duration,
    ) -> (DispatchStats, Vec<Event>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&events);
        let stats = dispatch(flow.stream(), policy, move |value| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(Event::Started(value));
                sleep(work).await;
                log.lock().unwrap().push(Event::Finished(value));
                Ok::<_, std::convert::Infallible>(())
            }
        })
        .await
        .unwrap();
        let events = events.lock().unwrap().clone();
        (stats, events)
    }

    fn finished(events: &[Event]) -> Vec<&'static str> {
        events
            .iter()
            .filter_map(|event| match event {
                Event::Finished(value) => Some(*value),
                Event::Started(_) => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn sequential_delivers_everything_in_order_and_paces_the_producer() {
        let flow = Flow::every(Duration::from_millis(100), 1..=5);
        let started = Instant::now();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let stats = flow
            .stream()
            .dispatch(DispatchPolicy::Sequential, move |value| {
                let sink = Arc::clone(&sink);
                async move {
                    sleep(Duration::from_millis(300)).await;
                    sink.lock().unwrap().push(value);
                    Ok::<_, std::convert::Infallible>(())
                }
            })
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(stats.delivered, 5);
        // Producer waits for the consumer: 5 * (100 + 300).
        assert_eq!(started.elapsed().as_millis(), 2_000);
    }

    #[tokio::test(start_paused = true)]
    async fn buffered_delivers_all_values_in_order_with_no_drops() {
        let flow = Flow::every(Duration::from_millis(100), 1..=5);
        let started = Instant::now();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let stats = dispatch(flow.stream(), DispatchPolicy::buffered(), move |value| {
            let sink = Arc::clone(&sink);
            async move {
                sleep(Duration::from_millis(300)).await;
                sink.lock().unwrap().push(value);
                Ok::<_, std::convert::Infallible>(())
            }
        })
        .await
        .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4, 5]);
        assert_eq!(stats, DispatchStats { delivered: 5, dropped: 0, cancelled: 0 });
        // Producer runs ahead, so only the first delay is on the critical path.
        assert_eq!(started.elapsed().as_millis(), 100 + 5 * 300);
    }

    #[tokio::test(start_paused = true)]
    async fn buffered_with_zero_capacity_still_delivers() {
        let flow = Flow::every(Duration::from_millis(10), ["x", "y", "z"]);
        let (stats, events) =
            run(&flow, DispatchPolicy::Buffered { capacity: 0 }, Duration::from_millis(50)).await;
        assert_eq!(stats.delivered, 3);
        assert_eq!(finished(&events), vec!["x", "y", "z"]);
    }

    #[tokio::test(start_paused = true)]
    async fn conflated_skips_to_the_newest_pending_value() {
        let (stats, events) = run(
            &abc_flow(),
            DispatchPolicy::Conflated,
            Duration::from_millis(500),
        )
        .await;

        assert_eq!(finished(&events), vec!["A", "C"]);
        assert_eq!(
            events,
            vec![
                Event::Started("A"),
                Event::Finished("A"),
                Event::Started("C"),
                Event::Finished("C"),
            ]
        );
        assert_eq!(stats, DispatchStats { delivered: 2, dropped: 1, cancelled: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn conflated_with_a_fast_consumer_sees_everything() {
        let (stats, events) = run(
            &abc_flow(),
            DispatchPolicy::Conflated,
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(finished(&events), vec!["A", "B", "C"]);
        assert_eq!(stats.dropped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn latest_only_interrupts_older_values() {
        let (stats, events) = run(
            &abc_flow(),
            DispatchPolicy::LatestOnly,
            Duration::from_millis(500),
        )
        .await;

        assert_eq!(
            events,
            vec![
                Event::Started("A"),
                Event::Started("B"),
                Event::Started("C"),
                Event::Finished("C"),
            ]
        );
        assert_eq!(stats, DispatchStats { delivered: 1, dropped: 0, cancelled: 2 });
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_work_completes_when_the_stream_ends() {
        let single = Flow::from_values(["only"]);
        for policy in [
            DispatchPolicy::Sequential,
            DispatchPolicy::buffered(),
            DispatchPolicy::Conflated,
            DispatchPolicy::LatestOnly,
        ] {
            let (stats, events) = run(&single, policy, Duration::from_secs(5)).await;
            assert_eq!(stats.delivered, 1, "{policy}");
            assert_eq!(
                events,
                vec![Event::Started("only"), Event::Finished("only")],
                "{policy}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn consumer_error_stops_the_dispatch() {
        for policy in [
            DispatchPolicy::Sequential,
            DispatchPolicy::buffered(),
            DispatchPolicy::Conflated,
            DispatchPolicy::LatestOnly,
        ] {
            // The producer never ends on its own.
            let endless = futures::stream::unfold(0u32, |n| async move {
                sleep(Duration::from_millis(10)).await;
                Some((n, n + 1))
            });

            let result = dispatch(endless, policy, |n| async move {
                if n == 3 { Err(format!("rejected {n}")) } else { Ok(()) }
            })
            .await;

            assert_eq!(result, Err("rejected 3".to_string()), "{policy}");
        }
    }
}
