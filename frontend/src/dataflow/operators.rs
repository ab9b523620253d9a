//! Stream operators the `futures` combinators do not cover directly.
//!
//! Intermediate operators (`filter`, `map`, `inspect`) and `fold` come
//! straight from [`StreamExt`]; this module adds the terminal `reduce` and
//! `count_matching` and the three flattening strategies.

use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::future::ready;

/// Combine all values left to right, seeding with the first one.
///
/// Returns `None` for an empty stream.
pub async fn reduce<S, F>(stream: S, mut combine: F) -> Option<S::Item>
where
    S: Stream,
    F: FnMut(S::Item, S::Item) -> S::Item,
{
    stream
        .fold(None, |accumulator, value| {
            ready(Some(match accumulator {
                Some(accumulator) => combine(accumulator, value),
                None => value,
            }))
        })
        .await
}

/// Number of values satisfying `predicate`.
pub async fn count_matching<S, P>(stream: S, mut predicate: P) -> usize
where
    S: Stream,
    P: FnMut(&S::Item) -> bool,
{
    stream
        .fold(0, |count, value| ready(if predicate(&value) { count + 1 } else { count }))
        .await
}

/// Run each inner stream to completion before starting the next.
pub fn flat_map_concat<S, F, U>(outer: S, transform: F) -> BoxStream<'static, U::Item>
where
    S: Stream + Send + 'static,
    F: FnMut(S::Item) -> U + Send + 'static,
    U: Stream + Send + 'static,
{
    outer.map(transform).flatten().boxed()
}

/// Run every inner stream concurrently, interleaving their values.
pub fn flat_map_merge<S, F, U>(outer: S, mut transform: F) -> BoxStream<'static, U::Item>
where
    S: Stream + Send + 'static,
    F: FnMut(S::Item) -> U + Send + 'static,
    U: Stream + Send + 'static,
    U::Item: Send + 'static,
{
    outer
        .map(move |value| transform(value).boxed())
        .flatten_unordered(None)
        .boxed()
}

enum Switch<O, I> {
    Outer(Option<O>),
    Inner(Option<I>),
}

/// Follow only the inner stream of the newest outer value.
///
/// A new outer value drops the current inner stream on the spot.
pub fn flat_map_latest<S, F, U>(outer: S, transform: F) -> BoxStream<'static, U::Item>
where
    S: Stream + Send + 'static,
    S::Item: Send,
    F: FnMut(S::Item) -> U + Send + 'static,
    U: Stream + Send + 'static,
    U::Item: Send + 'static,
{
    struct State<O, F, I> {
        outer: Option<O>,
        inner: Option<I>,
        transform: F,
    }

    let state = State {
        outer: Some(outer.boxed()),
        inner: None::<BoxStream<'static, U::Item>>,
        transform,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            let step = match (state.outer.as_mut(), state.inner.as_mut()) {
                (None, None) => return None,
                (Some(outer), None) => Switch::Outer(outer.next().await),
                (None, Some(inner)) => Switch::Inner(inner.next().await),
                (Some(outer), Some(inner)) => {
                    tokio::select! {
                        biased;
                        value = outer.next() => Switch::Outer(value),
                        item = inner.next() => Switch::Inner(item),
                    }
                }
            };

            match step {
                Switch::Outer(Some(value)) => {
                    state.inner = Some((state.transform)(value).boxed());
                }
                Switch::Outer(None) => state.outer = None,
                Switch::Inner(Some(item)) => return Some((item, state)),
                Switch::Inner(None) => state.inner = None,
            }
        }
    })
    .boxed()
}
