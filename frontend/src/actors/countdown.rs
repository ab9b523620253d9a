//! Countdown domain: a cold timer flow pushed through the basic operators.
//!
//! `start_countdown` keeps the even ticks, renders them as text into
//! [`Countdown::time`], and afterwards runs the terminal operators over fresh
//! productions of the same flow to publish a [`CountdownSummary`].

use crate::dataflow::operators::{count_matching, reduce};
use crate::dataflow::{Flow, MutableStateFlow, Scope, StateFlow, TaskHandle};
use futures::StreamExt;
use shared::CountdownSection;
use std::future::ready;
use std::time::Duration;

/// Seed used by the folding total.
pub const FOLD_SEED: i64 = -15;

/// Results of the terminal operators over one full countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownSummary {
    pub even_count: usize,
    pub sum: i64,
    pub sum_with_offset: i64,
}

#[derive(Clone, Debug)]
pub struct Countdown {
    scope: Scope,
    flow: Flow<i64>,
    time: MutableStateFlow<String>,
    summary: MutableStateFlow<Option<CountdownSummary>>,
}

impl Countdown {
    pub fn new(scope: &Scope, config: &CountdownSection) -> Self {
        let flow = Flow::countdown(config.start, Duration::from_millis(config.interval_ms));
        Self {
            scope: scope.clone(),
            flow,
            time: MutableStateFlow::new(first_rendered_tick(config.start)),
            summary: MutableStateFlow::new(None),
        }
    }

    /// Latest rendered tick.
    pub fn time(&self) -> StateFlow<String> {
        self.time.as_state_flow()
    }

    /// Published once a countdown run has finished.
    pub fn summary(&self) -> StateFlow<Option<CountdownSummary>> {
        self.summary.as_state_flow()
    }

    pub fn start_countdown(&self) -> TaskHandle {
        let flow = self.flow.clone();
        let time = self.time.clone();
        let summary = self.summary.clone();

        self.scope.launch(async move {
            flow.stream()
                .filter(|tick| ready(tick % 2 == 0))
                .map(|tick| tick.to_string())
                .inspect(|tick| log::info!("countdown: {tick}"))
                .for_each(|tick| {
                    time.set_neq(tick);
                    ready(())
                })
                .await;

            let result = summarize(&flow).await;
            log::info!(
                "countdown: {} even ticks, sum {}, sum from {FOLD_SEED} {}",
                result.even_count,
                result.sum,
                result.sum_with_offset
            );
            summary.set(Some(result));
        })
    }
}

/// Text shown before the first run: the first even tick, or nothing when
/// no tick of the countdown is even.
fn first_rendered_tick(start: i64) -> String {
    match start {
        even if even % 2 == 0 => even.to_string(),
        odd if odd > 0 => (odd - 1).to_string(),
        _ => String::new(),
    }
}

/// Run the terminal operators over three fresh productions of `flow`.
pub async fn summarize(flow: &Flow<i64>) -> CountdownSummary {
    let even_count = count_matching(flow.stream(), |tick| tick % 2 == 0).await;
    let sum = reduce(flow.stream(), |total, tick| total + tick)
        .await
        .unwrap_or_default();
    let sum_with_offset = flow
        .stream()
        .fold(FOLD_SEED, |total, tick| ready(total + tick))
        .await;

    CountdownSummary {
        even_count,
        sum,
        sum_with_offset,
    }
}
