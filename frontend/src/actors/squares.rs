//! Squares domain: a hot broadcast flow with a replay history.
//!
//! Squares are emitted whether or not anyone collects them. The replay
//! history lets collectors that subscribe late still see recent squares.

use crate::dataflow::{
    DispatchPolicy, MutableSharedFlow, MutableStateFlow, Scope, SharedFlow, StateFlow, TaskHandle,
    dispatch,
};
use crate::error::SquareOverflow;
use futures::stream::BoxStream;
use shared::SharedFlowSection;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Value squared when the component is created.
pub const INITIAL_NUMBER: i64 = 4;

/// One square as seen by one of the slow collectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectedSquare {
    pub collector: Collector,
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collector {
    First,
    Second,
}

#[derive(Clone, Debug)]
pub struct Squares {
    squares: MutableSharedFlow<i64>,
    collected: MutableStateFlow<Vec<CollectedSquare>>,
    collectors: Arc<Vec<TaskHandle>>,
    // Squares each collector will get to see.
    visible: Arc<AtomicUsize>,
}

impl Squares {
    pub fn new(scope: &Scope, config: &SharedFlowSection) -> Self {
        let squares = MutableSharedFlow::new(config.replay);
        let collected = MutableStateFlow::new(Vec::new());

        // Emitted before anyone subscribes; only the replay history keeps it.
        squares.emit(INITIAL_NUMBER * INITIAL_NUMBER);
        let visible = squares.replay_cache().len();

        let collectors = [
            (Collector::First, config.first_collector_delay_ms),
            (Collector::Second, config.second_collector_delay_ms),
        ]
        .into_iter()
        .map(|(collector, delay_ms)| {
            // Subscribed here so every later square reaches the collector.
            launch_collector(
                scope,
                squares.subscribe(),
                collected.clone(),
                collector,
                Duration::from_millis(delay_ms),
            )
        })
        .collect();

        Self {
            squares,
            collected,
            collectors: Arc::new(collectors),
            visible: Arc::new(AtomicUsize::new(visible)),
        }
    }

    /// Emit `number * number` to every current collector and the replay history.
    pub fn square_number(&self, number: i64) -> Result<i64, SquareOverflow> {
        let square = number.checked_mul(number).ok_or(SquareOverflow { number })?;
        let receivers = self.squares.emit(square);
        self.visible.fetch_add(1, Ordering::Relaxed);
        log::debug!("squared {number} -> {square} ({receivers} collectors)");
        Ok(square)
    }

    /// How many entries `collected` holds once both collectors caught up.
    ///
    /// The initial square only counts when the replay history kept it.
    pub fn expected_collected(&self) -> usize {
        2 * self.visible.load(Ordering::Relaxed)
    }

    pub fn squares(&self) -> SharedFlow<i64> {
        self.squares.as_shared_flow()
    }

    /// Everything the collectors have finished processing, in order.
    pub fn collected(&self) -> StateFlow<Vec<CollectedSquare>> {
        self.collected.as_state_flow()
    }

    pub fn collectors_running(&self) -> usize {
        self.collectors
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }
}

fn launch_collector(
    scope: &Scope,
    squares: BoxStream<'static, i64>,
    collected: MutableStateFlow<Vec<CollectedSquare>>,
    collector: Collector,
    delay: Duration,
) -> TaskHandle {
    scope.launch(async move {
        let result = dispatch(
            squares,
            DispatchPolicy::Sequential,
            |value| {
                let collected = collected.clone();
                async move {
                    tokio::time::sleep(delay).await;
                    log::info!("SharedFlow: {collector:?} collect: {value}");
                    collected.update(|seen| seen.push(CollectedSquare { collector, value }));
                    Ok::<_, Infallible>(())
                }
            },
        )
        .await;
        let Ok(stats) = result;
        log::debug!("{collector:?} collector ended after {} squares", stats.delivered);
    })
}
