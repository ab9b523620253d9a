//! Dinner domain: one slow eater, three dishes, four ways to serve them.
//!
//! Dishes arrive on a fixed schedule and each takes a while to eat, so the
//! eater is always slower than the kitchen. [`Dinner::serve`] records what
//! happens under a given [`DispatchPolicy`].

use crate::dataflow::{DispatchExt, DispatchPolicy, DispatchStats, Emission, Flow};
use futures::StreamExt;
use shared::DinnerSection;
use std::convert::Infallible;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// The kitchen's schedule: each delay is counted from the previous dish.
pub const COURSES: [(&str, u64); 3] = [("Appetizer", 250), ("Main dish", 1_000), ("Dessert", 100)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DinnerEvent {
    Delivered { dish: &'static str, at_ms: u64 },
    StartedEating { dish: &'static str, at_ms: u64 },
    FinishedEating { dish: &'static str, at_ms: u64 },
}

impl fmt::Display for DinnerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivered { dish, at_ms } => write!(f, "{at_ms:>5} ms  {dish} is delivered"),
            Self::StartedEating { dish, at_ms } => write!(f, "{at_ms:>5} ms  Now eating {dish}"),
            Self::FinishedEating { dish, at_ms } => {
                write!(f, "{at_ms:>5} ms  Finished eating {dish}")
            }
        }
    }
}

/// Everything that happened during one dinner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DinnerReport {
    pub policy: DispatchPolicy,
    pub events: Vec<DinnerEvent>,
    pub stats: DispatchStats,
}

impl DinnerReport {
    /// Dishes eaten to the end, in order.
    pub fn finished_dishes(&self) -> Vec<&'static str> {
        self.events
            .iter()
            .filter_map(|event| match event {
                DinnerEvent::FinishedEating { dish, .. } => Some(*dish),
                _ => None,
            })
            .collect()
    }

    pub fn total_ms(&self) -> u64 {
        self.events
            .iter()
            .map(|event| match event {
                DinnerEvent::Delivered { at_ms, .. }
                | DinnerEvent::StartedEating { at_ms, .. }
                | DinnerEvent::FinishedEating { at_ms, .. } => *at_ms,
            })
            .max()
            .unwrap_or_default()
    }
}

#[derive(Clone, Debug)]
pub struct Dinner {
    kitchen: Flow<&'static str>,
    eating: Duration,
}

impl Dinner {
    pub fn new(config: &DinnerSection) -> Self {
        let kitchen = Flow::from_schedule(
            COURSES
                .iter()
                .map(|(dish, delay_ms)| Emission::new(Duration::from_millis(*delay_ms), *dish)),
        );
        Self {
            kitchen,
            eating: Duration::from_millis(config.eating_ms),
        }
    }

    /// Serve every course under `policy` and record the timeline.
    pub async fn serve(&self, policy: DispatchPolicy) -> DinnerReport {
        let started = Instant::now();
        let events = Arc::new(Mutex::new(Vec::new()));
        let record = {
            let events = Arc::clone(&events);
            move |event: DinnerEvent| {
                log::info!("[{policy}] {event}");
                events
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(event);
            }
        };
        let elapsed_ms = move || started.elapsed().as_millis() as u64;

        let delivered = record.clone();
        let dishes = self.kitchen.stream().inspect(move |dish| {
            delivered(DinnerEvent::Delivered {
                dish: *dish,
                at_ms: elapsed_ms(),
            })
        });

        let eating = self.eating;
        let result = dishes
            .dispatch(policy, |dish| {
                let record = record.clone();
                async move {
                    record(DinnerEvent::StartedEating {
                        dish,
                        at_ms: elapsed_ms(),
                    });
                    tokio::time::sleep(eating).await;
                    record(DinnerEvent::FinishedEating {
                        dish,
                        at_ms: elapsed_ms(),
                    });
                    Ok::<_, Infallible>(())
                }
            })
            .await;
        let Ok(stats) = result;

        let events = events.lock().unwrap_or_else(PoisonError::into_inner).clone();
        DinnerReport {
            policy,
            events,
            stats,
        }
    }
}
