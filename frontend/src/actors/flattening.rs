//! Flattening domain: each recipe id expands into a stream of its own.

use crate::dataflow::Flow;
use crate::dataflow::operators::{flat_map_concat, flat_map_latest, flat_map_merge};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::fmt;
use std::ops::RangeInclusive;

pub const RECIPE_IDS: RangeInclusive<i64> = 1..=5;
pub const RECIPE_STEPS: RangeInclusive<i64> = 6..=10;

/// How the per-recipe streams are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FlattenMode {
    /// One recipe after the other
    #[default]
    Concat,
    /// All recipes at once, interleaved
    Merge,
    /// Only the newest recipe
    Latest,
}

impl fmt::Display for FlattenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FlattenMode::Concat => "concat",
            FlattenMode::Merge => "merge",
            FlattenMode::Latest => "latest",
        })
    }
}

/// Steps of one recipe. Every id currently has the same steps.
pub fn recipe_by_id(id: i64) -> Flow<i64> {
    log::trace!("loading recipe {id}");
    Flow::from_values(RECIPE_STEPS)
}

/// All recipe steps, combined according to `mode`.
pub fn recipe_steps(mode: FlattenMode) -> BoxStream<'static, i64> {
    let ids = Flow::from_values(RECIPE_IDS).stream();
    let expand = |id| recipe_by_id(id).stream();
    match mode {
        FlattenMode::Concat => flat_map_concat(ids, expand),
        FlattenMode::Merge => flat_map_merge(ids, expand),
        FlattenMode::Latest => flat_map_latest(ids, expand),
    }
}

/// Collect every step under `mode`, logging each one.
pub async fn collect_recipe_steps(mode: FlattenMode) -> Vec<i64> {
    recipe_steps(mode)
        .inspect(|step| log::info!("[{mode}] {step}"))
        .collect()
        .await
}
