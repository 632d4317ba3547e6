use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use anyhow::Context as _;

use crate::formats::ChapterResult;
use crate::pipeline::ChapterPipeline;

/// Runs the chapter pipeline over many ordinals with a bounded number in flight.
pub struct BatchOrchestrator {
    pipeline: ChapterPipeline,
    workers: usize,
}

pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

impl BatchOrchestrator {
    pub fn new(pipeline: ChapterPipeline) -> Self {
        Self {
            pipeline,
            workers: default_workers(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Attempts every distinct ordinal exactly once. Results are sorted by ordinal.
    pub fn run(&self, ordinals: &[usize]) -> anyhow::Result<Vec<ChapterResult>> {
        let mut ordinals = ordinals.to_vec();
        ordinals.sort_unstable();
        ordinals.dedup();
        if ordinals.is_empty() {
            return Ok(Vec::new());
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(self.workers)
            .thread_name("downtrans-batch")
            .build()
            .context("build batch runtime")?;
        runtime.block_on(self.run_pool(ordinals))
    }

    async fn run_pool(&self, ordinals: Vec<usize>) -> anyhow::Result<Vec<ChapterResult>> {
        let total = ordinals.len();
        let series = self.pipeline.context().series.abbr.clone();
        tracing::info!(series = %series, chapters = total, workers = self.workers, "batch start");

        let mut join_set = tokio::task::JoinSet::new();
        let mut next_idx = 0usize;
        let mut results = BTreeMap::new();
        let mut failed = 0usize;
        let started_at = Instant::now();
        let mut last_progress_log_at = started_at;

        while next_idx < total || !join_set.is_empty() {
            while next_idx < total && join_set.len() < self.workers {
                let ordinal = ordinals[next_idx];
                let pipeline = self.pipeline.clone();
                join_set.spawn_blocking(move || {
                    std::panic::catch_unwind(AssertUnwindSafe(|| pipeline.run(ordinal)))
                        .unwrap_or_else(|panic| {
                            ChapterResult::failure(ordinal, panic_message(panic.as_ref()))
                        })
                });
                next_idx += 1;
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            let result = joined.context("join chapter task")?;
            if !result.is_success() {
                failed += 1;
            }
            results.insert(result.ordinal, result);

            let done = results.len();
            if done == total || last_progress_log_at.elapsed() >= Duration::from_secs(2) {
                tracing::info!(
                    series = %series,
                    done,
                    total,
                    failed,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "batch progress"
                );
                last_progress_log_at = Instant::now();
            }
        }

        Ok(ordinals
            .into_iter()
            .map(|ordinal| {
                results.remove(&ordinal).unwrap_or_else(|| {
                    ChapterResult::failure(ordinal, "chapter worker did not report a result")
                })
            })
            .collect())
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_owned());
    format!("chapter worker panicked: {message}")
}
