//! Concurrency-limited FIFO scheduler.
//!
//! The scheduler owns the pending queue and the running count. Admission and
//! settlement both happen on the scheduler's own control flow, one step at a
//! time, so a settlement can never race an admission. Task bodies run
//! concurrently inside a [`FuturesUnordered`] polled by the same loop.

use std::collections::VecDeque;
use std::future::Future;

use futures::StreamExt;
use futures::stream::FuturesUnordered;

use crate::download::DownloadProgress;
use crate::error::{Error, Result};
use crate::format::format_bytes;
use crate::request::DownloadRequest;
use crate::stats::{BatchStats, BatchStatsBuilder};
use crate::task::TaskOutcome;

/// Lifecycle of a scheduler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Created, nothing submitted yet.
    Idle,
    /// Work is queued or in flight.
    Draining,
    /// Queue empty and nothing in flight. Terminal.
    Drained,
}

/// Runs at most `limit` tasks at once, admitting queued requests in submission order.
#[derive(Debug)]
pub struct ConcurrencyScheduler {
    limit: usize,
    state: SchedulerState,
    queue: VecDeque<DownloadRequest>,
    running: usize,
}

impl ConcurrencyScheduler {
    /// Creates a scheduler with `limit` slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `limit` is zero.
    pub fn new(limit: usize) -> Result<Self> {
        if limit < 1 {
            return Err(Error::Config(format!(
                "concurrency limit must be at least 1, got {limit}"
            )));
        }
        Ok(Self {
            limit,
            state: SchedulerState::Idle,
            queue: VecDeque::new(),
            running: 0,
        })
    }

    /// Number of slots.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Runs every request in `queue` to settlement and returns the batch statistics.
    ///
    /// `start` turns an admitted request into its task future; it is called
    /// exactly once per request, in queue order. A task that settles with an
    /// error frees its slot like any other. The returned future resolves once,
    /// when the queue is empty and no task is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if this scheduler has already run a batch.
    pub async fn run_all<I, F, Fut>(
        &mut self,
        queue: I,
        mut start: F,
        progress: &dyn DownloadProgress,
    ) -> Result<BatchStats>
    where
        I: IntoIterator<Item = DownloadRequest>,
        F: FnMut(DownloadRequest) -> Fut,
        Fut: Future<Output = TaskOutcome>,
    {
        if self.state != SchedulerState::Idle {
            return Err(Error::Config(
                "scheduler has already run a batch".to_string(),
            ));
        }

        self.queue.extend(queue);
        self.state = SchedulerState::Draining;
        log::info!(
            "Scheduling {} download(s), {} at a time",
            self.queue.len(),
            self.limit
        );

        let mut builder = BatchStatsBuilder::new();
        let mut in_flight = FuturesUnordered::new();

        loop {
            while self.running < self.limit {
                let Some(request) = self.queue.pop_front() else {
                    break;
                };
                self.running += 1;
                builder.observe_running(self.running);
                log::info!(
                    "Starting {} ({}/{} slots)",
                    request.file_name,
                    self.running,
                    self.limit
                );
                progress.on_admitted(&request, self.running);
                in_flight.push(start(request));
            }

            // Admission stops only on a full pool or an empty queue, so an
            // idle pool here means the queue is exhausted too.
            if self.running == 0 {
                break;
            }

            let Some(outcome) = in_flight.next().await else {
                break;
            };
            self.running -= 1;
            Self::record(&outcome, &mut builder);
            progress.on_settled(&outcome.request, &outcome.result, self.running);
        }

        self.state = SchedulerState::Drained;
        let stats = builder.build();
        log::info!(
            "All downloads settled: {} succeeded, {} failed",
            stats.files_succeeded,
            stats.files_failed
        );
        progress.on_drained(&stats);
        Ok(stats)
    }

    fn record(outcome: &TaskOutcome, builder: &mut BatchStatsBuilder) {
        match &outcome.result {
            Ok(file_stats) => {
                builder.add_success(file_stats);
                log::info!(
                    "Download complete: {} ({})",
                    outcome.request.file_name,
                    format_bytes(file_stats.size)
                );
            }
            Err(e) => {
                builder.add_failure();
                log::warn!("Settled as failed: {}: {e}", outcome.request.file_name);
            }
        }
    }
}
