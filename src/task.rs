//! A single download: stream, accumulate, deliver.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;

use crate::download::{DownloadProgress, NoProgress};
use crate::error::Result;
use crate::request::DownloadRequest;
use crate::sink::DeliverySink;
use crate::stats::{DownloadStatsTracker, FileStats};
use crate::store::{BatchId, ProgressStore, ProgressUpdate};
use crate::transport::Transport;

/// Upper bound on the buffer reserved up front from a declared length.
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// Result of running one request to settlement.
#[derive(Debug)]
pub struct TaskOutcome {
    /// The request that settled.
    pub request: DownloadRequest,
    /// Delivery statistics, or the error the task settled with.
    pub result: Result<FileStats>,
}

impl TaskOutcome {
    /// Whether the artifact was delivered.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Drives requests of one batch from stream to delivery sink.
///
/// The same task value is shared by every request of the batch; each call to
/// [`run`](Self::run) handles one request.
pub struct DownloadTask {
    transport: Arc<dyn Transport>,
    sink: Arc<dyn DeliverySink>,
    store: Arc<ProgressStore>,
    progress: Arc<dyn DownloadProgress>,
    batch: BatchId,
    settle_delay: Duration,
}

impl DownloadTask {
    /// Creates a task runner writing progress under `batch`.
    #[must_use]
    pub fn new(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn DeliverySink>,
        store: Arc<ProgressStore>,
        batch: BatchId,
    ) -> Self {
        Self {
            transport,
            sink,
            store,
            progress: Arc::new(NoProgress),
            batch,
            settle_delay: Duration::ZERO,
        }
    }

    /// Forwards per-chunk percentages to `progress` as well as to the store.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn DownloadProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Waits `delay` after a successful delivery before settling.
    #[must_use]
    pub const fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Runs `request` to settlement.
    ///
    /// Never fails itself: errors are recorded in the store as
    /// [`TaskStatus::Failed`](crate::store::TaskStatus::Failed) and returned
    /// inside the outcome.
    pub async fn run(&self, request: DownloadRequest) -> TaskOutcome {
        self.store
            .update(self.batch, request.id, ProgressUpdate::running());

        let result = self.fetch_and_deliver(&request).await;

        if let Err(ref e) = result {
            log::error!("Download failed: {}: {e}", request.file_name);
            self.store
                .update(self.batch, request.id, ProgressUpdate::failed(e.to_string()));
        }

        TaskOutcome { request, result }
    }

    async fn fetch_and_deliver(&self, request: &DownloadRequest) -> Result<FileStats> {
        let mut stream = self.transport.open(&request.source_url).await?;

        let store = Arc::clone(&self.store);
        let progress = Arc::clone(&self.progress);
        let (batch, id) = (self.batch, request.id);
        stream.on_progress(move |percent| {
            store.update(batch, id, ProgressUpdate::percent(percent));
            progress.on_progress(id, percent);
        });

        let capacity = stream
            .total_bytes()
            .and_then(|t| usize::try_from(t).ok())
            .unwrap_or(0)
            .min(MAX_PREALLOC);
        let mut artifact = BytesMut::with_capacity(capacity);
        let mut tracker = DownloadStatsTracker::new();

        while let Some(chunk) = stream.next().await? {
            tracker.record_bytes(chunk.len() as u64);
            artifact.extend_from_slice(&chunk);
        }

        self.sink
            .deliver(artifact.freeze(), &request.file_name)
            .await?;
        self.store.update(self.batch, id, ProgressUpdate::finished());
        let stats = tracker.into_file_stats();

        // Some sinks hand off asynchronously; give them time before the slot is reused.
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        Ok(stats)
    }
}
