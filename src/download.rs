//! Batch submission and progress observation.

use std::sync::Arc;

use crate::config::DownloadConfig;
use crate::error::Result;
use crate::request::{DownloadRequest, RequestIds};
use crate::scheduler::ConcurrencyScheduler;
use crate::sink::{DeliverySink, FileSink};
use crate::stats::{BatchStats, FileStats};
use crate::store::ProgressStore;
use crate::task::DownloadTask;
use crate::transport::{HttpTransport, Transport};

/// Trait for receiving scheduling and progress events.
///
/// Implement this trait to receive callbacks while a batch runs.
/// All methods have default no-op implementations for convenience.
pub trait DownloadProgress: Send + Sync {
    /// Called when a request takes a slot. `running` includes it.
    fn on_admitted(&self, _request: &DownloadRequest, _running: usize) {}

    /// Called after each chunk with the request's rounded percentage.
    fn on_progress(&self, _request_id: u64, _percent: u8) {}

    /// Called once per request when it settles. `running` no longer includes it.
    fn on_settled(&self, _request: &DownloadRequest, _result: &Result<FileStats>, _running: usize) {
    }

    /// Called once when the queue is empty and nothing is in flight.
    fn on_drained(&self, _stats: &BatchStats) {}
}

/// A null progress implementation that ignores all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl DownloadProgress for NoProgress {}

/// Submits batches of downloads and runs them under the configured concurrency limit.
///
/// Every batch replaces the records in [`store`](Self::store); ids keep
/// counting up across batches.
pub struct Downloader {
    config: DownloadConfig,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn DeliverySink>,
    store: Arc<ProgressStore>,
    ids: RequestIds,
}

impl Downloader {
    /// Creates a downloader fetching over HTTP and saving into `config.output_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: DownloadConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new()?);
        let sink = Arc::new(FileSink::new(config.output_dir.clone()));
        Ok(Self::with_parts(config, transport, sink))
    }

    /// Creates a downloader with custom transport and sink implementations.
    #[must_use]
    pub fn with_parts(
        config: DownloadConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn DeliverySink>,
    ) -> Self {
        Self {
            config,
            transport,
            sink,
            store: Arc::new(ProgressStore::new()),
            ids: RequestIds::new(),
        }
    }

    /// Returns a reference to the download configuration.
    #[must_use]
    pub const fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Returns the progress store the rendering side reads from.
    #[must_use]
    pub const fn store(&self) -> &Arc<ProgressStore> {
        &self.store
    }

    /// Downloads `count` fresh requests and waits until every one has settled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) before anything starts
    /// if the configuration is invalid. Individual download failures do not
    /// fail the batch; they are counted in the returned stats and recorded
    /// in the store.
    pub async fn download_batch(
        &self,
        count: usize,
        progress: &Arc<dyn DownloadProgress>,
    ) -> Result<BatchStats> {
        self.config.validate()?;
        let mut scheduler = ConcurrencyScheduler::new(self.config.concurrent_files)?;

        let requests = self.ids.allocate(count, &self.config.source_url);
        let batch = self.store.reset(&requests);

        let task = DownloadTask::new(
            Arc::clone(&self.transport),
            Arc::clone(&self.sink),
            Arc::clone(&self.store),
            batch,
        )
        .with_progress(Arc::clone(progress))
        .with_settle_delay(self.config.settle_delay());
        let task = &task;

        scheduler
            .run_all(requests, move |request| task.run(request), progress.as_ref())
            .await
    }
}
