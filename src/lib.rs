//! parallel-dl - A concurrency-limited batch downloader with live progress.
//!
//! Requests are admitted in FIFO order and at most
//! [`DownloadConfig::concurrent_files`] of them run at once. Each running
//! request streams its body, reports a rounded percentage after every chunk,
//! and hands the assembled artifact to a [`DeliverySink`]. Progress lands in
//! a [`ProgressStore`] that a renderer can watch without touching the
//! scheduler.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use parallel_dl::{DownloadConfig, DownloadProgress, Downloader, NoProgress};
//!
//! # async fn example() -> parallel_dl::Result<()> {
//! let config = DownloadConfig::new()
//!     .with_concurrent_files(3)
//!     .with_source_url("http://localhost:3000/test-image.png");
//! let downloader = Downloader::new(config)?;
//!
//! let observer: Arc<dyn DownloadProgress> = Arc::new(NoProgress);
//! let stats = downloader.download_batch(5, &observer).await?;
//! println!("Downloaded {} files", stats.files_succeeded);
//!
//! for record in downloader.store().snapshot() {
//!     println!("{} {}%", record.file_name, record.progress_percent);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod format;
pub mod request;
pub mod scheduler;
pub mod sink;
pub mod stats;
pub mod store;
pub mod stream;
pub mod task;
pub mod transport;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use config::{AppConfig, DownloadConfig};
pub use download::{DownloadProgress, Downloader, NoProgress};
pub use error::{Error, Result};
pub use format::{format_bytes, format_duration};
pub use request::{DownloadRequest, RequestIds};
pub use scheduler::{ConcurrencyScheduler, SchedulerState};
pub use sink::{DeliverySink, FileSink};
pub use stats::{BatchStats, FileStats};
pub use store::{BatchId, ProgressRecord, ProgressStore, ProgressUpdate, TaskStatus};
pub use stream::ProgressStream;
pub use task::{DownloadTask, TaskOutcome};
pub use transport::{HttpTransport, Transport};
