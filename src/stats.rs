//! Download statistics types.

use std::time::{Duration, Instant};

use serde::Serialize;

/// Statistics for a single delivered file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileStats {
    /// Size of the delivered artifact in bytes.
    pub size: u64,
    /// Time from opening the stream to delivery.
    pub elapsed: Duration,
    /// Average download speed in bytes per second.
    pub average_speed: u64,
}

/// Statistics for one batch, produced when the scheduler drains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Number of tasks that delivered their artifact.
    pub files_succeeded: usize,
    /// Number of tasks that settled with an error.
    pub files_failed: usize,
    /// Total bytes delivered by successful tasks.
    pub total_bytes: u64,
    /// Wall time from the first admission to drain.
    pub elapsed: Duration,
    /// Highest number of tasks observed running at once.
    pub peak_running: usize,
}

impl Default for BatchStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchStats {
    /// Creates empty batch stats.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            files_succeeded: 0,
            files_failed: 0,
            total_bytes: 0,
            elapsed: Duration::ZERO,
            peak_running: 0,
        }
    }

    /// Number of tasks that reached a terminal state.
    #[must_use]
    pub const fn files_settled(&self) -> usize {
        self.files_succeeded + self.files_failed
    }

    /// Returns the average download speed in bytes per second.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn average_speed(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.total_bytes as f64 / secs) as u64
        } else {
            0
        }
    }
}

/// Tracks bytes received by one task while its stream is pumped.
#[derive(Debug)]
pub struct DownloadStatsTracker {
    start_time: Instant,
    received: u64,
}

impl Default for DownloadStatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DownloadStatsTracker {
    /// Starts the clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            received: 0,
        }
    }

    /// Records a received chunk.
    pub const fn record_bytes(&mut self, bytes: u64) {
        self.received = self.received.saturating_add(bytes);
    }

    /// Converts the tracker into final file statistics.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn into_file_stats(self) -> FileStats {
        let elapsed = self.start_time.elapsed();
        let secs = elapsed.as_secs_f64();
        let average_speed = if secs > 0.0 {
            (self.received as f64 / secs) as u64
        } else {
            0
        };
        FileStats {
            size: self.received,
            elapsed,
            average_speed,
        }
    }
}

/// Builder for accumulating batch statistics as tasks settle.
#[derive(Debug)]
pub struct BatchStatsBuilder {
    files_succeeded: usize,
    files_failed: usize,
    total_bytes: u64,
    start_time: Instant,
    peak_running: usize,
}

impl Default for BatchStatsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchStatsBuilder {
    /// Creates a new builder; the batch clock starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            files_succeeded: 0,
            files_failed: 0,
            total_bytes: 0,
            start_time: Instant::now(),
            peak_running: 0,
        }
    }

    /// Records the running count right after an admission.
    pub fn observe_running(&mut self, running: usize) {
        self.peak_running = self.peak_running.max(running);
    }

    /// Records a delivered file.
    pub const fn add_success(&mut self, file_stats: &FileStats) {
        self.files_succeeded += 1;
        self.total_bytes += file_stats.size;
    }

    /// Records a failed task.
    pub const fn add_failure(&mut self) {
        self.files_failed += 1;
    }

    /// Builds the final batch statistics.
    #[must_use]
    pub fn build(self) -> BatchStats {
        BatchStats {
            files_succeeded: self.files_succeeded,
            files_failed: self.files_failed,
            total_bytes: self.total_bytes,
            elapsed: self.start_time.elapsed(),
            peak_running: self.peak_running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_stats_default() {
        let stats = BatchStats::default();
        assert_eq!(stats.files_settled(), 0);
        assert_eq!(stats.total_bytes, 0);
        assert_eq!(stats.average_speed(), 0);
    }

    #[test]
    fn batch_stats_average_speed() {
        let stats = BatchStats {
            files_succeeded: 2,
            files_failed: 1,
            total_bytes: 1000,
            elapsed: Duration::from_secs(2),
            peak_running: 3,
        };
        assert_eq!(stats.average_speed(), 500);
        assert_eq!(stats.files_settled(), 3);
    }

    #[test]
    fn tracker_counts_received_bytes() {
        let mut tracker = DownloadStatsTracker::new();
        tracker.record_bytes(25);
        tracker.record_bytes(75);
        let stats = tracker.into_file_stats();
        assert_eq!(stats.size, 100);
    }

    #[test]
    fn builder_accumulates() {
        let mut builder = BatchStatsBuilder::new();
        builder.observe_running(1);
        builder.observe_running(3);
        builder.observe_running(2);
        builder.add_success(&FileStats {
            size: 100,
            elapsed: Duration::from_millis(10),
            average_speed: 10_000,
        });
        builder.add_failure();

        let stats = builder.build();
        assert_eq!(stats.files_succeeded, 1);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.total_bytes, 100);
        assert_eq!(stats.peak_running, 3);
    }
}
