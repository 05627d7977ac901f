//! Download requests and batch id allocation.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// One requested download. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRequest {
    /// Unique id, contiguous across batches.
    pub id: u64,
    /// Name the artifact is delivered under.
    pub file_name: String,
    /// URL the bytes are fetched from.
    pub source_url: String,
}

impl DownloadRequest {
    /// Creates a request with the synthesized `test_<id>.png` file name.
    #[must_use]
    pub fn new(id: u64, source_url: impl Into<String>) -> Self {
        Self {
            id,
            file_name: format!("test_{id}.png"),
            source_url: source_url.into(),
        }
    }
}

/// Hands out request ids so that each batch continues where the previous one ended.
#[derive(Debug, Default)]
pub struct RequestIds {
    next: AtomicU64,
}

impl RequestIds {
    /// Creates an allocator starting at id 0.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Returns the id the next batch will start at.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }

    /// Allocates `count` fresh requests, all pointing at `source_url`.
    #[must_use]
    pub fn allocate(&self, count: usize, source_url: &str) -> Vec<DownloadRequest> {
        let count = count as u64;
        let first = self.next.fetch_add(count, Ordering::Relaxed);
        (first..first + count)
            .map(|id| DownloadRequest::new(id, source_url))
            .collect()
    }
}
