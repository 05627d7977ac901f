//! Shared progress records for the current batch.
//!
//! The store is the single point of mutation for every task's progress. Tasks
//! write through [`ProgressStore::update`]; renderers read through
//! [`ProgressStore::snapshot`] and wait on [`ProgressStore::subscribe`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::watch;

use crate::request::DownloadRequest;

/// Lifecycle of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    /// Waiting for a free slot.
    Queued,
    /// Occupying a slot.
    Running,
    /// Delivered.
    Succeeded,
    /// Settled with an error; the reason is kept for display.
    Failed(String),
}

impl TaskStatus {
    /// Whether the status can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }
}

/// Current progress of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressRecord {
    pub id: u64,
    pub file_name: String,
    /// Always within 0..=100.
    pub progress_percent: u8,
    pub is_finished: bool,
    pub status: TaskStatus,
}

impl ProgressRecord {
    fn queued(request: &DownloadRequest) -> Self {
        Self {
            id: request.id,
            file_name: request.file_name.clone(),
            progress_percent: 0,
            is_finished: false,
            status: TaskStatus::Queued,
        }
    }
}

/// Partial update applied to one record. Fields left as `None` are untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub percent: Option<u8>,
    pub is_finished: Option<bool>,
    pub status: Option<TaskStatus>,
}

impl ProgressUpdate {
    /// Reports a new percentage.
    #[must_use]
    pub const fn percent(percent: u8) -> Self {
        Self {
            percent: Some(percent),
            is_finished: None,
            status: None,
        }
    }

    /// Marks the request as admitted to a slot.
    #[must_use]
    pub const fn running() -> Self {
        Self {
            percent: None,
            is_finished: None,
            status: Some(TaskStatus::Running),
        }
    }

    /// Marks the request as delivered.
    #[must_use]
    pub const fn finished() -> Self {
        Self {
            percent: Some(100),
            is_finished: Some(true),
            status: Some(TaskStatus::Succeeded),
        }
    }

    /// Marks the request as failed, keeping its last percentage.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            percent: None,
            is_finished: None,
            status: Some(TaskStatus::Failed(reason.into())),
        }
    }
}

/// Generation tag handed out by [`ProgressStore::reset`].
///
/// Updates carrying an older generation belong to a discarded batch and are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchId(u64);

#[derive(Debug, Default)]
struct Records {
    generation: u64,
    /// Ascending by id.
    records: Vec<ProgressRecord>,
}

/// Mapping from request id to its current progress record.
#[derive(Debug)]
pub struct ProgressStore {
    inner: Mutex<Records>,
    revision: watch::Sender<u64>,
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Records::default()),
            revision: watch::Sender::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Records> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }

    /// Discards all records and starts a new batch with one Queued record per request.
    pub fn reset(&self, requests: &[DownloadRequest]) -> BatchId {
        let batch = {
            let mut inner = self.lock();
            inner.generation += 1;
            inner.records = requests.iter().map(ProgressRecord::queued).collect();
            inner.records.sort_by_key(|r| r.id);
            BatchId(inner.generation)
        };
        self.bump();
        batch
    }

    /// Applies `update` to the record with `id`.
    ///
    /// Returns `false` without touching anything when the batch is stale,
    /// the id is absent, or the record has already settled. Percentages never
    /// move backwards and are clamped to 100.
    pub fn update(&self, batch: BatchId, id: u64, update: ProgressUpdate) -> bool {
        let applied = {
            let mut inner = self.lock();
            if inner.generation != batch.0 {
                log::debug!("Dropping update for id {id} from stale batch {}", batch.0);
                return false;
            }
            let Ok(index) = inner.records.binary_search_by_key(&id, |r| r.id) else {
                log::debug!("Dropping update for unknown id {id}");
                return false;
            };
            let record = &mut inner.records[index];
            if record.status.is_terminal() {
                return false;
            }
            if let Some(percent) = update.percent {
                record.progress_percent = record.progress_percent.max(percent.min(100));
            }
            if let Some(is_finished) = update.is_finished {
                record.is_finished = is_finished;
            }
            if let Some(status) = update.status {
                record.status = status;
            }
            true
        };
        if applied {
            self.bump();
        }
        applied
    }

    /// Returns a copy of all records, ascending by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ProgressRecord> {
        self.lock().records.clone()
    }

    /// Returns the record for `id`, if present in the current batch.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<ProgressRecord> {
        let inner = self.lock();
        inner
            .records
            .binary_search_by_key(&id, |r| r.id)
            .ok()
            .map(|i| inner.records[i].clone())
    }

    /// Subscribes to changes. The value is a revision counter bumped after every applied write.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }
}
