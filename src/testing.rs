//! Test doubles for transports, sinks and observers.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use crate::download::DownloadProgress;
use crate::error::{Error, Result};
use crate::request::DownloadRequest;
use crate::sink::DeliverySink;
use crate::stats::{BatchStats, FileStats};
use crate::stream::ProgressStream;
use crate::transport::Transport;

/// How one opened stream behaves.
#[derive(Debug, Clone)]
pub enum Script {
    /// Delivers the chunks, then ends.
    Body {
        total: Option<u64>,
        chunks: Vec<usize>,
    },
    /// Delivers the chunks, then the connection drops.
    Broken { total: u64, chunks: Vec<usize> },
    /// Open fails.
    Unreachable,
}

impl Script {
    /// `parts` equal chunks adding up to `total`.
    pub fn equal_chunks(total: usize, parts: usize) -> Self {
        Self::Body {
            total: Some(total as u64),
            chunks: vec![total / parts; parts],
        }
    }
}

/// Transport that plays back scripts in open order, then falls back to a default.
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    default: Script,
    opens: AtomicUsize,
}

impl ScriptedTransport {
    pub fn new(default: Script) -> Self {
        Self {
            scripts: Mutex::new(VecDeque::new()),
            default,
            opens: AtomicUsize::new(0),
        }
    }

    pub fn then(self, script: Script) -> Self {
        self.scripts.lock().unwrap().push_back(script);
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

fn paced(chunks: Vec<usize>, tail: Option<Error>) -> crate::stream::ChunkStream {
    let items: Vec<Result<Bytes>> = chunks
        .into_iter()
        .map(|len| Ok(Bytes::from(vec![1u8; len])))
        .chain(tail.map(Err))
        .collect();
    // yield between chunks so concurrently running tasks interleave
    futures::stream::iter(items)
        .then(|item| async move {
            tokio::task::yield_now().await;
            item
        })
        .boxed()
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, url: &str) -> Result<ProgressStream> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        tokio::task::yield_now().await;
        match script {
            Script::Body { total, chunks } => Ok(ProgressStream::new(total, paced(chunks, None))),
            Script::Broken { total, chunks } => Ok(ProgressStream::new(
                Some(total),
                paced(chunks, Some(Error::Transport("connection reset".into()))),
            )),
            Script::Unreachable => Err(Error::Transport(format!("{url} unreachable"))),
        }
    }
}

/// Sink that keeps artifacts in memory, optionally rejecting one name.
#[derive(Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<(String, Bytes)>>,
    reject: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(name: &str) -> Self {
        Self {
            delivered: Mutex::default(),
            reject: Some(name.to_string()),
        }
    }

    pub fn delivered(&self) -> Vec<(String, Bytes)> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliverySink for MemorySink {
    async fn deliver(&self, artifact: Bytes, file_name: &str) -> Result<()> {
        if self.reject.as_deref() == Some(file_name) {
            return Err(Error::Delivery(format!("{file_name} rejected")));
        }
        self.delivered
            .lock()
            .unwrap()
            .push((file_name.to_string(), artifact));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Admitted { id: u64, running: usize },
    Progress { id: u64, percent: u8 },
    Settled { id: u64, ok: bool, running: usize },
    Drained,
}

/// Observer that records every callback in order.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<Event>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn admitted_ids(&self) -> Vec<u64> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Admitted { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn max_running(&self) -> usize {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Admitted { running, .. } => Some(running),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    pub fn progress_for(&self, id: u64) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Progress { id: i, percent } if i == id => Some(percent),
                _ => None,
            })
            .collect()
    }

    pub fn settlements_for(&self, id: u64) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Settled { id: i, .. } if *i == id))
            .count()
    }

    pub fn drained_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Drained))
            .count()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl DownloadProgress for RecordingProgress {
    fn on_admitted(&self, request: &DownloadRequest, running: usize) {
        self.push(Event::Admitted {
            id: request.id,
            running,
        });
    }

    fn on_progress(&self, request_id: u64, percent: u8) {
        self.push(Event::Progress {
            id: request_id,
            percent,
        });
    }

    fn on_settled(&self, request: &DownloadRequest, result: &Result<FileStats>, running: usize) {
        self.push(Event::Settled {
            id: request.id,
            ok: result.is_ok(),
            running,
        });
    }

    fn on_drained(&self, _stats: &BatchStats) {
        self.push(Event::Drained);
    }
}
