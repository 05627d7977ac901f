//! Chunked byte stream with running percentage reporting.

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::error::Result;

/// Raw chunk source produced by a [`Transport`](crate::transport::Transport).
pub type ChunkStream = BoxStream<'static, Result<Bytes>>;

type ProgressCallback = Box<dyn FnMut(u8) + Send>;

/// Rounds `received / total` to the nearest whole percentage, clamped to 100.
///
/// Returns `None` when `total` is zero, since no meaningful ratio exists.
#[must_use]
pub fn percent_of(received: u64, total: u64) -> Option<u8> {
    if total == 0 {
        return None;
    }
    let total = u128::from(total);
    // floor(x + 1/2) with x = received * 100 / total, kept in integers
    let rounded = (u128::from(received) * 200 + total) / (2 * total);
    Some(u8::try_from(rounded.min(100)).unwrap_or(100))
}

/// A single remote byte source, read chunk by chunk.
///
/// The declared total length is known before the first chunk. After every
/// delivered chunk the attached callback receives the rounded percentage;
/// when the total is unknown or zero the callback is never invoked.
///
/// Once exhausted or failed the stream stays finished: open a new one to retry.
pub struct ProgressStream {
    chunks: ChunkStream,
    total_bytes: Option<u64>,
    received_bytes: u64,
    exhausted: bool,
    on_progress: Option<ProgressCallback>,
}

impl ProgressStream {
    /// Wraps a chunk source. A declared length of zero is treated as unknown.
    #[must_use]
    pub fn new(total_bytes: Option<u64>, chunks: ChunkStream) -> Self {
        Self {
            chunks,
            total_bytes: total_bytes.filter(|&t| t > 0),
            received_bytes: 0,
            exhausted: false,
            on_progress: None,
        }
    }

    /// Builds a stream from an in-memory sequence of chunk results.
    #[must_use]
    pub fn from_chunks<I>(total_bytes: Option<u64>, chunks: I) -> Self
    where
        I: IntoIterator<Item = Result<Bytes>>,
        I::IntoIter: Send + 'static,
    {
        Self::new(total_bytes, futures::stream::iter(chunks).boxed())
    }

    /// Attaches the callback invoked with the percentage after each chunk.
    pub fn on_progress(&mut self, callback: impl FnMut(u8) + Send + 'static) {
        self.on_progress = Some(Box::new(callback));
    }

    /// Declared length of the whole body, if known.
    #[must_use]
    pub const fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }

    /// Bytes delivered so far.
    #[must_use]
    pub const fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    /// Current percentage, or `None` when the total is unknown.
    #[must_use]
    pub fn percent(&self) -> Option<u8> {
        percent_of(self.received_bytes, self.total_bytes?)
    }

    /// Whether the stream has ended, successfully or not.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Waits for the next chunk.
    ///
    /// Returns `Ok(None)` at end-of-stream, and on every call after the stream
    /// has ended or failed.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the connection drops mid-stream.
    pub async fn next(&mut self) -> Result<Option<Bytes>> {
        if self.exhausted {
            return Ok(None);
        }
        match self.chunks.next().await {
            Some(Ok(chunk)) => {
                self.received_bytes += chunk.len() as u64;
                if let (Some(percent), Some(callback)) = (self.percent(), self.on_progress.as_mut())
                {
                    callback(percent);
                }
                Ok(Some(chunk))
            }
            Some(Err(e)) => {
                self.exhausted = true;
                Err(e)
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for ProgressStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStream")
            .field("total_bytes", &self.total_bytes)
            .field("received_bytes", &self.received_bytes)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}
