//! # Tile Loader
//!
//! Asynchronous shell around the [`DownloadQueue`]. Provider fetches run
//! on a dedicated tokio runtime with retry handling; results cross back
//! to the frame thread over a channel and are drained by
//! [`TileLoader::poll_completed`] - the frame thread never blocks on a
//! download.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::future::BoxFuture;
use meridian_core::{EngineError, EngineResult};

use crate::cell::CellKey;
use crate::queue::{DownloadQueue, RequestAction};

/// Supplies raw payload bytes for a cell address.
///
/// Collaborator seam: raster tile servers and vector fragment services
/// both implement this. Fetches fail with [`EngineError::Download`] or
/// [`EngineError::Decode`].
pub trait TileProvider: Send + Sync + 'static {
    /// Fetches the payload bytes for one cell.
    fn fetch(&self, cell: CellKey) -> BoxFuture<'static, EngineResult<Vec<u8>>>;
}

/// Collaborator-supplied retry policy for failed fetches.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Total attempts before a cell is marked failed.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(200),
        }
    }
}

/// A finished fetch, delivered on the frame thread.
#[derive(Debug)]
pub struct FetchResult {
    /// The cell the fetch was for.
    pub cell: CellKey,
    /// Payload bytes, or the terminal error after exhausted retries.
    pub result: EngineResult<Vec<u8>>,
    /// Attempts consumed.
    pub attempts: u32,
}

/// Bounded-concurrency asynchronous cell fetcher.
pub struct TileLoader {
    provider: Arc<dyn TileProvider>,
    retry: RetryPolicy,
    queue: DownloadQueue,
    runtime: tokio::runtime::Runtime,
    result_tx: Sender<FetchResult>,
    result_rx: Receiver<FetchResult>,
}

impl TileLoader {
    /// Creates a loader over a provider with the given concurrency limit.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Configuration`] for a zero limit or if the
    /// runtime cannot start.
    pub fn new(
        provider: Arc<dyn TileProvider>,
        active_limit: usize,
        retry: RetryPolicy,
    ) -> EngineResult<Self> {
        if active_limit == 0 {
            return Err(EngineError::Configuration(
                "active download limit must be positive".into(),
            ));
        }
        if retry.max_attempts == 0 {
            return Err(EngineError::Configuration(
                "retry policy needs at least one attempt".into(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("tile-loader")
            .enable_time()
            .build()
            .map_err(|e| EngineError::Configuration(format!("loader runtime: {e}")))?;

        let (result_tx, result_rx) = unbounded();

        Ok(Self {
            provider,
            retry,
            queue: DownloadQueue::new(active_limit),
            runtime,
            result_tx,
            result_rx,
        })
    }

    /// Registers interest in a cell.
    ///
    /// Starts a fetch if a slot is free; duplicate requests attach to the
    /// in-flight download and share its single result.
    pub fn request(&mut self, cell: CellKey) -> RequestAction {
        let action = self.queue.request(cell);
        if action == RequestAction::Started {
            self.spawn_fetch(cell);
        }
        action
    }

    /// Drains finished fetches (non-blocking) and starts queued ones as
    /// slots free up.
    pub fn poll_completed(&mut self) -> Vec<FetchResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.result_rx.try_recv() {
            if let Some(next) = self.queue.complete(result.cell) {
                self.spawn_fetch(next);
            }
            results.push(result);
        }
        results
    }

    /// Downloads currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.queue.in_flight_count()
    }

    /// Requests waiting for a free slot.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.pending_count()
    }

    /// The configured concurrent-download limit.
    #[must_use]
    pub fn active_limit(&self) -> usize {
        self.queue.active_limit()
    }

    fn spawn_fetch(&self, cell: CellKey) {
        let provider = Arc::clone(&self.provider);
        let retry = self.retry;
        let tx = self.result_tx.clone();

        self.runtime.spawn(async move {
            let mut attempts = 0;
            let result = loop {
                attempts += 1;
                match provider.fetch(cell).await {
                    Ok(bytes) => break Ok(bytes),
                    Err(error) if attempts < retry.max_attempts => {
                        tracing::debug!(cell = %cell, attempts, %error, "fetch retry");
                        tokio::time::sleep(retry.delay).await;
                    }
                    Err(error) => {
                        tracing::warn!(cell = %cell, attempts, %error, "fetch failed terminally");
                        break Err(error);
                    }
                }
            };

            // The receiver outlives the runtime; a send only fails during
            // shutdown, where the result is moot.
            let _ = tx.send(FetchResult {
                cell,
                result,
                attempts,
            });
        });
    }
}
