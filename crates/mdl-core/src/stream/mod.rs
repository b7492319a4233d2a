//! Per-job progress event stream.
//!
//! A [`ProgressStream`] is the consumer end of one job's push channel. The
//! producer end ([`StreamFeed`]) is driven by a transport: the libcurl
//! subscriber in this module, or a scripted feed in tests. Closing or dropping
//! the stream cancels the feed, which tears the connection down.

mod backoff;
mod curl_feed;
mod sse;

use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::MdlConfig;
use crate::model::JobId;

pub use backoff::ReconnectPolicy;
pub use sse::SseParser;

/// Buffered items between the transport thread and the reconciler.
const FEED_CAPACITY: usize = 64;

/// One item delivered by the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// Payload of one event (the joined `data:` lines).
    Message(String),
    /// Transport trouble. Not terminal: the feed reconnects on its own.
    Fault(String),
}

/// Transport settings for the libcurl subscriber.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub connect_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

impl StreamOptions {
    pub fn from_config(cfg: &MdlConfig) -> Self {
        Self {
            connect_timeout: cfg.connect_timeout(),
            reconnect: ReconnectPolicy::new(
                Duration::from_millis(cfg.stream.reconnect_base_ms),
                Duration::from_secs(cfg.stream.reconnect_max_secs),
            ),
        }
    }
}

/// Consumer end of a job's event stream.
#[derive(Debug)]
pub struct ProgressStream {
    job: JobId,
    rx: mpsc::Receiver<StreamItem>,
    cancel: CancellationToken,
}

/// Producer end of a job's event stream.
#[derive(Debug, Clone)]
pub struct StreamFeed {
    tx: mpsc::Sender<StreamItem>,
    cancel: CancellationToken,
}

impl ProgressStream {
    /// Create a connected feed/stream pair for `job`.
    pub fn channel(job: JobId) -> (StreamFeed, ProgressStream) {
        let (tx, rx) = mpsc::channel(FEED_CAPACITY);
        let cancel = CancellationToken::new();
        (
            StreamFeed {
                tx,
                cancel: cancel.clone(),
            },
            ProgressStream { job, rx, cancel },
        )
    }

    pub fn job(&self) -> &JobId {
        &self.job
    }

    /// Next item; None once the feed has gone away or the stream was closed.
    pub async fn next(&mut self) -> Option<StreamItem> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.rx.recv().await
    }

    /// Release the subscription. Items still buffered are discarded.
    pub fn close(&mut self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(job = %self.job, "closing progress stream");
        }
        self.cancel.cancel();
        self.rx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for ProgressStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl StreamFeed {
    /// True once the consumer closed or dropped the stream.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves when the consumer closes the stream.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Deliver an item from async code. Returns false if the consumer is gone.
    pub async fn send(&self, item: StreamItem) -> bool {
        !self.is_cancelled() && self.tx.send(item).await.is_ok()
    }

    /// Deliver an item from a blocking thread. Returns false if the consumer is gone.
    /// Must not be called from inside the async runtime.
    pub fn blocking_send(&self, item: StreamItem) -> bool {
        !self.is_cancelled() && self.tx.blocking_send(item).is_ok()
    }
}

/// Open the libcurl event-stream subscription for `url` on the blocking pool.
pub fn subscribe(url: String, job: JobId, opts: StreamOptions) -> ProgressStream {
    let (feed, stream) = ProgressStream::channel(job.clone());
    tokio::task::spawn_blocking(move || curl_feed::run(&url, &job, &feed, &opts));
    stream
}
