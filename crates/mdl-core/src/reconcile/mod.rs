//! Progress reconciliation for one job.
//!
//! Two channels report on a running job: the push event stream and a
//! fixed-interval status poll. Whichever reports completion first claims the
//! [`FinalizeLatch`]; both channels are then released and the finished file's
//! descriptor is fetched exactly once. An error payload from either channel
//! ends the job without finalizing. Stream transport faults are not terminal.

mod latch;
mod poll;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::config::MdlConfig;
use crate::model::{Artifact, JobId, Percent, ProgressEvent};
use crate::stream::{ProgressStream, StreamItem};

pub use latch::{Channel, FinalizeLatch};

use self::poll::PollReport;

pub const FINALIZE_FAILED: &str = "Failed to get download link. Please try again.";

/// Receives progress updates while a job runs.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, event: &ProgressEvent);
}

/// Tuning for one reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    pub poll_interval: Duration,
    /// Fail the job when no percent advance is seen on either channel for this long.
    pub stall_timeout: Option<Duration>,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            stall_timeout: None,
        }
    }
}

impl ReconcilerOptions {
    pub fn from_config(cfg: &MdlConfig) -> Self {
        Self {
            poll_interval: cfg.poll_interval(),
            stall_timeout: cfg.stall_timeout(),
        }
    }
}

/// Where a job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// While waiting for completion (error payload, poll rejection, stall).
    Progress,
    /// Fetching the finished file's descriptor.
    Finalize,
}

/// How a reconciliation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed(Artifact),
    Failed { stage: Stage, message: String },
    /// Superseded or torn down before a terminal state.
    Cancelled,
}

/// Terminal decision of the watch loop, before finalize.
enum Verdict {
    Complete(Channel),
    Failed(String),
    Cancelled,
}

pub struct ProgressReconciler {
    backend: Arc<dyn Backend>,
    options: ReconcilerOptions,
}

impl ProgressReconciler {
    pub fn new(backend: Arc<dyn Backend>, options: ReconcilerOptions) -> Self {
        Self { backend, options }
    }

    /// Watch `job` until it completes, fails, or `cancel` fires.
    /// Finalize runs at most once, and only after both channels are released.
    pub async fn observe(
        &self,
        job: &JobId,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Outcome {
        let mut stream = match self.backend.subscribe_progress(job).await {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(job = %job, "progress stream unavailable, polling only: {}", e);
                None
            }
        };

        let latch = FinalizeLatch::new();
        let channels = cancel.child_token();
        let (poll_tx, mut poll_rx) = mpsc::channel(4);
        let poller = poll::spawn(
            Arc::clone(&self.backend),
            job.clone(),
            self.options.poll_interval,
            poll_tx,
            channels.clone(),
        );
        let mut stall = StallWatch::new(self.options.stall_timeout);
        let mut poll_open = true;

        let verdict = loop {
            tokio::select! {
                _ = cancel.cancelled() => break Verdict::Cancelled,
                item = next_item(&mut stream) => match item {
                    Some(StreamItem::Message(data)) => {
                        let event = match ProgressEvent::parse(&data) {
                            Ok(event) => event,
                            Err(e) => {
                                tracing::warn!(job = %job, "undecodable progress message: {}", e);
                                continue;
                            }
                        };
                        if let Some(error) = &event.error {
                            break Verdict::Failed(error.clone());
                        }
                        sink.progress(&event);
                        stall.observe(event.percent);
                        if event.percent.is_complete() && latch.claim(Channel::Stream) {
                            break Verdict::Complete(Channel::Stream);
                        }
                    }
                    Some(StreamItem::Fault(reason)) => {
                        tracing::debug!(job = %job, "progress stream fault, waiting for reconnect: {}", reason);
                    }
                    None => {
                        tracing::debug!(job = %job, "progress stream ended, relying on status poll");
                        stream = None;
                    }
                },
                report = poll_rx.recv(), if poll_open => match report {
                    Some(PollReport::Status(status)) => {
                        if let Some(failure) = status.failure() {
                            break Verdict::Failed(failure.to_string());
                        }
                        stall.observe(status.percent);
                        if status.is_complete() && latch.claim(Channel::Poll) {
                            break Verdict::Complete(Channel::Poll);
                        }
                    }
                    Some(PollReport::Rejected(message)) => break Verdict::Failed(message),
                    None => poll_open = false,
                },
                _ = until(stall.deadline()) => {
                    break Verdict::Failed(stall.message());
                }
            }
        };

        // Release both channels before anything else; late reports are dropped with them.
        channels.cancel();
        if let Some(mut s) = stream.take() {
            s.close();
        }
        drop(poll_rx);
        if let Err(e) = poller.await {
            tracing::warn!(job = %job, "status poll task: {}", e);
        }

        match verdict {
            Verdict::Cancelled => {
                tracing::debug!(job = %job, "job watch cancelled");
                Outcome::Cancelled
            }
            Verdict::Failed(message) => {
                tracing::warn!(job = %job, "job failed: {}", message);
                Outcome::Failed {
                    stage: Stage::Progress,
                    message,
                }
            }
            Verdict::Complete(winner) => {
                tracing::info!(job = %job, ?winner, "job complete");
                sink.progress(&ProgressEvent {
                    percent: Percent::COMPLETE,
                    speed: "Complete".to_string(),
                    eta: "Ready for download".to_string(),
                    error: None,
                });
                tokio::select! {
                    _ = cancel.cancelled() => Outcome::Cancelled,
                    outcome = self.finalize(job) => outcome,
                }
            }
        }
    }

    /// Fetch the finished file's descriptor.
    async fn finalize(&self, job: &JobId) -> Outcome {
        match self.backend.fetch_artifact(job).await {
            Ok(artifact) => {
                tracing::info!(job = %job, url = %artifact.download_url, "download link ready");
                Outcome::Completed(artifact)
            }
            Err(e) => {
                tracing::warn!(job = %job, "finalize failed: {}", e);
                let message = e
                    .server_message()
                    .map(str::to_string)
                    .unwrap_or_else(|| FINALIZE_FAILED.to_string());
                Outcome::Failed {
                    stage: Stage::Finalize,
                    message,
                }
            }
        }
    }
}

async fn next_item(stream: &mut Option<ProgressStream>) -> Option<StreamItem> {
    match stream {
        Some(s) => s.next().await,
        None => std::future::pending().await,
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Tracks the last percent advance for the stall fallback.
struct StallWatch {
    timeout: Option<Duration>,
    best: Percent,
    since: Instant,
}

impl StallWatch {
    fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            best: Percent::ZERO,
            since: Instant::now(),
        }
    }

    fn observe(&mut self, percent: Percent) {
        if percent > self.best {
            self.best = percent;
            self.since = Instant::now();
        }
    }

    fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|t| self.since + t)
    }

    fn message(&self) -> String {
        let secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
        format!("Download stalled: no progress for {secs} seconds")
    }
}
