//! Fixed-interval status poll that backs up the event stream.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, BackendError};
use crate::model::{DownloadStatus, JobId};

/// What one poll produced, as seen by the reconciler.
#[derive(Debug)]
pub(super) enum PollReport {
    Status(DownloadStatus),
    /// The service rejected the poll (`{error}`, e.g. unknown job). Terminal.
    Rejected(String),
}

/// Spawn the poll loop. The first check happens one interval after start.
/// Transport failures are logged and the loop keeps going; a rejection is
/// reported once and ends the loop.
pub(super) fn spawn(
    backend: Arc<dyn Backend>,
    job: JobId,
    interval: Duration,
    reports: mpsc::Sender<PollReport>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                r = backend.check_status(&job) => r,
            };
            let report = match result {
                Ok(status) => {
                    tracing::trace!(job = %job, percent = status.percent.value(), "status poll");
                    PollReport::Status(status)
                }
                Err(BackendError::Server(message)) => PollReport::Rejected(message),
                Err(e) => {
                    tracing::warn!(job = %job, "status poll failed: {}", e);
                    continue;
                }
            };
            let terminal = matches!(report, PollReport::Rejected(_));
            if reports.send(report).await.is_err() || terminal {
                break;
            }
        }
        tracing::debug!(job = %job, "status poll stopped");
    })
}
