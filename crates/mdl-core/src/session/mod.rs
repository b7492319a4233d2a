//! One user's download session.
//!
//! A [`Session`] owns the single active job, its channel handles and the state
//! machine, and reports everything through a [`SessionObserver`]. Starting a
//! new job always releases the previous job's stream and poll first.

mod observer;
mod state;

use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, BackendError};
use crate::config::MdlConfig;
use crate::model::{DownloadRequest, Job, MediaFormat, Percent, ProgressEvent, Quality, StartReply};
use crate::platform::{self, InputError, Platform};
use crate::reconcile::{Outcome, ProgressReconciler, ProgressSink, ReconcilerOptions, Stage};

pub use observer::{
    quality_visible, InfoView, NullObserver, Presentation, ProgressView, SessionObserver,
    Thumbnail,
};
pub use state::SessionState;

pub const INFO_FAILED: &str = "Failed to fetch video information. Please try again.";
pub const START_FAILED: &str = "Failed to start download. Please try again.";
pub const NO_DIRECT_DOWNLOAD: &str = "Direct download is not available for this URL";
pub const DIRECT_STARTED: &str = "Download started successfully!";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Input(#[from] InputError),
    /// The service refused the request; the text is shown as-is.
    #[error("{0}")]
    Rejected(String),
    #[error("{message}")]
    Backend {
        message: &'static str,
        #[source]
        source: BackendError,
    },
    #[error("{0}")]
    Unavailable(String),
    #[error("cannot start a download while {0}")]
    NotReady(SessionState),
}

/// How a tracked job ended, as seen by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Complete(Presentation),
    Failed { message: String, retryable: bool },
    Cancelled,
}

/// State shared with the running job task.
struct StateCell {
    state: Mutex<SessionState>,
    observer: Arc<dyn SessionObserver>,
}

impl StateCell {
    fn get(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Apply a transition if the state machine allows it.
    fn set(&self, next: SessionState) -> bool {
        {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            if *state == next {
                return true;
            }
            if !state.can_transition_to(next) {
                tracing::warn!(from = %*state, to = %next, "ignoring invalid state transition");
                return false;
            }
            tracing::debug!(from = %*state, to = %next, "session state");
            *state = next;
        }
        self.observer.state_changed(next);
        true
    }
}

/// Forwards reconciler progress to the observer.
struct ObserverSink<'a>(&'a dyn SessionObserver);

impl ProgressSink for ObserverSink<'_> {
    fn progress(&self, event: &ProgressEvent) {
        self.0.progress(&ProgressView::from_event(event));
    }
}

struct ActiveJob {
    job: Job,
    cancel: CancellationToken,
    handle: JoinHandle<JobOutcome>,
}

pub struct Session {
    backend: Arc<dyn Backend>,
    observer: Arc<dyn SessionObserver>,
    options: ReconcilerOptions,
    cell: Arc<StateCell>,
    format: MediaFormat,
    quality: Quality,
    /// Platform of the last successful info lookup.
    platform: Option<Platform>,
    active: Option<ActiveJob>,
}

impl Session {
    pub fn new(
        backend: Arc<dyn Backend>,
        observer: Arc<dyn SessionObserver>,
        cfg: &MdlConfig,
    ) -> Self {
        Self::with_options(
            backend,
            observer,
            ReconcilerOptions::from_config(cfg),
            cfg.default_format,
            cfg.default_quality.clone(),
        )
    }

    pub fn with_options(
        backend: Arc<dyn Backend>,
        observer: Arc<dyn SessionObserver>,
        options: ReconcilerOptions,
        format: MediaFormat,
        quality: Quality,
    ) -> Self {
        let cell = Arc::new(StateCell {
            state: Mutex::new(SessionState::Idle),
            observer: Arc::clone(&observer),
        });
        Self {
            backend,
            observer,
            options,
            cell,
            format,
            quality,
            platform: None,
            active: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.cell.get()
    }

    pub fn format(&self) -> MediaFormat {
        self.format
    }

    /// The tracked job, while one is being watched.
    pub fn active_job(&self) -> Option<&Job> {
        self.active.as_ref().map(|a| &a.job)
    }

    /// Highlight the platform of partially typed input. No network.
    pub fn highlight(&self, input: &str) -> Option<Platform> {
        let platform = platform::detect(input.trim());
        self.observer.platform_highlighted(platform);
        platform
    }

    pub fn select_format(&mut self, format: MediaFormat) {
        self.format = format;
        let visible = match self.platform {
            Some(p) => quality_visible(p, format),
            None => format == MediaFormat::Video,
        };
        self.observer.quality_options(visible);
    }

    pub fn select_quality(&mut self, quality: Quality) {
        self.quality = quality;
    }

    /// Begin a new job by looking up the URL's metadata.
    ///
    /// Invalid input is rejected before any request; otherwise the previous
    /// job is superseded and the session moves through `awaiting_info`.
    pub async fn fetch_info(&mut self, raw_url: &str) -> Result<InfoView, SessionError> {
        let (url, platform) = match platform::resolve(raw_url) {
            Ok(resolved) => resolved,
            Err(e) => {
                if e == InputError::Unsupported {
                    self.observer.platform_highlighted(None);
                }
                self.observer.error(&e.to_string());
                return Err(e.into());
            }
        };

        self.supersede().await;
        self.platform = None;
        self.cell.set(SessionState::Idle);
        self.observer.error_cleared();
        self.observer.platform_highlighted(Some(platform));
        self.cell.set(SessionState::AwaitingInfo);

        tracing::info!(url = %url, platform = %platform, "fetching media info");
        match self.backend.fetch_info(&url, platform).await {
            Ok(info) => {
                let view = InfoView::build(info, platform, self.format);
                self.platform = Some(platform);
                self.cell.set(SessionState::InfoReady);
                self.observer.info_ready(&view);
                Ok(view)
            }
            Err(e) => Err(self.fail_request(e, INFO_FAILED)),
        }
    }

    /// Submit the download for `raw_url`. Requires a completed info lookup.
    ///
    /// Tracked jobs are watched in a background task; use [`Session::wait`]
    /// for the outcome. Direct links are presented immediately.
    pub async fn start_download(&mut self, raw_url: &str) -> Result<(), SessionError> {
        let state = self.state();
        if state != SessionState::InfoReady {
            return Err(SessionError::NotReady(state));
        }
        let (url, platform) = match platform::resolve(raw_url) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.observer.error(&e.to_string());
                return Err(e.into());
            }
        };

        // Only one job may hold channels; anything left over is released first.
        self.supersede().await;
        self.cell.set(SessionState::Downloading);
        self.observer.progress(&ProgressView::starting());

        let request = DownloadRequest::new(url, platform, self.format, self.quality.clone());
        tracing::info!(url = %request.url, platform = %platform, format = %request.format, "starting download");
        let reply = match self.backend.start_download(&request).await {
            Ok(reply) => reply,
            Err(e) => return Err(self.fail_request(e, START_FAILED)),
        };

        match reply {
            StartReply::Tracked { download_id } => {
                let job = Job {
                    id: download_id,
                    platform,
                    format: request.format,
                    quality: request.quality,
                };
                tracing::info!(job = %job.id, "download job created");
                self.spawn_watch(job);
                Ok(())
            }
            StartReply::Direct {
                download_url,
                filename,
            } => {
                let url = self.backend.absolute_link(&download_url);
                let presentation = Presentation::direct(url, filename);
                self.observer.presented(&presentation);
                self.cell.set(SessionState::Complete);
                self.observer.success(DIRECT_STARTED);
                Ok(())
            }
            StartReply::Alternatives {
                message,
                alternatives,
            } => {
                if !alternatives.is_empty() {
                    self.observer.alternatives(&alternatives);
                }
                let message = message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| NO_DIRECT_DOWNLOAD.to_string());
                self.observer.error(&message);
                self.cell.set(SessionState::Error);
                Err(SessionError::Unavailable(message))
            }
        }
    }

    /// Wait for the tracked job to finish. None if no job is being watched.
    /// Cancel-safe: dropping the future leaves the job active.
    pub async fn wait(&mut self) -> Option<JobOutcome> {
        let result = (&mut self.active.as_mut()?.handle).await;
        let active = self.active.take()?;
        Some(match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(job = %active.job.id, "job task: {}", e);
                JobOutcome::Cancelled
            }
        })
    }

    /// "New Download" / "Try Again": release everything and return to idle.
    pub async fn reset(&mut self) {
        self.supersede().await;
        self.platform = None;
        self.cell.set(SessionState::Idle);
        self.observer.error_cleared();
        self.observer.platform_highlighted(None);
        self.observer.progress(&ProgressView::new(Percent::ZERO, "0 MB/s", "Calculating..."));
    }

    /// Unload hook: close the stream and stop polling without waiting.
    pub fn teardown(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!(job = %active.job.id, "session teardown");
            active.cancel.cancel();
        }
    }

    /// Cancel the active job and wait until its channels are released.
    async fn supersede(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::info!(job = %active.job.id, "superseding active job");
            active.cancel.cancel();
            if let Err(e) = active.handle.await {
                tracing::warn!(job = %active.job.id, "superseded job task: {}", e);
            }
        }
    }

    fn spawn_watch(&mut self, job: Job) {
        let cancel = CancellationToken::new();
        let reconciler = ProgressReconciler::new(Arc::clone(&self.backend), self.options.clone());
        let backend = Arc::clone(&self.backend);
        let observer = Arc::clone(&self.observer);
        let cell = Arc::clone(&self.cell);
        let token = cancel.clone();
        let id = job.id.clone();

        let handle = tokio::spawn(async move {
            let outcome = reconciler
                .observe(&id, &ObserverSink(observer.as_ref()), token)
                .await;
            match outcome {
                Outcome::Completed(artifact) => {
                    let url = backend.absolute_link(&artifact.download_url);
                    let presentation = Presentation::from_artifact(&artifact, url);
                    observer.presented(&presentation);
                    cell.set(SessionState::Complete);
                    JobOutcome::Complete(presentation)
                }
                Outcome::Failed {
                    stage: Stage::Progress,
                    message,
                } => {
                    observer.error(&message);
                    cell.set(SessionState::Error);
                    JobOutcome::Failed {
                        message,
                        retryable: false,
                    }
                }
                Outcome::Failed {
                    stage: Stage::Finalize,
                    message,
                } => {
                    observer.retry_offered(&message);
                    cell.set(SessionState::Error);
                    JobOutcome::Failed {
                        message,
                        retryable: true,
                    }
                }
                Outcome::Cancelled => JobOutcome::Cancelled,
            }
        });

        self.active = Some(ActiveJob {
            job,
            cancel,
            handle,
        });
    }

    /// Report a failed request and move to `error`.
    fn fail_request(&self, e: BackendError, fallback: &'static str) -> SessionError {
        let err = match e {
            BackendError::Server(message) => SessionError::Rejected(message),
            other => {
                tracing::warn!("request failed: {}", other);
                SessionError::Backend {
                    message: fallback,
                    source: other,
                }
            }
        };
        self.observer.error(&err.to_string());
        self.cell.set(SessionState::Error);
        err
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
