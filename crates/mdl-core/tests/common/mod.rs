//! Shared fixtures for integration tests: a scripted in-memory service, a
//! recording observer and a minimal HTTP server for the curl backend.

#![allow(dead_code)]

pub mod service;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use mdl_core::backend::{Backend, BackendError};
use mdl_core::model::{
    Artifact, DownloadRequest, DownloadStatus, JobId, MediaInfo, Percent, ProgressEvent,
    StartReply,
};
use mdl_core::platform::Platform;
use mdl_core::reconcile::ProgressSink;
use mdl_core::session::{
    InfoView, Presentation, ProgressView, SessionObserver, SessionState,
};
use mdl_core::stream::{ProgressStream, StreamFeed, StreamItem};

/// Canned reply for one scripted call.
#[derive(Debug, Clone)]
pub enum Reply<T> {
    Ok(T),
    /// `{error}` payload from the service.
    Server(String),
    /// Non-2xx without a readable body.
    Http(u32),
}

impl<T: Clone> Reply<T> {
    fn produce(&self) -> Result<T, BackendError> {
        match self {
            Reply::Ok(v) => Ok(v.clone()),
            Reply::Server(msg) => Err(BackendError::Server(msg.clone())),
            Reply::Http(status) => Err(BackendError::Http { status: *status }),
        }
    }
}

pub fn status(percent: i64, state: &str) -> DownloadStatus {
    DownloadStatus {
        percent: Percent::clamped(percent),
        status: Some(state.to_string()),
        error: None,
    }
}

pub fn artifact(url: &str, title: &str, format: &str) -> Artifact {
    Artifact {
        download_url: url.to_string(),
        title: title.to_string(),
        format: format.to_string(),
    }
}

pub fn message(json: &str) -> StreamItem {
    StreamItem::Message(json.to_string())
}

/// In-memory download service driven by a script.
pub struct ScriptedBackend {
    pub info: Mutex<Reply<MediaInfo>>,
    pub start: Mutex<Reply<StartReply>>,
    /// Poll replies in order; the last one repeats.
    pub statuses: Mutex<VecDeque<Reply<DownloadStatus>>>,
    pub artifact: Mutex<Reply<Artifact>>,
    pub subscribe_fails: Mutex<bool>,

    pub info_calls: AtomicUsize,
    pub start_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub artifact_calls: AtomicUsize,
    pub last_request: Mutex<Option<DownloadRequest>>,

    feeds: Mutex<Vec<(JobId, StreamFeed)>>,
    /// For each subscribe: were all earlier streams already closed?
    closed_before_subscribe: Mutex<Vec<bool>>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            info: Mutex::new(Reply::Ok(MediaInfo {
                title: Some("Clip".into()),
                author: Some("someone".into()),
                ..MediaInfo::default()
            })),
            start: Mutex::new(Reply::Ok(StartReply::Tracked {
                download_id: JobId::new("abc123"),
            })),
            statuses: Mutex::new(VecDeque::from([Reply::Ok(status(0, "downloading"))])),
            artifact: Mutex::new(Reply::Ok(artifact(
                "/static/downloads/clip.mp4",
                "clip",
                "mp4",
            ))),
            subscribe_fails: Mutex::new(false),
            info_calls: AtomicUsize::new(0),
            start_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            artifact_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            feeds: Mutex::new(Vec::new()),
            closed_before_subscribe: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedBackend {
    pub fn with_statuses(self, replies: Vec<Reply<DownloadStatus>>) -> Self {
        *self.statuses.lock().unwrap() = replies.into();
        self
    }

    pub fn with_info(self, reply: Reply<MediaInfo>) -> Self {
        *self.info.lock().unwrap() = reply;
        self
    }

    pub fn with_start(self, reply: Reply<StartReply>) -> Self {
        *self.start.lock().unwrap() = reply;
        self
    }

    pub fn with_artifact(self, reply: Reply<Artifact>) -> Self {
        *self.artifact.lock().unwrap() = reply;
        self
    }

    pub fn without_stream(self) -> Self {
        *self.subscribe_fails.lock().unwrap() = true;
        self
    }

    pub fn set_start(&self, reply: Reply<StartReply>) {
        *self.start.lock().unwrap() = reply;
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> usize {
        self.feeds.lock().unwrap().len()
    }

    pub fn closed_before_subscribe(&self) -> Vec<bool> {
        self.closed_before_subscribe.lock().unwrap().clone()
    }

    /// Producer end of the `index`-th subscription, waiting for it to be opened.
    pub async fn feed(&self, index: usize) -> StreamFeed {
        for _ in 0..400 {
            if let Some((_, feed)) = self.feeds.lock().unwrap().get(index) {
                return feed.clone();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("stream {index} was never subscribed");
    }

    pub fn feed_job(&self, index: usize) -> JobId {
        self.feeds.lock().unwrap()[index].0.clone()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn fetch_info(&self, _url: &str, _platform: Platform) -> Result<MediaInfo, BackendError> {
        self.info_calls.fetch_add(1, Ordering::SeqCst);
        self.info.lock().unwrap().produce()
    }

    async fn start_download(&self, request: &DownloadRequest) -> Result<StartReply, BackendError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        self.start.lock().unwrap().produce()
    }

    async fn subscribe_progress(&self, job: &JobId) -> Result<ProgressStream, BackendError> {
        if *self.subscribe_fails.lock().unwrap() {
            return Err(BackendError::Http { status: 503 });
        }
        let (feed, stream) = ProgressStream::channel(job.clone());
        let mut feeds = self.feeds.lock().unwrap();
        let all_closed = feeds.iter().all(|(_, f)| f.is_cancelled());
        self.closed_before_subscribe.lock().unwrap().push(all_closed);
        feeds.push((job.clone(), feed));
        Ok(stream)
    }

    async fn check_status(&self, _job: &JobId) -> Result<DownloadStatus, BackendError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        let reply = if statuses.len() > 1 {
            statuses.pop_front()
        } else {
            statuses.front().cloned()
        };
        match reply {
            Some(r) => r.produce(),
            None => Ok(status(0, "downloading")),
        }
    }

    async fn fetch_artifact(&self, _job: &JobId) -> Result<Artifact, BackendError> {
        self.artifact_calls.fetch_add(1, Ordering::SeqCst);
        self.artifact.lock().unwrap().produce()
    }

    fn absolute_link(&self, link: &str) -> String {
        if link.starts_with('/') {
            format!("http://service.test{link}")
        } else {
            link.to_string()
        }
    }
}

/// Progress sink that keeps every event.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<ProgressEvent>>,
}

impl ProgressSink for RecordingSink {
    fn progress(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

impl RecordingSink {
    pub fn percents(&self) -> Vec<u8> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.percent.value())
            .collect()
    }
}

/// Everything a session showed, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Shown {
    Highlight(Option<Platform>),
    State(SessionState),
    QualityOptions(bool),
    Info(InfoView),
    Progress(ProgressView),
    Error(String),
    ErrorCleared,
    Presented(Presentation),
    Success(String),
    Alternatives(Vec<String>),
    Retry(String),
}

#[derive(Default)]
pub struct RecordingObserver {
    shown: Mutex<Vec<Shown>>,
}

impl RecordingObserver {
    pub fn shown(&self) -> Vec<Shown> {
        self.shown.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.shown()
            .into_iter()
            .filter_map(|s| match s {
                Shown::State(st) => Some(st),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.shown()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Error(e) => Some(e),
                _ => None,
            })
            .collect()
    }

    pub fn infos(&self) -> Vec<InfoView> {
        self.shown()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Info(i) => Some(i),
                _ => None,
            })
            .collect()
    }

    pub fn presentations(&self) -> Vec<Presentation> {
        self.shown()
            .into_iter()
            .filter_map(|s| match s {
                Shown::Presented(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn push(&self, item: Shown) {
        self.shown.lock().unwrap().push(item);
    }
}

impl SessionObserver for RecordingObserver {
    fn platform_highlighted(&self, platform: Option<Platform>) {
        self.push(Shown::Highlight(platform));
    }
    fn state_changed(&self, state: SessionState) {
        self.push(Shown::State(state));
    }
    fn quality_options(&self, visible: bool) {
        self.push(Shown::QualityOptions(visible));
    }
    fn info_ready(&self, info: &InfoView) {
        self.push(Shown::Info(info.clone()));
    }
    fn progress(&self, progress: &ProgressView) {
        self.push(Shown::Progress(progress.clone()));
    }
    fn error(&self, message: &str) {
        self.push(Shown::Error(message.to_string()));
    }
    fn error_cleared(&self) {
        self.push(Shown::ErrorCleared);
    }
    fn presented(&self, presentation: &Presentation) {
        self.push(Shown::Presented(presentation.clone()));
    }
    fn success(&self, message: &str) {
        self.push(Shown::Success(message.to_string()));
    }
    fn alternatives(&self, alternatives: &[String]) {
        self.push(Shown::Alternatives(alternatives.to_vec()));
    }
    fn retry_offered(&self, message: &str) {
        self.push(Shown::Retry(message.to_string()));
    }
}
