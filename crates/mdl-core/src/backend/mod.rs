//! The download service as seen from the client.
//!
//! [`Backend`] is the seam between job tracking and transport: the session and
//! reconciler only talk to this trait, [`HttpBackend`] implements it over
//! libcurl, and tests substitute scripted backends.

mod http;
mod reply;
mod request;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Artifact, DownloadRequest, DownloadStatus, JobId, MediaInfo, StartReply};
use crate::platform::Platform;
use crate::stream::ProgressStream;

pub use http::HttpBackend;

/// Failure talking to the download service.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection, TLS, timeout or other libcurl failure.
    #[error("transport: {0}")]
    Transport(#[from] curl::Error),
    /// Non-2xx status without a readable `{error}` body.
    #[error("HTTP {status}")]
    Http { status: u32 },
    /// 2xx reply that did not match the expected shape.
    #[error("decode reply: {0}")]
    Decode(#[from] serde_json::Error),
    /// The service answered with an `{error}` payload.
    #[error("{0}")]
    Server(String),
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
    /// The blocking request task was cancelled or panicked.
    #[error("request task: {0}")]
    Join(String),
}

impl BackendError {
    /// Message reported by the service itself, if this is a server-side rejection.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            BackendError::Server(msg) => Some(msg),
            _ => None,
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /api/info`: metadata for a URL.
    async fn fetch_info(&self, url: &str, platform: Platform) -> Result<MediaInfo, BackendError>;

    /// `POST /download`: create a job (or get a direct link).
    async fn start_download(&self, request: &DownloadRequest) -> Result<StartReply, BackendError>;

    /// `GET /progress/{id}`: open the job's event stream.
    async fn subscribe_progress(&self, job: &JobId) -> Result<ProgressStream, BackendError>;

    /// `GET /check_download/{id}`: one status poll.
    async fn check_status(&self, job: &JobId) -> Result<DownloadStatus, BackendError>;

    /// `GET /direct_download/{id}`: descriptor of the finished file.
    async fn fetch_artifact(&self, job: &JobId) -> Result<Artifact, BackendError>;

    /// Turn a link from a reply (often a server-relative path) into something a user can open.
    fn absolute_link(&self, link: &str) -> String {
        link.to_string()
    }
}
