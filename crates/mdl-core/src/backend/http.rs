//! [`Backend`] over HTTP using libcurl on the blocking pool.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use url::Url;

use super::reply::decode_reply;
use super::request::{self, Body, RequestOptions};
use super::{Backend, BackendError};
use crate::config::MdlConfig;
use crate::model::{
    Artifact, DownloadRequest, DownloadStatus, InfoRequest, JobId, MediaInfo, StartReply,
    StatusReply,
};
use crate::platform::Platform;
use crate::stream::{self, ProgressStream, StreamOptions};

/// Client for one download service instance.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base: Url,
    requests: RequestOptions,
    stream: StreamOptions,
}

impl HttpBackend {
    pub fn new(cfg: &MdlConfig) -> Result<Self, BackendError> {
        Self::with_base_url(&cfg.server_url, cfg)
    }

    /// Like `new` but with an explicit base URL (e.g. a `--server` override).
    pub fn with_base_url(base: &str, cfg: &MdlConfig) -> Result<Self, BackendError> {
        let mut base = Url::parse(base).map_err(|e| BackendError::Endpoint(format!("{base}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(BackendError::Endpoint(format!("{base}: not a base URL")));
        }
        // Treat the base path as a directory so joins keep any prefix.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            requests: RequestOptions {
                connect_timeout: cfg.connect_timeout(),
                timeout: cfg.request_timeout(),
            },
            stream: StreamOptions::from_config(cfg),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base URL plus percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, BackendError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Endpoint(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn call<T>(&self, url: Url, body: Body) -> Result<T, BackendError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let opts = self.requests;
        let target = url.to_string();
        let (status, bytes) =
            tokio::task::spawn_blocking(move || request::perform(&target, &body, &opts))
                .await
                .map_err(|e| BackendError::Join(e.to_string()))??;
        tracing::debug!(url = %url, status, bytes = bytes.len(), "service reply");
        decode_reply(status, &bytes)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_info(&self, url: &str, platform: Platform) -> Result<MediaInfo, BackendError> {
        let body = serde_json::to_vec(&InfoRequest { url, platform })?;
        self.call(self.endpoint(&["api", "info"])?, Body::Json(body))
            .await
    }

    async fn start_download(&self, request: &DownloadRequest) -> Result<StartReply, BackendError> {
        let form = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(request.form_fields())
            .finish();
        self.call(self.endpoint(&["download"])?, Body::Form(form))
            .await
    }

    async fn subscribe_progress(&self, job: &JobId) -> Result<ProgressStream, BackendError> {
        let url = self.endpoint(&["progress", job.as_str()])?;
        tracing::debug!(job = %job, url = %url, "opening progress stream");
        Ok(stream::subscribe(url.to_string(), job.clone(), self.stream.clone()))
    }

    async fn check_status(&self, job: &JobId) -> Result<DownloadStatus, BackendError> {
        let reply: StatusReply = self
            .call(self.endpoint(&["check_download", job.as_str()])?, Body::None)
            .await?;
        Ok(reply.download_info)
    }

    async fn fetch_artifact(&self, job: &JobId) -> Result<Artifact, BackendError> {
        self.call(self.endpoint(&["direct_download", job.as_str()])?, Body::None)
            .await
    }

    fn absolute_link(&self, link: &str) -> String {
        // Server-relative paths resolve against the service origin, like a browser would.
        match self.base.join(link) {
            Ok(url) => url.to_string(),
            Err(_) => link.to_string(),
        }
    }
}
