//! Wire model for the download service.
//!
//! Replies are decoded leniently: unknown fields are ignored, missing display
//! fields fall back to defaults, and `{error}` payloads are split off by the
//! backend before these types are built.

mod percent;

pub use percent::Percent;

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::platform::Platform;

/// Opaque job identifier assigned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        JobId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for JobId {
    /// Accepts strings and numbers; ids are never interpreted.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::String(s) => Ok(JobId(s)),
            serde_json::Value::Number(n) => Ok(JobId(n.to_string())),
            other => Err(serde::de::Error::custom(format!(
                "job id must be a string or number, got {other}"
            ))),
        }
    }
}

/// Requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    #[default]
    Video,
    Audio,
}

impl MediaFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaFormat::Video => "video",
            MediaFormat::Audio => "audio",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" => Ok(MediaFormat::Video),
            "audio" => Ok(MediaFormat::Audio),
            other => Err(format!("unknown format '{other}' (expected video or audio)")),
        }
    }
}

/// Quality label understood by the service ("highest", "720p", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(String);

impl Quality {
    pub fn new(label: impl Into<String>) -> Self {
        Quality(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Quality("highest".to_string())
    }
}

/// One user-initiated download as submitted to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub platform: Platform,
    pub format: MediaFormat,
    /// Sent only for YouTube; other platforms ignore quality.
    pub quality: Option<Quality>,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, platform: Platform, format: MediaFormat, quality: Quality) -> Self {
        Self {
            url: url.into(),
            platform,
            format,
            quality: platform.supports_quality().then_some(quality),
        }
    }

    /// Form fields in submission order.
    pub fn form_fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![
            ("url", self.url.as_str()),
            ("platform", self.platform.as_str()),
            ("format", self.format.as_str()),
        ];
        if let Some(q) = &self.quality {
            fields.push(("quality", q.as_str()));
        }
        fields
    }
}

/// A tracked job: what the service accepted and under which id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub platform: Platform,
    pub format: MediaFormat,
    pub quality: Option<Quality>,
}

/// Body of `POST /api/info`.
#[derive(Debug, Clone, Serialize)]
pub struct InfoRequest<'a> {
    pub url: &'a str,
    pub platform: Platform,
}

/// Media duration: raw seconds or a label the service already formatted.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaDuration {
    Seconds(u64),
    Text(String),
}

impl MediaDuration {
    /// "MM minutes, SS seconds" for raw seconds; labels pass through.
    pub fn display(&self) -> String {
        match self {
            MediaDuration::Seconds(total) => {
                format!("{:02} minutes, {:02} seconds", total / 60, total % 60)
            }
            MediaDuration::Text(text) => text.clone(),
        }
    }
}

impl<'de> Deserialize<'de> for MediaDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Number(n) => {
                let secs = n
                    .as_u64()
                    .or_else(|| n.as_f64().map(|f| f.max(0.0).trunc() as u64))
                    .unwrap_or(0);
                Ok(MediaDuration::Seconds(secs))
            }
            serde_json::Value::String(s) => Ok(MediaDuration::Text(s)),
            other => Ok(MediaDuration::Text(other.to_string())),
        }
    }
}

/// Reply of `POST /api/info`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Display name as reported by the service ("YouTube").
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default, deserialize_with = "falsy_as_none")]
    pub duration: Option<MediaDuration>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub alternatives: Option<Vec<String>>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub is_video: Option<bool>,
}

/// 0, "", and null durations mean "unknown".
fn falsy_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<MediaDuration>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    let falsy = match &value {
        serde_json::Value::Null => true,
        serde_json::Value::Number(n) => n.as_f64() == Some(0.0),
        serde_json::Value::String(s) => s.is_empty(),
        _ => false,
    };
    if falsy {
        return Ok(None);
    }
    MediaDuration::deserialize(value)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

/// Flat shape of the `POST /download` reply before classification.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawStartReply {
    #[serde(default)]
    download_id: Option<JobId>,
    #[serde(default)]
    download_url: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    alternatives: Option<Vec<String>>,
}

/// Successful reply of `POST /download`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawStartReply")]
pub enum StartReply {
    /// Server-side job; progress arrives via stream and poll.
    Tracked { download_id: JobId },
    /// The file is ready to fetch right away.
    Direct {
        download_url: String,
        filename: Option<String>,
    },
    /// No direct download; the service suggests other routes.
    Alternatives {
        message: Option<String>,
        alternatives: Vec<String>,
    },
}

impl From<RawStartReply> for StartReply {
    fn from(raw: RawStartReply) -> Self {
        if let Some(download_id) = raw.download_id {
            return StartReply::Tracked { download_id };
        }
        if let Some(download_url) = raw.download_url.filter(|u| !u.is_empty()) {
            return StartReply::Direct {
                download_url,
                filename: raw.filename,
            };
        }
        StartReply::Alternatives {
            message: raw.message,
            alternatives: raw.alternatives.unwrap_or_default(),
        }
    }
}

/// One message of the progress event stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProgressEvent {
    #[serde(default)]
    pub percent: Percent,
    #[serde(default, deserialize_with = "display_string")]
    pub speed: String,
    #[serde(default, deserialize_with = "display_string")]
    pub eta: String,
    #[serde(default, deserialize_with = "non_empty")]
    pub error: Option<String>,
}

impl ProgressEvent {
    pub fn parse(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

/// Speed/ETA are display strings, but numbers are tolerated.
fn display_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

fn non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.is_empty() => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Bool(false)) => None,
        Some(other) => Some(other.to_string()),
    })
}

/// `download_info` object of `GET /check_download/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DownloadStatus {
    #[serde(default)]
    pub percent: Percent,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "non_empty")]
    pub error: Option<String>,
}

impl DownloadStatus {
    pub fn is_complete(&self) -> bool {
        self.percent.is_complete() || self.status.as_deref() == Some("complete")
    }

    /// Server-side failure recorded on the job, if any.
    pub fn failure(&self) -> Option<&str> {
        if let Some(e) = self.error.as_deref() {
            return Some(e);
        }
        match self.status.as_deref() {
            Some("error") => Some("Download failed"),
            _ => None,
        }
    }
}

/// Reply of `GET /check_download/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusReply {
    pub download_info: DownloadStatus,
}

/// Reply of `GET /direct_download/{id}`: where the finished file lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Artifact {
    pub download_url: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_extension")]
    pub format: String,
}

fn default_title() -> String {
    "download".to_string()
}

fn default_extension() -> String {
    "mp4".to_string()
}

impl Artifact {
    /// Suggested local filename: `<title>.<format>`.
    pub fn suggested_filename(&self) -> String {
        format!("{}.{}", self.title, self.format)
    }

    pub fn is_audio(&self) -> bool {
        self.format == "mp3"
    }
}
