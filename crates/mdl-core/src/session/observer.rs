//! What the session shows, and to whom.
//!
//! [`SessionObserver`] stands in for the page: every hook has a no-op default,
//! so front ends implement only what they render.

use crate::model::{Artifact, MediaFormat, MediaInfo, Percent, ProgressEvent};
use crate::platform::Platform;

use super::SessionState;

pub trait SessionObserver: Send + Sync {
    /// Live platform highlight; None clears it.
    fn platform_highlighted(&self, _platform: Option<Platform>) {}
    fn state_changed(&self, _state: SessionState) {}
    fn quality_options(&self, _visible: bool) {}
    fn info_ready(&self, _info: &InfoView) {}
    fn progress(&self, _progress: &ProgressView) {}
    fn error(&self, _message: &str) {}
    fn error_cleared(&self) {}
    /// The finished file, handed over once.
    fn presented(&self, _presentation: &Presentation) {}
    fn success(&self, _message: &str) {}
    fn alternatives(&self, _alternatives: &[String]) {}
    /// Finalize failed; the user may start over.
    fn retry_offered(&self, _message: &str) {}
}

/// Observer that shows nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SessionObserver for NullObserver {}

/// Thumbnail area of the info panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Thumbnail {
    Image(String),
    /// Instagram posts often come without one.
    InstagramPlaceholder,
    Hidden,
}

/// Info panel contents.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoView {
    pub title: String,
    pub author: String,
    pub platform_label: String,
    /// "Duration: MM minutes, SS seconds", when known.
    pub duration: Option<String>,
    pub thumbnail: Thumbnail,
    pub show_quality: bool,
    /// Facebook only.
    pub alternatives: Vec<String>,
    pub note: Option<String>,
}

impl InfoView {
    pub fn build(info: MediaInfo, platform: Platform, format: MediaFormat) -> Self {
        let thumbnail = match info.thumbnail.filter(|t| !t.is_empty()) {
            Some(src) => Thumbnail::Image(src),
            None if platform == Platform::Instagram => Thumbnail::InstagramPlaceholder,
            None => Thumbnail::Hidden,
        };
        let alternatives = match (platform, info.alternatives) {
            (Platform::Facebook, Some(list)) => list,
            _ => Vec::new(),
        };
        Self {
            title: non_empty_or(info.title, "No video title"),
            author: non_empty_or(info.author, "Unknown creator"),
            platform_label: info.platform.unwrap_or_default(),
            duration: info
                .duration
                .map(|d| format!("Duration: {}", d.display())),
            thumbnail,
            show_quality: quality_visible(platform, format),
            alternatives,
            note: info.note,
        }
    }
}

fn non_empty_or(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Quality options apply to YouTube video jobs only.
pub fn quality_visible(platform: Platform, format: MediaFormat) -> bool {
    platform.supports_quality() && format == MediaFormat::Video
}

/// Progress bar contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub percent: Percent,
    /// "Speed: <speed> | ETA: <eta>".
    pub details: String,
    /// Pulsing "downloading" look while below 100%.
    pub active: bool,
}

impl ProgressView {
    pub fn new(percent: Percent, speed: &str, eta: &str) -> Self {
        Self {
            percent,
            details: format!("Speed: {speed} | ETA: {eta}"),
            active: !percent.is_complete(),
        }
    }

    pub fn starting() -> Self {
        Self::new(Percent::ZERO, "Starting...", "Calculating...")
    }

    pub fn from_event(event: &ProgressEvent) -> Self {
        Self::new(event.percent, &event.speed, &event.eta)
    }
}

/// The finished file as handed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presentation {
    pub url: String,
    pub filename: String,
    pub headline: String,
    pub message: String,
}

impl Presentation {
    pub fn from_artifact(artifact: &Artifact, url: String) -> Self {
        let kind = if artifact.is_audio() { "audio" } else { "video" };
        Self {
            url,
            filename: artifact.suggested_filename(),
            headline: "Download Complete!".to_string(),
            message: format!("Your {kind} is ready."),
        }
    }

    /// Link returned directly by the start request (no server-side job).
    pub fn direct(url: String, filename: Option<String>) -> Self {
        Self {
            url,
            filename: filename
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| "download".to_string()),
            headline: "Download Ready".to_string(),
            message: "Download started successfully!".to_string(),
        }
    }
}
