//! Source platform detection.
//!
//! Detection is plain, case-sensitive substring matching on the raw URL. A URL
//! that matches nothing is rejected here, before any request is issued.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Platforms the download service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Instagram,
    Facebook,
}

/// Substring markers per platform, checked in this order.
const MARKERS: [(Platform, &[&str]); 3] = [
    (Platform::Youtube, &["youtube.com", "youtu.be"]),
    (Platform::Instagram, &["instagram.com", "instagr.am"]),
    (Platform::Facebook, &["facebook.com", "fb.com", "fb.watch"]),
];

impl Platform {
    /// Wire name sent in requests ("youtube", "instagram", "facebook").
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Youtube => "YouTube",
            Platform::Instagram => "Instagram",
            Platform::Facebook => "Facebook",
        }
    }

    /// Only YouTube jobs take a quality choice.
    pub fn supports_quality(self) -> bool {
        matches!(self, Platform::Youtube)
    }

    /// YouTube and Instagram jobs run server-side and report through the event
    /// stream; Facebook requests are answered synchronously.
    pub fn streams_progress(self) -> bool {
        matches!(self, Platform::Youtube | Platform::Instagram)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("Please enter a valid URL")]
    Empty,
    #[error("Unsupported URL. Please use YouTube, Instagram, or Facebook URL.")]
    Unsupported,
}

/// Detect the platform of a raw URL. Returns None for anything unsupported.
pub fn detect(url: &str) -> Option<Platform> {
    MARKERS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| url.contains(n)))
        .map(|(platform, _)| *platform)
}

/// Trim user input and resolve its platform. The returned URL is the trimmed input.
pub fn resolve(raw: &str) -> Result<(String, Platform), InputError> {
    let url = raw.trim();
    if url.is_empty() {
        return Err(InputError::Empty);
    }
    match detect(url) {
        Some(platform) => Ok((url.to_string(), platform)),
        None => Err(InputError::Unsupported),
    }
}
