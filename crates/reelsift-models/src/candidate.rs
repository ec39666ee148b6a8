//! Candidate videos as delivered by the discovery step.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Source platform of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Youtube,
    Tiktok,
    Instagram,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Platform {
    /// Returns the platform name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Youtube => "youtube",
            Platform::Tiktok => "tiktok",
            Platform::Instagram => "instagram",
            Platform::Unknown => "unknown",
        }
    }

    /// Display name used in human-readable reports.
    pub fn title(&self) -> &'static str {
        match self {
            Platform::Youtube => "Youtube",
            Platform::Tiktok => "Tiktok",
            Platform::Instagram => "Instagram",
            Platform::Unknown => "Unknown",
        }
    }

    /// Guess the platform from a video URL's host.
    pub fn from_url(raw: &str) -> Self {
        let host = match Url::parse(raw).ok().and_then(|u| u.host_str().map(str::to_lowercase)) {
            Some(h) => h,
            None => return Platform::Unknown,
        };
        let matches = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));

        if matches("youtube.com") || matches("youtu.be") {
            Platform::Youtube
        } else if matches("tiktok.com") {
            Platform::Tiktok
        } else if matches("instagram.com") {
            Platform::Instagram
        } else {
            Platform::Unknown
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A video discovered on some platform, not yet downloaded.
///
/// Scrapers often cannot see duration or dimensions; those arrive as absent
/// or as `0` and are treated as unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Platform-specific identifier
    #[serde(default)]
    pub id: String,
    /// Video title
    #[serde(default)]
    pub title: String,
    /// Canonical video URL
    pub url: String,
    /// Source platform (inferred from the URL when absent)
    #[serde(default)]
    pub platform: Platform,
    /// Duration in seconds, if known
    #[serde(default)]
    pub duration: Option<f64>,
    /// Width in pixels, if known
    #[serde(default)]
    pub width: Option<u32>,
    /// Height in pixels, if known
    #[serde(default)]
    pub height: Option<u32>,
    /// Channel or account name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
}

impl Candidate {
    /// Create a candidate from a bare URL.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            id: String::new(),
            title: String::new(),
            platform: Platform::from_url(&url),
            url,
            duration: None,
            width: None,
            height: None,
            uploader: None,
        }
    }

    /// Duration if known and positive.
    pub fn known_duration(&self) -> Option<f64> {
        self.duration.filter(|d| d.is_finite() && *d > 0.0)
    }

    /// Dimensions if both are known and positive.
    pub fn known_dimensions(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }

    /// Returns true when duration and both dimensions are known.
    pub fn has_complete_metadata(&self) -> bool {
        self.known_duration().is_some() && self.known_dimensions().is_some()
    }

    /// Fill platform from the URL when the source did not provide one.
    pub fn normalized(mut self) -> Self {
        if self.platform == Platform::Unknown {
            self.platform = Platform::from_url(&self.url);
        }
        self
    }
}
