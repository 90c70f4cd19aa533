//! Music source descriptors and the source-selection policy
//!
//! A source is chosen once at startup from [`MusicConfig`]. Selection is a pure
//! decision: nothing is resolved, downloaded, or checked on disk here.

use crate::config::MusicConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hosts whose page URLs must be resolved before they can be played
pub const MEDIA_HOSTS: &[&str] = &["youtube.com", "youtu.be"];

/// Kind of music source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Audio file on local disk
    LocalFile,
    /// URL already pointing at a playable stream
    DirectUrl,
    /// Page URL on a media host; needs resolution
    MediaReference,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::LocalFile => write!(f, "local_file"),
            SourceKind::DirectUrl => write!(f, "direct_url"),
            SourceKind::MediaReference => write!(f, "media_reference"),
        }
    }
}

/// Immutable description of where music comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceDescriptor {
    kind: SourceKind,
    location: String,
}

impl SourceDescriptor {
    pub fn new(kind: SourceKind, location: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
        }
    }

    pub fn local_file(path: impl Into<String>) -> Self {
        Self::new(SourceKind::LocalFile, path)
    }

    pub fn direct_url(url: impl Into<String>) -> Self {
        Self::new(SourceKind::DirectUrl, url)
    }

    pub fn media_reference(url: impl Into<String>) -> Self {
        Self::new(SourceKind::MediaReference, url)
    }

    /// Classify a URL: media-host pages become `MediaReference`, anything else `DirectUrl`
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        if looks_like_media_reference(&url) {
            Self::media_reference(url)
        } else {
            Self::direct_url(url)
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// True when the location must go through a resolver before playback
    pub fn needs_resolution(&self) -> bool {
        self.kind == SourceKind::MediaReference
    }
}

impl fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.location)
    }
}

/// Host substring match against [`MEDIA_HOSTS`]
pub fn looks_like_media_reference(url: &str) -> bool {
    MEDIA_HOSTS.iter().any(|host| url.contains(host))
}

/// Pick exactly one source by priority:
/// explicit stream URL > media-reference URL > local file > none
pub fn select_source(music: &MusicConfig) -> Option<SourceDescriptor> {
    if let Some(url) = music.stream_url.as_deref().filter(|u| !u.is_empty()) {
        return Some(SourceDescriptor::from_url(url));
    }
    if let Some(url) = music.media_reference_url.as_deref().filter(|u| !u.is_empty()) {
        return Some(SourceDescriptor::from_url(url));
    }
    music
        .local_fallback_path
        .as_ref()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| SourceDescriptor::local_file(p.to_string_lossy()))
}
