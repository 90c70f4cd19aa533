//! Capability interfaces consumed by the orchestrator
//!
//! Concrete engines (players, resolvers, downloaders) are supplied by the
//! environment. Each exposes an availability probe so a missing engine is
//! reported once at startup as `CapabilityUnavailable` instead of failing
//! deep inside a call path.

use crate::error::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// How many times the local player repeats a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    Times(u32),
    Forever,
}

/// Player for audio files on local disk
pub trait LocalPlayer: Send + Sync {
    /// Whether the engine can be used at all
    fn is_available(&self) -> bool;

    fn load(&self, path: &Path) -> Result<()>;

    fn play(&self, loops: LoopMode) -> Result<()>;

    fn stop(&self) -> Result<()>;

    /// True once a file is loaded and can be played
    fn is_ready(&self) -> bool;
}

/// Player for network streams
pub trait StreamPlayer: Send + Sync {
    /// Lazily initialize the engine; idempotent. Returns false when the
    /// engine cannot be brought up.
    fn init(&self) -> bool;

    fn set_media(&self, url: &str) -> Result<()>;

    fn play(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;
}

/// One playable rendition reported by a resolver
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaFormat {
    pub has_audio: bool,
    pub has_video: bool,
    /// Audio bitrate in kbit/s, when known
    pub bitrate: Option<f64>,
    pub url: Option<String>,
}

impl MediaFormat {
    /// Audio-only rendition
    pub fn audio(url: impl Into<String>, bitrate: Option<f64>) -> Self {
        Self {
            has_audio: true,
            has_video: false,
            bitrate,
            url: Some(url.into()),
        }
    }

    pub fn is_audio_only(&self) -> bool {
        self.has_audio && !self.has_video
    }
}

/// Resolver answer for a media reference
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedMedia {
    pub formats: Vec<MediaFormat>,
    /// Generic top-level URL, used when no audio-only format exists
    pub url: Option<String>,
}

/// Turns a media reference into candidate formats
pub trait MediaResolver: Send + Sync {
    fn is_available(&self) -> bool;

    fn resolve(&self, reference: &str) -> Result<ResolvedMedia>;
}

/// Format selection expression handed to the downloader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelector(pub String);

impl Default for FormatSelector {
    fn default() -> Self {
        Self("bestaudio/best".to_string())
    }
}

impl FormatSelector {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Post-download transcode step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Postprocess {
    /// Target codec, also the artifact's file extension
    pub codec: String,
    pub quality_kbps: u32,
    /// Directory containing the transcoding tool
    pub tool_location: PathBuf,
}

/// Downloads a media reference into a directory
pub trait Downloader: Send + Sync {
    fn is_available(&self) -> bool;

    /// Fetch `reference` into `output_dir`, naming outputs `<stem>.<ext>`,
    /// then run `postprocess`. Output files are left in `output_dir`.
    fn fetch(
        &self,
        reference: &str,
        output_dir: &Path,
        output_stem: &str,
        format: &FormatSelector,
        postprocess: &Postprocess,
    ) -> Result<()>;
}

/// Supplies paths of tool binaries shipped alongside the application
pub trait BundledToolProvider: Send + Sync {
    fn bundled_path(&self, tool: &str) -> Option<PathBuf>;
}

/// Result of probing every capability once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapabilityReport {
    pub local_player: bool,
    pub stream_player: bool,
    pub resolver: bool,
    pub downloader: bool,
    pub transcoder: bool,
}

impl CapabilityReport {
    /// Names of the missing capabilities
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.local_player {
            missing.push("local player");
        }
        if !self.stream_player {
            missing.push("stream player");
        }
        if !self.resolver {
            missing.push("media resolver");
        }
        if !self.downloader {
            missing.push("downloader");
        }
        if !self.transcoder {
            missing.push("transcoder");
        }
        missing
    }
}
