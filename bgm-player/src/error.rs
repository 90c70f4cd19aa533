//! Error types for bgm-player
//!
//! One variant per failure kind the orchestrator reports, plus transparent
//! wrappers for I/O and common-crate errors.

use bgm_common::events::FailureKind;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for bgm-player
#[derive(Error, Debug)]
pub enum PlayerError {
    /// Playback or resolution engine missing or failed to initialize
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// External transcoding tool could not be located
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// No playable candidate for a media reference
    #[error("Resolution failed: {0}")]
    ResolutionFailure(String),

    /// Local audio file does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Media download failed
    #[error("Download failed: {0}")]
    DownloadFailure(String),

    /// Transcoding produced no usable artifact
    #[error("Transcode failed: {0}")]
    TranscodeFailure(String),

    /// Backend refused to load or play
    #[error("Playback failed: {0}")]
    PlaybackFailure(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from bgm-common (configuration)
    #[error(transparent)]
    Common(#[from] bgm_common::Error),
}

impl PlayerError {
    /// Failure category for logging and events
    pub fn kind(&self) -> FailureKind {
        match self {
            PlayerError::CapabilityUnavailable(_) => FailureKind::CapabilityUnavailable,
            PlayerError::ToolNotFound(_) => FailureKind::ToolNotFound,
            PlayerError::ResolutionFailure(_) => FailureKind::ResolutionFailure,
            PlayerError::FileNotFound(_) => FailureKind::FileNotFound,
            PlayerError::DownloadFailure(_) => FailureKind::DownloadFailure,
            PlayerError::TranscodeFailure(_) => FailureKind::TranscodeFailure,
            PlayerError::PlaybackFailure(_) | PlayerError::Io(_) | PlayerError::Common(_) => {
                FailureKind::PlaybackFailure
            }
        }
    }
}

/// Convenience Result type using PlayerError
pub type Result<T> = std::result::Result<T, PlayerError>;
