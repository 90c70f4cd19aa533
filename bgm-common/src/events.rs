//! Playback state and event types
//!
//! Provides the session state enums shared by the player and its callers,
//! plus [`PlayerEvent`] and the [`EventBus`] that distributes them.

use crate::source::SourceDescriptor;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Playback session state
///
/// `Idle` is both the initial and the resting state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Stopped,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Playback mechanism driving the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    #[default]
    None,
    /// Looping player for files on disk
    LocalPlayer,
    /// Network streaming player
    StreamPlayer,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::None => write!(f, "none"),
            Backend::LocalPlayer => write!(f, "local_player"),
            Backend::StreamPlayer => write!(f, "stream_player"),
        }
    }
}

/// Failure categories reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Playback or resolution engine missing
    CapabilityUnavailable,
    /// Transcoding tool could not be located
    ToolNotFound,
    /// No playable candidate for a media reference
    ResolutionFailure,
    /// Local asset absent
    FileNotFound,
    DownloadFailure,
    TranscodeFailure,
    PlaybackFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::CapabilityUnavailable => "capability_unavailable",
            FailureKind::ToolNotFound => "tool_not_found",
            FailureKind::ResolutionFailure => "resolution_failure",
            FailureKind::FileNotFound => "file_not_found",
            FailureKind::DownloadFailure => "download_failure",
            FailureKind::TranscodeFailure => "transcode_failure",
            FailureKind::PlaybackFailure => "playback_failure",
        };
        f.write_str(name)
    }
}

/// Player event types
///
/// Background work (resolution, download) finishes after the call that
/// started it has returned; these events are how callers learn the outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// A background resolution filled the prepared-stream slot
    StreamPrepared {
        source: SourceDescriptor,
        url: String,
        bitrate: Option<f64>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A background resolution finished without a usable URL
    PreparationFailed {
        source: SourceDescriptor,
        kind: FailureKind,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A backend started playing
    PlaybackStarted {
        backend: Backend,
        source: SourceDescriptor,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The active backend was stopped
    PlaybackStopped {
        backend: Backend,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Download/extract pipeline (or the play that followed it) failed
    DownloadFailed {
        source: SourceDescriptor,
        kind: FailureKind,
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Event type name (matches the serde tag)
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::StreamPrepared { .. } => "StreamPrepared",
            PlayerEvent::PreparationFailed { .. } => "PreparationFailed",
            PlayerEvent::PlaybackStarted { .. } => "PlaybackStarted",
            PlayerEvent::PlaybackStopped { .. } => "PlaybackStopped",
            PlayerEvent::DownloadFailed { .. } => "DownloadFailed",
        }
    }
}

/// Central event distribution bus
///
/// Wraps a tokio broadcast channel: publishing never blocks, subscribers
/// that fall behind see `Lagged`, and events emitted before a subscription
/// are not replayed. Sending does not need a running runtime.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; having no subscribers is not an error for the player
    pub fn emit(&self, event: PlayerEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("PlayerEvent dropped: no subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
