//! Playback controller - owns the one current playback session
//!
//! **State machine:**
//! - `Idle → Playing` on any successful play
//! - `Playing → Playing` when switching source/backend (stop, then start)
//! - `Playing → Stopped` on `stop`
//! - `Stopped → Idle`, `Idle → Idle` on `stop` (no backend calls)
//!
//! Every play first stops whatever is active, so at most one backend ever
//! plays. The session mutex is held across the stop-then-start sequence.

use crate::capabilities::{LocalPlayer, LoopMode, StreamPlayer};
use crate::error::{PlayerError, Result};
use crate::lock;
use crate::pipeline::ExtractedAudio;
use crate::preparer::PreparedStream;
use bgm_common::events::{Backend, EventBus, PlaybackState, PlayerEvent};
use bgm_common::SourceDescriptor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Snapshot of the current playback session
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaybackSession {
    pub state: PlaybackState,
    pub backend: Backend,
    pub source: Option<SourceDescriptor>,
}

struct SessionInner {
    session: PlaybackSession,
    /// Downloaded artifact backing a local session; dropped with the session
    artifact: Option<ExtractedAudio>,
}

/// Dispatches playback to the local-loop or streaming backend
pub struct PlaybackController {
    local: Arc<dyn LocalPlayer>,
    stream: Arc<dyn StreamPlayer>,
    inner: Mutex<SessionInner>,
    events: EventBus,
}

impl PlaybackController {
    pub fn new(local: Arc<dyn LocalPlayer>, stream: Arc<dyn StreamPlayer>, events: EventBus) -> Self {
        Self {
            local,
            stream,
            inner: Mutex::new(SessionInner {
                session: PlaybackSession::default(),
                artifact: None,
            }),
            events,
        }
    }

    pub fn session(&self) -> PlaybackSession {
        lock(&self.inner).session.clone()
    }

    pub fn state(&self) -> PlaybackState {
        lock(&self.inner).session.state
    }

    /// Stop whichever backend is active. Idempotent, never fails.
    pub fn stop(&self) {
        let mut inner = lock(&self.inner);
        match inner.session.state {
            PlaybackState::Playing => self.stop_active(&mut inner),
            PlaybackState::Stopped => {
                inner.session.state = PlaybackState::Idle;
                debug!("Playback already stopped; session now idle");
            }
            PlaybackState::Idle => debug!("Nothing playing; stop is a no-op"),
        }
    }

    /// Stream a prepared URL
    ///
    /// Returns `Ok(false)` without touching the session when nothing is
    /// prepared, `Ok(true)` once the stream started.
    pub fn play_prepared(&self, prepared: Option<PreparedStream>) -> Result<bool> {
        let Some(prepared) = prepared else {
            warn!("No prepared stream URL to play");
            return Ok(false);
        };
        self.start_stream(&prepared.url, prepared.source)?;
        Ok(true)
    }

    /// Stream `url` as-is
    pub fn play_direct_url(&self, url: &str) -> Result<()> {
        self.start_stream(url, SourceDescriptor::direct_url(url))
    }

    /// Stream `url`, recording `source` as the session's origin
    pub fn play_stream(&self, url: &str, source: SourceDescriptor) -> Result<()> {
        self.start_stream(url, source)
    }

    /// Loop a local file forever
    pub fn play_local_loop(&self, path: &Path) -> Result<()> {
        let source = SourceDescriptor::local_file(path.to_string_lossy());
        self.start_local(path, source, None)
    }

    /// Loop a downloaded artifact; the artifact lives as long as the session
    pub fn play_extracted(&self, extracted: ExtractedAudio, source: SourceDescriptor) -> Result<()> {
        let path = extracted.path().to_path_buf();
        self.start_local(&path, source, Some(extracted))
    }

    fn start_stream(&self, url: &str, source: SourceDescriptor) -> Result<()> {
        let mut inner = lock(&self.inner);
        self.stop_if_playing(&mut inner);

        if url.trim().is_empty() {
            warn!("Empty stream URL. Skipping.");
            return Err(PlayerError::PlaybackFailure("empty stream URL".to_string()));
        }
        if !self.stream.init() {
            error!(url, "Stream player unavailable. Cannot stream.");
            return Err(PlayerError::CapabilityUnavailable(
                "stream player failed to initialize".to_string(),
            ));
        }

        info!(url, "Starting stream");
        self.stream
            .set_media(url)
            .and_then(|_| self.stream.play())
            .map_err(|e| {
                error!(url, "Failed to start stream: {}", e);
                PlayerError::PlaybackFailure(e.to_string())
            })?;

        self.mark_playing(&mut inner, Backend::StreamPlayer, source, None);
        info!("Streaming started");
        Ok(())
    }

    fn start_local(
        &self,
        path: &Path,
        source: SourceDescriptor,
        artifact: Option<ExtractedAudio>,
    ) -> Result<()> {
        let mut inner = lock(&self.inner);
        self.stop_if_playing(&mut inner);

        if !path.exists() {
            error!(path = %path.display(), "Local music file not found");
            return Err(PlayerError::FileNotFound(path.to_path_buf()));
        }
        if !self.local.is_available() {
            error!("Local player unavailable. Cannot play {}", path.display());
            return Err(PlayerError::CapabilityUnavailable(
                "local player not available".to_string(),
            ));
        }

        info!(path = %path.display(), "Loading local music");
        self.local
            .load(path)
            .and_then(|_| self.local.play(LoopMode::Forever))
            .map_err(|e| {
                error!(path = %path.display(), "Failed to play local music: {}", e);
                PlayerError::PlaybackFailure(e.to_string())
            })?;

        self.mark_playing(&mut inner, Backend::LocalPlayer, source, artifact);
        info!("Local music playing in loop");
        Ok(())
    }

    fn mark_playing(
        &self,
        inner: &mut SessionInner,
        backend: Backend,
        source: SourceDescriptor,
        artifact: Option<ExtractedAudio>,
    ) {
        inner.session = PlaybackSession {
            state: PlaybackState::Playing,
            backend,
            source: Some(source.clone()),
        };
        inner.artifact = artifact;
        self.events.emit(PlayerEvent::PlaybackStarted {
            backend,
            source,
            timestamp: chrono::Utc::now(),
        });
    }

    fn stop_if_playing(&self, inner: &mut SessionInner) {
        if inner.session.state == PlaybackState::Playing {
            self.stop_active(inner);
        }
    }

    fn stop_active(&self, inner: &mut SessionInner) {
        let backend = inner.session.backend;
        let result = match backend {
            Backend::LocalPlayer => self.local.stop(),
            Backend::StreamPlayer => self.stream.stop(),
            Backend::None => Ok(()),
        };
        match result {
            Ok(()) => info!(%backend, "Playback stopped"),
            Err(e) => debug!(%backend, "Ignoring stop error: {}", e),
        }

        inner.session.state = PlaybackState::Stopped;
        inner.session.backend = Backend::None;
        inner.artifact = None;
        self.events.emit(PlayerEvent::PlaybackStopped {
            backend,
            timestamp: chrono::Utc::now(),
        });
    }
}
