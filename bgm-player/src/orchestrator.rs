//! Audio orchestrator - the one object callers talk to
//!
//! Constructed once per process and shared (`Arc<AudioOrchestrator>`) with the
//! UI/game/timer layer. Holds everything that would otherwise be process
//! globals: the current session, the prepared-stream slot, the located
//! transcoder, and the in-flight resolution handle.
//!
//! Main-thread calls (`play_prepared`, `play_direct_url`, `play_local_loop`,
//! `stop`) only pay backend start-up cost. Network and tool work always runs on
//! detached background workers that are never joined by the orchestrator.

use crate::capabilities::{
    CapabilityReport, Downloader, LocalPlayer, MediaResolver, StreamPlayer,
};
use crate::controller::{PlaybackController, PlaybackSession};
use crate::error::{PlayerError, Result};
use crate::pipeline::{DownloadPipeline, PipelineSettings};
use crate::preparer::{select_stream, PrepareStatus, PreparedStream, StreamPreparer};
use crate::tools::ToolLocator;
use bgm_common::events::{EventBus, PlayerEvent};
use bgm_common::{SourceDescriptor, SourceKind};
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Event channel capacity
const EVENT_CAPACITY: usize = 100;

/// Engines supplied by the environment
#[derive(Clone)]
pub struct Capabilities {
    pub local: Arc<dyn LocalPlayer>,
    pub stream: Arc<dyn StreamPlayer>,
    pub resolver: Arc<dyn MediaResolver>,
    pub downloader: Arc<dyn Downloader>,
    /// Locator for the transcoding tool used by the download pipeline
    pub transcoder: Arc<ToolLocator>,
}

/// Handle to a detached background worker
///
/// Dropping it detaches the worker (fire-and-forget).
#[derive(Debug)]
pub struct BackgroundTask {
    handle: JoinHandle<Result<()>>,
}

impl BackgroundTask {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker is done and return its outcome
    pub fn wait(self) -> Result<()> {
        self.handle.join().unwrap_or_else(|_| {
            Err(PlayerError::PlaybackFailure(
                "background worker panicked".to_string(),
            ))
        })
    }
}

/// Selects sources, prepares streams ahead of need, and drives playback
pub struct AudioOrchestrator {
    transcoder: Arc<ToolLocator>,
    resolver: Arc<dyn MediaResolver>,
    stream: Arc<dyn StreamPlayer>,
    local: Arc<dyn LocalPlayer>,
    downloader: Arc<dyn Downloader>,
    preparer: StreamPreparer,
    pipeline: Arc<DownloadPipeline>,
    controller: Arc<PlaybackController>,
    events: EventBus,
    report: CapabilityReport,
}

impl AudioOrchestrator {
    /// Wire up the orchestrator and probe every capability once
    pub fn new(capabilities: Capabilities, settings: PipelineSettings) -> Self {
        let events = EventBus::new(EVENT_CAPACITY);
        let Capabilities {
            local,
            stream,
            resolver,
            downloader,
            transcoder,
        } = capabilities;

        let preparer = StreamPreparer::new(Arc::clone(&resolver), events.clone());
        let pipeline = Arc::new(DownloadPipeline::new(
            Arc::clone(&transcoder),
            Arc::clone(&downloader),
            settings,
        ));
        let controller = Arc::new(PlaybackController::new(
            Arc::clone(&local),
            Arc::clone(&stream),
            events.clone(),
        ));

        let mut orchestrator = Self {
            transcoder,
            resolver,
            stream,
            local,
            downloader,
            preparer,
            pipeline,
            controller,
            events,
            report: CapabilityReport {
                local_player: false,
                stream_player: false,
                resolver: false,
                downloader: false,
                transcoder: false,
            },
        };
        orchestrator.report = orchestrator.probe();
        orchestrator
    }

    /// Check which engines are usable
    pub fn probe(&self) -> CapabilityReport {
        let report = CapabilityReport {
            local_player: self.local.is_available(),
            stream_player: self.stream.init(),
            resolver: self.resolver.is_available(),
            downloader: self.downloader.is_available(),
            transcoder: self.transcoder.locate().is_some(),
        };
        let missing = report.missing();
        if missing.is_empty() {
            info!("All playback capabilities available");
        } else {
            warn!("Unavailable capabilities: {}", missing.join(", "));
        }
        report
    }

    /// Startup probe result
    pub fn capabilities(&self) -> CapabilityReport {
        self.report
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> PlaybackSession {
        self.controller.session()
    }

    pub fn pipeline_settings(&self) -> &PipelineSettings {
        self.pipeline.settings()
    }

    // ----- preparation -----

    /// Resolve `source` in the background (single-flight)
    pub fn prepare(&self, source: SourceDescriptor) -> Result<PrepareStatus> {
        self.preparer.prepare(source)
    }

    /// Prepare only sources that need resolution
    pub fn prepare_source(&self, source: &SourceDescriptor) -> Result<Option<PrepareStatus>> {
        match source.kind() {
            SourceKind::MediaReference => {
                info!(reference = %source.location(), "Preparing stream while idle");
                self.prepare(source.clone()).map(Some)
            }
            SourceKind::DirectUrl => {
                info!(url = %source.location(), "Streaming URL needs no preparation; will start on play");
                Ok(None)
            }
            SourceKind::LocalFile => Ok(None),
        }
    }

    pub fn prepared_stream(&self) -> Option<PreparedStream> {
        self.preparer.get_prepared()
    }

    pub fn prepared_url(&self) -> Option<String> {
        self.preparer.prepared_url()
    }

    pub fn is_preparing(&self) -> bool {
        self.preparer.is_resolving()
    }

    /// Block until the in-flight resolution, if any, completes
    pub fn wait_for_preparation(&self) {
        self.preparer.wait_idle();
    }

    // ----- playback -----

    /// Stream the prepared URL; `Ok(false)` when nothing is prepared
    pub fn play_prepared(&self) -> Result<bool> {
        self.controller.play_prepared(self.preparer.get_prepared())
    }

    pub fn play_direct_url(&self, url: &str) -> Result<()> {
        self.controller.play_direct_url(url)
    }

    pub fn play_local_loop(&self, path: &Path) -> Result<()> {
        self.controller.play_local_loop(path)
    }

    /// Download, transcode, and loop `reference` on a background worker
    ///
    /// The current session is only replaced once an artifact exists; any
    /// pipeline failure leaves it untouched and is reported through the
    /// returned task and a `DownloadFailed` event.
    pub fn play_media_reference_download(&self, reference: &str) -> Result<BackgroundTask> {
        let source = SourceDescriptor::media_reference(reference);
        let pipeline = Arc::clone(&self.pipeline);
        let controller = Arc::clone(&self.controller);
        let events = self.events.clone();

        let handle = std::thread::Builder::new()
            .name("bgm-download".to_string())
            .spawn(move || {
                let outcome = pipeline
                    .download_and_extract(source.location())
                    .and_then(|extracted| controller.play_extracted(extracted, source.clone()));
                if let Err(e) = &outcome {
                    error!(reference = %source.location(), kind = %e.kind(), "Failed to download/play media: {}", e);
                    events.emit(PlayerEvent::DownloadFailed {
                        source,
                        kind: e.kind(),
                        message: e.to_string(),
                        timestamp: chrono::Utc::now(),
                    });
                }
                outcome
            })?;
        Ok(BackgroundTask { handle })
    }

    /// Resolve `reference` now and stream it, bypassing the prepared slot
    pub fn play_media_reference_stream(&self, reference: &str) -> Result<BackgroundTask> {
        if !self.resolver.is_available() {
            error!(reference, "Media resolver is not available; cannot stream reference");
            return Err(PlayerError::CapabilityUnavailable(
                "media resolver not installed".to_string(),
            ));
        }

        let source = SourceDescriptor::media_reference(reference);
        let resolver = Arc::clone(&self.resolver);
        let controller = Arc::clone(&self.controller);
        let events = self.events.clone();

        let handle = std::thread::Builder::new()
            .name("bgm-resolve-play".to_string())
            .spawn(move || {
                info!(reference = %source.location(), "Resolving stream URL for immediate playback");
                let resolved = resolver.resolve(source.location()).and_then(|media| {
                    select_stream(&media).ok_or_else(|| {
                        PlayerError::ResolutionFailure(format!(
                            "no playable audio stream for {}",
                            source.location()
                        ))
                    })
                });
                let (url, _) = match resolved {
                    Ok(found) => found,
                    Err(e) => {
                        error!(reference = %source.location(), "Failed to resolve stream: {}", e);
                        events.emit(PlayerEvent::PreparationFailed {
                            source,
                            kind: e.kind(),
                            message: e.to_string(),
                            timestamp: chrono::Utc::now(),
                        });
                        return Err(e);
                    }
                };
                info!("Resolved audio stream; handing off to stream player");
                controller.play_stream(&url, source)
            })?;
        Ok(BackgroundTask { handle })
    }

    /// Start playback for a configured source
    ///
    /// Media references use the prepared stream when it belongs to `source`,
    /// otherwise they are resolved now (or downloaded when `prefer_download`).
    /// Returns the background task when one was started.
    pub fn play_source(
        &self,
        source: &SourceDescriptor,
        prefer_download: bool,
    ) -> Result<Option<BackgroundTask>> {
        match source.kind() {
            SourceKind::DirectUrl => self.play_direct_url(source.location()).map(|_| None),
            SourceKind::LocalFile => self
                .play_local_loop(Path::new(source.location()))
                .map(|_| None),
            SourceKind::MediaReference if prefer_download => {
                self.play_media_reference_download(source.location()).map(Some)
            }
            SourceKind::MediaReference => {
                let prepared = self
                    .preparer
                    .get_prepared()
                    .filter(|p| &p.source == source);
                if self.controller.play_prepared(prepared)? {
                    return Ok(None);
                }
                info!("Prepared stream not ready; resolving and playing now");
                self.play_media_reference_stream(source.location()).map(Some)
            }
        }
    }

    /// Stop whatever is playing; always succeeds
    pub fn stop(&self) {
        self.controller.stop();
    }
}
