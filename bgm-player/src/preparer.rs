//! Background stream preparation
//!
//! Resolves a media reference to a direct stream URL ahead of need and keeps
//! the result in a single-slot cache for later synchronous playback.
//!
//! - Single-flight: while one resolution runs, further `prepare` calls are
//!   dropped (not queued).
//! - The slot holds the most recently *completed* resolution; a failed
//!   resolution leaves it unchanged.
//! - Workers are detached threads; nothing joins them and they never hold up
//!   process exit.

use crate::capabilities::{MediaResolver, ResolvedMedia};
use crate::error::{PlayerError, Result};
use crate::lock;
use bgm_common::events::{EventBus, PlayerEvent};
use bgm_common::{SourceDescriptor, SourceKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error, info};

/// A resolved, cached, not-yet-played stream
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedStream {
    pub url: String,
    pub bitrate: Option<f64>,
    pub source: SourceDescriptor,
}

/// Outcome of a `prepare` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrepareStatus {
    /// A new background resolution was started
    Spawned,
    /// A resolution was already running; this call did nothing
    AlreadyInFlight,
}

/// Pick the stream to play from a resolver answer
///
/// Audio-only formats with a URL are candidates; the highest bitrate wins
/// (missing bitrate ranks as 0, ties keep the first seen). Without candidates
/// the generic top-level URL is used.
pub fn select_stream(media: &ResolvedMedia) -> Option<(String, Option<f64>)> {
    let mut best: Option<(&str, Option<f64>)> = None;
    for format in media.formats.iter().filter(|f| f.is_audio_only()) {
        let Some(url) = format.url.as_deref().filter(|u| !u.is_empty()) else {
            continue;
        };
        let rank = format.bitrate.unwrap_or(0.0);
        match best {
            Some((_, current)) if current.unwrap_or(0.0) >= rank => {}
            _ => best = Some((url, format.bitrate)),
        }
    }

    if let Some((url, bitrate)) = best {
        return Some((url.to_string(), bitrate));
    }
    media
        .url
        .as_deref()
        .filter(|u| !u.is_empty())
        .map(|u| (u.to_string(), None))
}

/// Clears the in-flight flag when the worker ends, including by panic
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs resolution in the background and caches one prepared stream
pub struct StreamPreparer {
    resolver: Arc<dyn MediaResolver>,
    slot: Arc<Mutex<Option<PreparedStream>>>,
    in_flight: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
    events: EventBus,
}

impl StreamPreparer {
    pub fn new(resolver: Arc<dyn MediaResolver>, events: EventBus) -> Self {
        Self {
            resolver,
            slot: Arc::new(Mutex::new(None)),
            in_flight: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
            events,
        }
    }

    /// Start resolving `source` in the background unless a resolution is running
    ///
    /// # Errors
    ///
    /// - `CapabilityUnavailable` when the resolver is missing
    /// - `ResolutionFailure` for a local file (nothing to resolve)
    /// - `Io` if the worker thread cannot be spawned
    pub fn prepare(&self, source: SourceDescriptor) -> Result<PrepareStatus> {
        if source.kind() == SourceKind::LocalFile {
            return Err(PlayerError::ResolutionFailure(format!(
                "local file {} cannot be resolved to a stream",
                source.location()
            )));
        }
        if !self.resolver.is_available() {
            error!(reference = %source.location(), "Media resolver is not available; cannot prepare stream");
            return Err(PlayerError::CapabilityUnavailable(
                "media resolver not installed".to_string(),
            ));
        }

        // Held across spawn so handles are stored in spawn order
        let mut task = lock(&self.task);
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!(reference = %source.location(), "Stream resolution already in progress");
            return Ok(PrepareStatus::AlreadyInFlight);
        }

        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        let resolver = Arc::clone(&self.resolver);
        let slot = Arc::clone(&self.slot);
        let events = self.events.clone();

        let handle = std::thread::Builder::new()
            .name("bgm-prepare".to_string())
            .spawn(move || {
                let _guard = guard;
                resolve_into_slot(resolver.as_ref(), &slot, &events, source);
            })?;

        *task = Some(handle);
        Ok(PrepareStatus::Spawned)
    }

    /// Non-blocking read of the slot; does not consume it
    pub fn get_prepared(&self) -> Option<PreparedStream> {
        lock(&self.slot).clone()
    }

    pub fn prepared_url(&self) -> Option<String> {
        lock(&self.slot).as_ref().map(|p| p.url.clone())
    }

    /// True while a background resolution is running
    pub fn is_resolving(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Block until the current background resolution (if any) finishes
    ///
    /// The orchestrator itself never calls this; it exists for callers that
    /// want a deterministic hand-off (tests, orderly shutdown).
    pub fn wait_idle(&self) {
        let handle = lock(&self.task).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Stream preparation worker panicked");
            }
        }
    }
}

fn resolve_into_slot(
    resolver: &dyn MediaResolver,
    slot: &Mutex<Option<PreparedStream>>,
    events: &EventBus,
    source: SourceDescriptor,
) {
    info!(reference = %source.location(), "Resolving stream URL (prepare only)");

    let outcome = resolver.resolve(source.location()).and_then(|media| {
        select_stream(&media).ok_or_else(|| {
            PlayerError::ResolutionFailure(format!(
                "no playable audio stream for {}",
                source.location()
            ))
        })
    });

    match outcome {
        Ok((url, bitrate)) => {
            debug!(reference = %source.location(), bitrate = ?bitrate, "Selected stream");
            *lock(slot) = Some(PreparedStream {
                url: url.clone(),
                bitrate,
                source: source.clone(),
            });
            info!(reference = %source.location(), "Stream prepared");
            events.emit(PlayerEvent::StreamPrepared {
                source,
                url,
                bitrate,
                timestamp: chrono::Utc::now(),
            });
        }
        Err(e) => {
            error!(reference = %source.location(), "Failed to resolve stream: {}", e);
            events.emit(PlayerEvent::PreparationFailed {
                source,
                kind: e.kind(),
                message: e.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::MediaFormat;

    fn format(bitrate: Option<f64>, has_audio: bool, has_video: bool, url: &str) -> MediaFormat {
        MediaFormat {
            has_audio,
            has_video,
            bitrate,
            url: Some(url.to_string()),
        }
    }

    #[test]
    fn test_highest_audio_only_bitrate_wins() {
        let media = ResolvedMedia {
            formats: vec![
                format(Some(128.0), true, false, "a128"),
                format(Some(256.0), true, false, "a256"),
                format(Some(500.0), true, true, "av500"),
            ],
            url: Some("generic".to_string()),
        };
        assert_eq!(select_stream(&media), Some(("a256".to_string(), Some(256.0))));
    }

    #[test]
    fn test_tie_keeps_first_seen() {
        let media = ResolvedMedia {
            formats: vec![
                format(Some(160.0), true, false, "first"),
                format(Some(160.0), true, false, "second"),
            ],
            url: None,
        };
        assert_eq!(select_stream(&media).unwrap().0, "first");
    }

    #[test]
    fn test_missing_bitrate_ranks_lowest() {
        let media = ResolvedMedia {
            formats: vec![
                format(None, true, false, "unknown"),
                format(Some(48.0), true, false, "low"),
            ],
            url: None,
        };
        assert_eq!(select_stream(&media).unwrap().0, "low");

        let only_unknown = ResolvedMedia {
            formats: vec![format(None, true, false, "unknown")],
            url: None,
        };
        assert_eq!(select_stream(&only_unknown), Some(("unknown".to_string(), None)));
    }

    #[test]
    fn test_formats_without_url_are_skipped() {
        let media = ResolvedMedia {
            formats: vec![MediaFormat {
                has_audio: true,
                has_video: false,
                bitrate: Some(320.0),
                url: None,
            }],
            url: Some("generic".to_string()),
        };
        assert_eq!(select_stream(&media), Some(("generic".to_string(), None)));
    }

    #[test]
    fn test_falls_back_to_generic_url() {
        let media = ResolvedMedia {
            formats: vec![format(Some(900.0), true, true, "video")],
            url: Some("generic".to_string()),
        };
        assert_eq!(select_stream(&media).unwrap().0, "generic");
    }

    #[test]
    fn test_nothing_playable() {
        let media = ResolvedMedia {
            formats: vec![format(Some(900.0), false, true, "video-only")],
            url: None,
        };
        assert_eq!(select_stream(&media), None);
    }
}
