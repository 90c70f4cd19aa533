//! In-memory engines standing in for real players, resolvers and downloaders
//!
//! Every fake records the calls it receives so tests can assert on the exact
//! backend interaction (or the absence of one).

use bgm_player::capabilities::{
    BundledToolProvider, Downloader, FormatSelector, LocalPlayer, LoopMode, MediaResolver,
    Postprocess, ResolvedMedia, StreamPlayer,
};
use bgm_player::{PlayerError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

// ============================================================================
// Gate
// ============================================================================

/// One-shot latch that holds a fake inside its call until released
pub struct Gate {
    open: Mutex<bool>,
    cv: Condvar,
}

impl Gate {
    pub fn closed() -> Arc<Self> {
        Arc::new(Self {
            open: Mutex::new(false),
            cv: Condvar::new(),
        })
    }

    pub fn open(&self) {
        *self.open.lock().unwrap() = true;
        self.cv.notify_all();
    }

    pub fn wait(&self) {
        let mut open = self.open.lock().unwrap();
        while !*open {
            open = self.cv.wait(open).unwrap();
        }
    }
}

// ============================================================================
// Players
// ============================================================================

/// Local player that records `load:<path>`, `play:<mode>` and `stop`
pub struct FakeLocalPlayer {
    available: AtomicBool,
    fail_play: AtomicBool,
    loaded: Mutex<Option<PathBuf>>,
    calls: Mutex<Vec<String>>,
}

impl FakeLocalPlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            available: AtomicBool::new(true),
            fail_play: AtomicBool::new(false),
            loaded: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        let player = Self::new();
        player.available.store(false, Ordering::SeqCst);
        player
    }

    pub fn set_fail_play(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn loaded(&self) -> Option<PathBuf> {
        self.loaded.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl LocalPlayer for FakeLocalPlayer {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn load(&self, path: &Path) -> Result<()> {
        self.record(format!("load:{}", path.display()));
        *self.loaded.lock().unwrap() = Some(path.to_path_buf());
        Ok(())
    }

    fn play(&self, loops: LoopMode) -> Result<()> {
        self.record(format!("play:{:?}", loops));
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(PlayerError::PlaybackFailure("output device busy".to_string()));
        }
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.record("stop".to_string());
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.loaded.lock().unwrap().is_some()
    }
}

/// Stream player that records `set_media:<url>`, `play` and `stop`
///
/// `init` is not recorded; the orchestrator probes it at construction.
pub struct FakeStreamPlayer {
    init_ok: AtomicBool,
    fail_stop: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeStreamPlayer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            init_ok: AtomicBool::new(true),
            fail_stop: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn broken() -> Arc<Self> {
        let player = Self::new();
        player.init_ok.store(false, Ordering::SeqCst);
        player
    }

    pub fn set_fail_stop(&self, fail: bool) {
        self.fail_stop.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl StreamPlayer for FakeStreamPlayer {
    fn init(&self) -> bool {
        self.init_ok.load(Ordering::SeqCst)
    }

    fn set_media(&self, url: &str) -> Result<()> {
        self.record(format!("set_media:{}", url));
        Ok(())
    }

    fn play(&self) -> Result<()> {
        self.record("play".to_string());
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        self.record("stop".to_string());
        if self.fail_stop.load(Ordering::SeqCst) {
            return Err(PlayerError::PlaybackFailure("already torn down".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolver with a scripted answer, an optional gate and a call counter
pub struct FakeResolver {
    available: bool,
    response: Mutex<std::result::Result<ResolvedMedia, String>>,
    gate: Mutex<Option<Arc<Gate>>>,
    calls: AtomicUsize,
    references: Mutex<Vec<String>>,
}

impl FakeResolver {
    pub fn returning(media: ResolvedMedia) -> Arc<Self> {
        Arc::new(Self {
            available: true,
            response: Mutex::new(Ok(media)),
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
            references: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let resolver = Self::returning(ResolvedMedia::default());
        resolver.set_failure(message);
        resolver
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            available: false,
            response: Mutex::new(Err("not installed".to_string())),
            gate: Mutex::new(None),
            calls: AtomicUsize::new(0),
            references: Mutex::new(Vec::new()),
        })
    }

    /// Block every following `resolve` until `gate` opens
    pub fn hold_on(&self, gate: Arc<Gate>) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    pub fn set_response(&self, media: ResolvedMedia) {
        *self.response.lock().unwrap() = Ok(media);
    }

    pub fn set_failure(&self, message: &str) {
        *self.response.lock().unwrap() = Err(message.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn references(&self) -> Vec<String> {
        self.references.lock().unwrap().clone()
    }
}

impl MediaResolver for FakeResolver {
    fn is_available(&self) -> bool {
        self.available
    }

    fn resolve(&self, reference: &str) -> Result<ResolvedMedia> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.references.lock().unwrap().push(reference.to_string());

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.wait();
        }

        self.response
            .lock()
            .unwrap()
            .clone()
            .map_err(PlayerError::ResolutionFailure)
    }
}

// ============================================================================
// Downloader
// ============================================================================

/// What a `FakeDownloader::fetch` call does
#[derive(Debug, Clone)]
pub enum DownloadBehavior {
    /// Write these file names into the output directory and succeed
    Write(Vec<String>),
    /// Fail with `DownloadFailure`
    Fail(String),
}

/// Downloader that writes scripted files and remembers its inputs
pub struct FakeDownloader {
    available: bool,
    behavior: Mutex<DownloadBehavior>,
    calls: AtomicUsize,
    last_dir: Mutex<Option<PathBuf>>,
    last_postprocess: Mutex<Option<Postprocess>>,
    last_format: Mutex<Option<FormatSelector>>,
}

impl FakeDownloader {
    pub fn new(behavior: DownloadBehavior) -> Arc<Self> {
        Arc::new(Self {
            available: true,
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
            last_dir: Mutex::new(None),
            last_postprocess: Mutex::new(None),
            last_format: Mutex::new(None),
        })
    }

    /// Produces `bgm.mp3`
    pub fn producing_mp3() -> Arc<Self> {
        Self::new(DownloadBehavior::Write(vec!["bgm.mp3".to_string()]))
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            available: false,
            behavior: Mutex::new(DownloadBehavior::Fail("not installed".to_string())),
            calls: AtomicUsize::new(0),
            last_dir: Mutex::new(None),
            last_postprocess: Mutex::new(None),
            last_format: Mutex::new(None),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_dir(&self) -> Option<PathBuf> {
        self.last_dir.lock().unwrap().clone()
    }

    pub fn last_postprocess(&self) -> Option<Postprocess> {
        self.last_postprocess.lock().unwrap().clone()
    }

    pub fn last_format(&self) -> Option<FormatSelector> {
        self.last_format.lock().unwrap().clone()
    }
}

impl Downloader for FakeDownloader {
    fn is_available(&self) -> bool {
        self.available
    }

    fn fetch(
        &self,
        _reference: &str,
        output_dir: &Path,
        _output_stem: &str,
        format: &FormatSelector,
        postprocess: &Postprocess,
    ) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_dir.lock().unwrap() = Some(output_dir.to_path_buf());
        *self.last_postprocess.lock().unwrap() = Some(postprocess.clone());
        *self.last_format.lock().unwrap() = Some(format.clone());

        match self.behavior.lock().unwrap().clone() {
            DownloadBehavior::Write(names) => {
                for name in names {
                    fs::write(output_dir.join(name), b"ID3 fake audio")?;
                }
                Ok(())
            }
            DownloadBehavior::Fail(message) => Err(PlayerError::DownloadFailure(message)),
        }
    }
}

// ============================================================================
// Bundled tools
// ============================================================================

/// Bundle provider returning one fixed path and counting lookups
pub struct FakeBundle {
    path: Option<PathBuf>,
    lookups: AtomicUsize,
}

impl FakeBundle {
    pub fn with_path(path: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            path: Some(path.into()),
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            path: None,
            lookups: AtomicUsize::new(0),
        })
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl BundledToolProvider for FakeBundle {
    fn bundled_path(&self, _tool: &str) -> Option<PathBuf> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.path.clone()
    }
}
