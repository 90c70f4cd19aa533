//! Filesystem fixtures and an orchestrator wired to fakes

use super::fakes::{FakeDownloader, FakeLocalPlayer, FakeResolver, FakeStreamPlayer};
use bgm_player::capabilities::{MediaFormat, ResolvedMedia};
use bgm_player::pipeline::PipelineSettings;
use bgm_player::tools::{ToolLocator, ToolSpec};
use bgm_player::{AudioOrchestrator, Capabilities};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Temporary directory used as a private PATH entry
pub struct ToolDir {
    temp_dir: TempDir,
}

impl ToolDir {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create tool dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create an executable file named `name`
    pub fn install(&self, name: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, b"#!/bin/sh\nexit 0\n").expect("Failed to write fake tool");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&path, perms).unwrap();
        }
        path
    }

    pub fn remove(&self, name: &str) {
        fs::remove_file(self.temp_dir.path().join(name)).expect("Failed to remove fake tool");
    }

    /// Locator for `ffmpeg` searching only this directory, with no override variable
    pub fn ffmpeg_locator(&self) -> ToolLocator {
        ToolLocator::new(ToolSpec::new("ffmpeg", &["ffmpeg", "ffmpeg.exe"], None))
            .with_search_path(self.path().as_os_str())
    }
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Resolver answer with 128/256 kbit/s audio-only tracks and a 500 kbit/s muxed one
pub fn sample_media() -> ResolvedMedia {
    ResolvedMedia {
        formats: vec![
            MediaFormat::audio("https://cdn.example/a128", Some(128.0)),
            MediaFormat::audio("https://cdn.example/a256", Some(256.0)),
            MediaFormat {
                has_audio: true,
                has_video: true,
                bitrate: Some(500.0),
                url: Some("https://cdn.example/av500".to_string()),
            },
        ],
        url: Some("https://cdn.example/generic".to_string()),
    }
}

/// Orchestrator plus handles to every fake behind it
pub struct TestRig {
    pub local: Arc<FakeLocalPlayer>,
    pub stream: Arc<FakeStreamPlayer>,
    pub resolver: Arc<FakeResolver>,
    pub downloader: Arc<FakeDownloader>,
    pub tools: ToolDir,
    pub orchestrator: AudioOrchestrator,
}

impl TestRig {
    /// Everything available, ffmpeg installed, resolver answering `sample_media`
    pub fn new() -> Self {
        Self::with(
            FakeLocalPlayer::new(),
            FakeStreamPlayer::new(),
            FakeResolver::returning(sample_media()),
            FakeDownloader::producing_mp3(),
            true,
        )
    }

    pub fn with(
        local: Arc<FakeLocalPlayer>,
        stream: Arc<FakeStreamPlayer>,
        resolver: Arc<FakeResolver>,
        downloader: Arc<FakeDownloader>,
        ffmpeg_installed: bool,
    ) -> Self {
        let tools = ToolDir::new();
        if ffmpeg_installed {
            tools.install("ffmpeg");
        }

        let capabilities = Capabilities {
            local: local.clone(),
            stream: stream.clone(),
            resolver: resolver.clone(),
            downloader: downloader.clone(),
            transcoder: Arc::new(tools.ffmpeg_locator()),
        };
        let orchestrator = AudioOrchestrator::new(capabilities, PipelineSettings::default());

        Self {
            local,
            stream,
            resolver,
            downloader,
            tools,
            orchestrator,
        }
    }
}
