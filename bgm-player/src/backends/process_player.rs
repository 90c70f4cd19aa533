//! External-process player (ffplay-compatible)
//!
//! Serves as both the local-loop and the streaming backend by running the
//! player binary on a file path or URL. Stopping kills and reaps the child.

use crate::capabilities::{LocalPlayer, LoopMode, StreamPlayer};
use crate::error::{PlayerError, Result};
use crate::lock;
use crate::tools::ToolLocator;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Player arguments for `media` with the given repeat mode
pub fn player_args(media: &str, loops: LoopMode) -> Vec<String> {
    let mut args: Vec<String> = ["-nodisp", "-autoexit", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    match loops {
        LoopMode::Once => {}
        LoopMode::Times(n) => args.extend(["-loop".to_string(), n.max(1).to_string()]),
        LoopMode::Forever => args.extend(["-loop".to_string(), "0".to_string()]),
    }
    args.extend(["-i".to_string(), media.to_string()]);
    args
}

/// Player backed by a child process
pub struct ProcessPlayer {
    locator: Arc<ToolLocator>,
    media: Mutex<Option<String>>,
    child: Mutex<Option<Child>>,
}

impl ProcessPlayer {
    pub fn new(locator: Arc<ToolLocator>) -> Self {
        Self {
            locator,
            media: Mutex::new(None),
            child: Mutex::new(None),
        }
    }

    fn start(&self, loops: LoopMode) -> Result<()> {
        let media = lock(&self.media)
            .clone()
            .ok_or_else(|| PlayerError::PlaybackFailure("no media loaded".to_string()))?;
        let binary = self.locator.locate().ok_or_else(|| {
            PlayerError::CapabilityUnavailable(format!("{} is not installed", self.locator.spec().name))
        })?;

        self.kill_child();
        let child = Command::new(&binary)
            .args(player_args(&media, loops))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| PlayerError::PlaybackFailure(format!("failed to start player: {}", e)))?;

        info!(pid = child.id(), player = %binary.display(), "Player process started");
        *lock(&self.child) = Some(child);
        Ok(())
    }

    fn kill_child(&self) {
        let child = lock(&self.child).take();
        if let Some(mut child) = child {
            // Already exited is fine
            if let Err(e) = child.kill() {
                debug!("Player process kill: {}", e);
            }
            if let Err(e) = child.wait() {
                debug!("Player process wait: {}", e);
            }
        }
    }
}

impl Drop for ProcessPlayer {
    fn drop(&mut self) {
        self.kill_child();
    }
}

impl LocalPlayer for ProcessPlayer {
    fn is_available(&self) -> bool {
        self.locator.locate().is_some()
    }

    fn load(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PlayerError::FileNotFound(path.to_path_buf()));
        }
        *lock(&self.media) = Some(path.to_string_lossy().into_owned());
        Ok(())
    }

    fn play(&self, loops: LoopMode) -> Result<()> {
        self.start(loops)
    }

    fn stop(&self) -> Result<()> {
        self.kill_child();
        Ok(())
    }

    fn is_ready(&self) -> bool {
        lock(&self.media).is_some()
    }
}

impl StreamPlayer for ProcessPlayer {
    fn init(&self) -> bool {
        self.locator.locate().is_some()
    }

    fn set_media(&self, url: &str) -> Result<()> {
        *lock(&self.media) = Some(url.to_string());
        Ok(())
    }

    fn play(&self) -> Result<()> {
        self.start(LoopMode::Once)
    }

    fn stop(&self) -> Result<()> {
        self.kill_child();
        Ok(())
    }
}
