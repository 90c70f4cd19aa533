//! External tool location
//!
//! Search order, first hit wins:
//! 1. PATH lookup of the tool's executable names, in name order
//! 2. Override environment variable naming an explicit path
//! 3. Bundled-binary provider
//!
//! A hit is memoized for the life of the locator. A miss is not: every call
//! re-runs the whole search, so a tool installed after startup is picked up.

use crate::capabilities::BundledToolProvider;
use crate::lock;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info};

/// What to search for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    /// Name used in logs and passed to the bundled provider
    pub name: String,
    /// Executable names tried on PATH, in order
    pub executables: Vec<String>,
    /// Environment variable that may name an explicit path
    pub override_env: Option<String>,
}

impl ToolSpec {
    pub fn new(name: &str, executables: &[&str], override_env: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            executables: executables.iter().map(|s| s.to_string()).collect(),
            override_env: override_env.map(str::to_string),
        }
    }

    /// ffmpeg, overridable through `IMAGEIO_FFMPEG_EXE`
    pub fn ffmpeg() -> Self {
        Self::new("ffmpeg", &["ffmpeg", "ffmpeg.exe"], Some("IMAGEIO_FFMPEG_EXE"))
    }

    pub fn ffplay() -> Self {
        Self::new("ffplay", &["ffplay", "ffplay.exe"], Some("BGM_FFPLAY_EXE"))
    }

    pub fn ytdlp() -> Self {
        Self::new("yt-dlp", &["yt-dlp", "yt-dlp.exe"], Some("BGM_YTDLP_EXE"))
    }

    /// Replace the override environment variable name
    pub fn with_override_env(mut self, env: &str) -> Self {
        self.override_env = Some(env.to_string());
        self
    }
}

/// Resolves and memoizes the path to one external tool
pub struct ToolLocator {
    spec: ToolSpec,
    /// PATH value to search; `None` reads the process PATH on each search
    search_path: Option<OsString>,
    bundled: Option<Arc<dyn BundledToolProvider>>,
    resolved: Mutex<Option<PathBuf>>,
    searches: AtomicUsize,
}

impl ToolLocator {
    pub fn new(spec: ToolSpec) -> Self {
        Self {
            spec,
            search_path: None,
            bundled: None,
            resolved: Mutex::new(None),
            searches: AtomicUsize::new(0),
        }
    }

    /// Search this PATH value instead of the process PATH
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    pub fn with_bundled(mut self, provider: Arc<dyn BundledToolProvider>) -> Self {
        self.bundled = Some(provider);
        self
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// Locate the tool, returning the memoized path after the first success
    pub fn locate(&self) -> Option<PathBuf> {
        let mut resolved = lock(&self.resolved);
        if let Some(path) = resolved.as_ref() {
            return Some(path.clone());
        }

        let found = self.search();
        if found.is_none() {
            error!(
                tool = %self.spec.name,
                "{} not found. Install it system-wide and add it to PATH, set {} to an explicit path, \
                 or ship a bundled binary",
                self.spec.name,
                self.spec.override_env.as_deref().unwrap_or("the override variable"),
            );
        }
        resolved.clone_from(&found);
        found
    }

    /// Directory containing the located tool
    pub fn tool_location(&self) -> Option<PathBuf> {
        self.locate().map(|path| match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => path,
        })
    }

    pub fn is_resolved(&self) -> bool {
        lock(&self.resolved).is_some()
    }

    /// Number of full searches run so far
    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    fn search(&self) -> Option<PathBuf> {
        self.searches.fetch_add(1, Ordering::SeqCst);

        // 1. PATH
        let path_var = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"));
        if let Some(path_var) = path_var {
            let dirs: Vec<PathBuf> = std::env::split_paths(&path_var).collect();
            // Each name is tried across all of PATH before the next name
            for exe in &self.spec.executables {
                for dir in &dirs {
                    let candidate = dir.join(exe);
                    if is_executable(&candidate) {
                        info!(tool = %self.spec.name, path = %candidate.display(), "Found tool on PATH");
                        return Some(candidate);
                    }
                }
            }
        }

        // 2. Override environment variable
        if let Some(env) = &self.spec.override_env {
            if let Some(value) = std::env::var_os(env).filter(|v| !v.is_empty()) {
                let candidate = PathBuf::from(value);
                if candidate.exists() {
                    info!(tool = %self.spec.name, path = %candidate.display(), "Found tool via {}", env);
                    return Some(candidate);
                }
                debug!(tool = %self.spec.name, path = %candidate.display(), "{} points at a missing file", env);
            }
        }

        // 3. Bundled binary
        if let Some(provider) = &self.bundled {
            match provider.bundled_path(&self.spec.name) {
                Some(candidate) if candidate.exists() => {
                    info!(tool = %self.spec.name, path = %candidate.display(), "Found bundled tool");
                    return Some(candidate);
                }
                Some(candidate) => {
                    debug!(tool = %self.spec.name, path = %candidate.display(), "Bundled tool path does not exist");
                }
                None => debug!(tool = %self.spec.name, "No bundled binary available"),
            }
        }

        None
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Bundled provider backed by a directory of shipped binaries
#[derive(Debug, Clone)]
pub struct BundledDir {
    dir: PathBuf,
}

impl BundledDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl BundledToolProvider for BundledDir {
    fn bundled_path(&self, tool: &str) -> Option<PathBuf> {
        let plain = self.dir.join(tool);
        if plain.exists() {
            return Some(plain);
        }
        let exe = self.dir.join(format!("{}.exe", tool));
        exe.exists().then_some(exe)
    }
}
