//! Configuration loading and config file resolution
//!
//! Bootstrap configuration is a single optional TOML file. Every field has a
//! built-in default, so a missing file is never fatal.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `BGM_CONFIG` environment variable
//! 3. Platform config directory (`<config_dir>/bgm/config.toml`), if present
//! 4. Built-in defaults (no file)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "BGM_CONFIG";

/// Environment variable conventionally naming an explicit ffmpeg binary
pub const DEFAULT_FFMPEG_OVERRIDE_ENV: &str = "IMAGEIO_FFMPEG_EXE";

/// Complete bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Which music to play
    pub music: MusicConfig,

    /// Where external tools live
    pub tools: ToolsConfig,

    /// Target format for downloaded media
    pub transcode: TranscodeConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Music source configuration
///
/// Up to three candidate sources; the caller picks exactly one at startup
/// with [`crate::source::select_source`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct MusicConfig {
    /// Explicit stream URL (highest priority)
    pub stream_url: Option<String>,

    /// Media-hosting page URL that needs resolution before playback
    pub media_reference_url: Option<String>,

    /// Local audio file used when no URL is configured
    pub local_fallback_path: Option<PathBuf>,

    /// Download and loop media references instead of streaming them
    pub prefer_download: bool,
}

/// External tool configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    /// Environment variable consulted for an explicit ffmpeg path
    pub ffmpeg_override_env: String,

    /// Directory holding bundled tool binaries
    pub bundled_dir: Option<PathBuf>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_override_env: DEFAULT_FFMPEG_OVERRIDE_ENV.to_string(),
            bundled_dir: None,
        }
    }
}

/// Transcode target for the download pipeline
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Target codec / file extension
    pub codec: String,

    /// Target quality in kbit/s
    pub quality_kbps: u32,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            codec: default_codec(),
            quality_kbps: default_quality_kbps(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_codec() -> String {
    "mp3".to_string()
}

fn default_quality_kbps() -> u32 {
    192
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command-line overrides for the music section
#[derive(Debug, Clone, Default)]
pub struct MusicOverrides {
    pub stream_url: Option<String>,
    pub media_reference_url: Option<String>,
    pub local_fallback_path: Option<PathBuf>,
    pub prefer_download: Option<bool>,
}

impl TomlConfig {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::parse(&content, path)
    }

    /// Parse TOML content; `origin` only labels errors
    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content).map_err(|source| Error::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })?;
        Ok(config.normalized())
    }

    /// Load configuration, degrading gracefully to defaults
    ///
    /// - `None` → built-in defaults
    /// - path that does not exist → warning + built-in defaults
    /// - path that exists but is malformed → error
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            None => {
                info!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
            Some(path) if !path.exists() => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Some(path) => {
                let config = Self::load(path)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
        }
    }

    /// Blank strings in the file mean "unset"
    fn normalized(mut self) -> Self {
        self.music = self.music.normalized();
        self.tools.bundled_dir = non_empty_path(self.tools.bundled_dir);
        if self.tools.ffmpeg_override_env.trim().is_empty() {
            self.tools.ffmpeg_override_env = DEFAULT_FFMPEG_OVERRIDE_ENV.to_string();
        }
        if self.transcode.codec.trim().is_empty() {
            self.transcode.codec = default_codec();
        }
        self
    }
}

impl MusicConfig {
    /// Apply command-line overrides (CLI beats file)
    pub fn apply_overrides(&mut self, overrides: MusicOverrides) {
        if let Some(url) = overrides.stream_url {
            self.stream_url = Some(url);
        }
        if let Some(url) = overrides.media_reference_url {
            self.media_reference_url = Some(url);
        }
        if let Some(path) = overrides.local_fallback_path {
            self.local_fallback_path = Some(path);
        }
        if let Some(prefer) = overrides.prefer_download {
            self.prefer_download = prefer;
        }
        *self = std::mem::take(self).normalized();
    }

    fn normalized(self) -> Self {
        Self {
            stream_url: non_empty(self.stream_url),
            media_reference_url: non_empty(self.media_reference_url),
            local_fallback_path: non_empty_path(self.local_fallback_path),
            prefer_download: self.prefer_download,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn non_empty_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|p| !p.as_os_str().is_empty())
}

/// Resolve which config file to read, following the documented priority
///
/// Returns `None` when no candidate applies (use built-in defaults).
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory, only if the file exists
    default_config_path().filter(|p| p.exists())
}

/// Platform config file location (`~/.config/bgm/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bgm").join("config.toml"))
}
