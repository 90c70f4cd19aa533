//! Download/extract pipeline
//!
//! Downloads a media reference completely and transcodes it to a standard
//! audio codec so the local player can loop it.
//!
//! Stages, each aborting the rest on failure:
//! 1. Locate the transcoding tool (`ToolNotFound`, before any network activity)
//! 2. Create a scoped temporary working directory
//! 3. Download best audio + transcode (`DownloadFailure`)
//! 4. Find the first artifact with the target extension (`TranscodeFailure`)
//!
//! The working directory lives exactly as long as the returned
//! [`ExtractedAudio`]; dropping it removes the directory and the artifact.

use crate::capabilities::{Downloader, FormatSelector, Postprocess};
use crate::error::{PlayerError, Result};
use crate::tools::ToolLocator;
use bgm_common::config::TranscodeConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, error, info};

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Target codec, also the artifact extension
    pub codec: String,
    pub quality_kbps: u32,
    /// Prefix of the temporary working directory name
    pub temp_prefix: String,
    /// File stem the downloader writes
    pub output_stem: String,
    pub format: FormatSelector,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            codec: "mp3".to_string(),
            quality_kbps: 192,
            temp_prefix: "bgm_".to_string(),
            output_stem: "bgm".to_string(),
            format: FormatSelector::default(),
        }
    }
}

impl From<&TranscodeConfig> for PipelineSettings {
    fn from(config: &TranscodeConfig) -> Self {
        Self {
            codec: config.codec.clone(),
            quality_kbps: config.quality_kbps,
            ..Self::default()
        }
    }
}

/// Transcoded artifact plus the directory that owns it
#[derive(Debug)]
pub struct ExtractedAudio {
    path: PathBuf,
    workdir: TempDir,
}

impl ExtractedAudio {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }
}

/// Download + transcode for local looping playback
pub struct DownloadPipeline {
    transcoder: Arc<ToolLocator>,
    downloader: Arc<dyn Downloader>,
    settings: PipelineSettings,
}

impl DownloadPipeline {
    pub fn new(
        transcoder: Arc<ToolLocator>,
        downloader: Arc<dyn Downloader>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            transcoder,
            downloader,
            settings,
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run every stage for `reference`
    pub fn download_and_extract(&self, reference: &str) -> Result<ExtractedAudio> {
        let tool = self.transcoder.locate().ok_or_else(|| {
            PlayerError::ToolNotFound(format!(
                "{} is required to extract audio",
                self.transcoder.spec().name
            ))
        })?;
        let tool_location = self.transcoder.tool_location().unwrap_or_else(|| tool.clone());

        if !self.downloader.is_available() {
            error!(reference, "Downloader is not available; cannot fetch media");
            return Err(PlayerError::CapabilityUnavailable(
                "downloader not installed".to_string(),
            ));
        }

        let workdir = tempfile::Builder::new()
            .prefix(&self.settings.temp_prefix)
            .tempdir()
            .map_err(|e| {
                PlayerError::DownloadFailure(format!("cannot create working directory: {}", e))
            })?;
        debug!(workdir = %workdir.path().display(), "Created download working directory");

        let postprocess = Postprocess {
            codec: self.settings.codec.clone(),
            quality_kbps: self.settings.quality_kbps,
            tool_location,
        };

        info!(reference, tool = %tool.display(), "Starting media download");
        self.downloader
            .fetch(
                reference,
                workdir.path(),
                &self.settings.output_stem,
                &self.settings.format,
                &postprocess,
            )
            .map_err(|e| match e {
                PlayerError::DownloadFailure(_) | PlayerError::TranscodeFailure(_) => e,
                other => PlayerError::DownloadFailure(other.to_string()),
            })?;
        info!(reference, "Download complete, searching for extracted audio");

        let path = find_artifact(workdir.path(), &self.settings.codec)
            .map_err(|e| {
                PlayerError::TranscodeFailure(format!("cannot scan working directory: {}", e))
            })?
            .ok_or_else(|| {
                PlayerError::TranscodeFailure(format!(
                    "no .{} file produced in {}; check the transcoder installation",
                    self.settings.codec,
                    workdir.path().display()
                ))
            })?;

        info!(path = %path.display(), "Extracted audio ready");
        Ok(ExtractedAudio { path, workdir })
    }
}

/// First file (by name) in `dir` whose extension matches, case-insensitively
fn find_artifact(dir: &Path, extension: &str) -> std::io::Result<Option<PathBuf>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            names.push(entry.path());
        }
    }
    names.sort();

    Ok(names.into_iter().find(|path| {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(extension))
    }))
}
