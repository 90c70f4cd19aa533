//! yt-dlp command-line engine
//!
//! Resolves media references (`yt-dlp -J`) and downloads + extracts audio
//! (`yt-dlp -x`). The binary is found through a [`ToolLocator`], so a yt-dlp
//! installed after startup is picked up on the next call.

use crate::capabilities::{
    Downloader, FormatSelector, MediaFormat, MediaResolver, Postprocess, ResolvedMedia,
};
use crate::error::{PlayerError, Result};
use crate::tools::ToolLocator;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::debug;

/// Subset of `yt-dlp -J` output we care about
#[derive(Debug, Deserialize)]
struct InfoJson {
    #[serde(default)]
    formats: Vec<FormatJson>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FormatJson {
    url: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    /// Average audio bitrate, kbit/s
    abr: Option<f64>,
}

/// Absent and `"none"` both mean the stream has no such track
fn codec_present(codec: Option<&str>) -> bool {
    matches!(codec, Some(c) if c != "none")
}

/// Map `yt-dlp -J` JSON to resolver output
pub fn parse_info(json: &str) -> Result<ResolvedMedia> {
    let info: InfoJson = serde_json::from_str(json)
        .map_err(|e| PlayerError::ResolutionFailure(format!("unreadable yt-dlp output: {}", e)))?;

    let formats = info
        .formats
        .into_iter()
        .map(|f| MediaFormat {
            has_audio: codec_present(f.acodec.as_deref()),
            has_video: codec_present(f.vcodec.as_deref()),
            bitrate: f.abr,
            url: f.url,
        })
        .collect();

    Ok(ResolvedMedia {
        formats,
        url: info.url,
    })
}

/// Arguments for a metadata-only run
///
/// `--` ends option parsing so a reference starting with `-` stays a URL.
pub fn resolve_args(reference: &str) -> Vec<OsString> {
    vec![
        "-J".into(),
        "--skip-download".into(),
        "--no-playlist".into(),
        "--no-warnings".into(),
        "--".into(),
        reference.into(),
    ]
}

/// Arguments for a download + extract run
pub fn download_args(
    reference: &str,
    output_dir: &Path,
    output_stem: &str,
    format: &FormatSelector,
    postprocess: &Postprocess,
) -> Vec<OsString> {
    let template = output_dir.join(format!("{}.%(ext)s", output_stem));
    vec![
        "-f".into(),
        format.as_str().into(),
        "-x".into(),
        "--audio-format".into(),
        postprocess.codec.clone().into(),
        "--audio-quality".into(),
        format!("{}K", postprocess.quality_kbps).into(),
        "--ffmpeg-location".into(),
        postprocess.tool_location.clone().into_os_string(),
        "-o".into(),
        template.into_os_string(),
        "--no-playlist".into(),
        "--quiet".into(),
        "--".into(),
        reference.into(),
    ]
}

/// yt-dlp as both resolver and downloader
pub struct YtDlp {
    locator: Arc<ToolLocator>,
}

impl YtDlp {
    pub fn new(locator: Arc<ToolLocator>) -> Self {
        Self { locator }
    }

    fn binary(&self) -> Result<PathBuf> {
        self.locator.locate().ok_or_else(|| {
            PlayerError::CapabilityUnavailable(format!("{} is not installed", self.locator.spec().name))
        })
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no error output")
        .trim()
        .to_string()
}

impl MediaResolver for YtDlp {
    fn is_available(&self) -> bool {
        self.locator.locate().is_some()
    }

    fn resolve(&self, reference: &str) -> Result<ResolvedMedia> {
        let binary = self.binary()?;
        debug!(binary = %binary.display(), reference, "Running yt-dlp metadata extraction");

        let output = Command::new(&binary)
            .args(resolve_args(reference))
            .output()
            .map_err(|e| PlayerError::ResolutionFailure(format!("failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            return Err(PlayerError::ResolutionFailure(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )));
        }
        parse_info(&String::from_utf8_lossy(&output.stdout))
    }
}

impl Downloader for YtDlp {
    fn is_available(&self) -> bool {
        self.locator.locate().is_some()
    }

    fn fetch(
        &self,
        reference: &str,
        output_dir: &Path,
        output_stem: &str,
        format: &FormatSelector,
        postprocess: &Postprocess,
    ) -> Result<()> {
        let binary = self.binary()?;
        let args = download_args(reference, output_dir, output_stem, format, postprocess);
        debug!(binary = %binary.display(), ?args, "Running yt-dlp download");

        let output = Command::new(&binary)
            .args(&args)
            .output()
            .map_err(|e| PlayerError::DownloadFailure(format!("failed to run yt-dlp: {}", e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(PlayerError::DownloadFailure(format!(
                "yt-dlp exited with {}: {}",
                output.status,
                stderr_tail(&output.stderr)
            )))
        }
    }
}
