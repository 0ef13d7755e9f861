//! Video/GIF → animated WebP transcoding through the ffmpeg CLI.
//!
//! Installation:
//! - macOS: `brew install ffmpeg`
//! - Debian/Ubuntu: `apt install ffmpeg`
//!
//! The binary must be built with `libwebp`.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use {async_trait::async_trait, tokio::process::Command, tracing::debug};

use crate::{Error, Result, image_ops::STICKER_CANVAS};

/// Binary name looked up in `PATH`.
const BINARY_NAME: &str = "ffmpeg";

/// Lines of ffmpeg stderr kept in a failure message.
const STDERR_TAIL_LINES: usize = 8;

/// Output shape of an animated sticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeOptions {
    /// Canvas side; the source is scaled to fit and padded to exactly this.
    pub size: u32,
    pub lossless: bool,
    /// Number of loops, `0` loops forever.
    pub loop_count: u32,
    pub strip_audio: bool,
    /// Keep source frame timing instead of duplicating/dropping frames.
    pub passthrough_timing: bool,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            size: STICKER_CANVAS,
            lossless: true,
            loop_count: 0,
            strip_audio: true,
            passthrough_timing: true,
        }
    }
}

impl TranscodeOptions {
    #[must_use]
    pub fn with_size(size: u32) -> Self {
        Self {
            size,
            ..Self::default()
        }
    }

    /// ffmpeg output arguments (everything between the input and the output path).
    #[must_use]
    pub fn ffmpeg_args(&self) -> Vec<String> {
        let size = self.size;
        let mut args = vec![
            "-vcodec".to_string(),
            "libwebp".to_string(),
            "-vf".to_string(),
            format!(
                "scale={size}:{size}:force_original_aspect_ratio=decrease,format=rgba,\
                 pad={size}:{size}:-1:-1:color=#00000000"
            ),
            "-lossless".to_string(),
            if self.lossless { "1" } else { "0" }.to_string(),
            "-loop".to_string(),
            self.loop_count.to_string(),
            "-preset".to_string(),
            "default".to_string(),
        ];
        if self.strip_audio {
            args.push("-an".to_string());
        }
        if self.passthrough_timing {
            args.push("-vsync".to_string());
            args.push("0".to_string());
        }
        args.push("-s".to_string());
        args.push(format!("{size}:{size}"));
        args.push("-f".to_string());
        args.push("webp".to_string());
        args
    }
}

/// Converts a media file on disk into an animated WebP file.
#[async_trait]
pub trait VideoTranscoder: Send + Sync {
    /// Whether the backend can run at all. Checked before every conversion.
    fn is_available(&self) -> bool;

    async fn transcode(&self, input: &Path, output: &Path, options: &TranscodeOptions)
    -> Result<()>;
}

/// ffmpeg-backed transcoder.
#[derive(Clone, Debug, Default)]
pub struct FfmpegTranscoder {
    binary_path: Option<String>,
}

impl FfmpegTranscoder {
    /// Use `ffmpeg` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer an explicit binary, falling back to `PATH`.
    #[must_use]
    pub fn with_binary(binary_path: Option<String>) -> Self {
        Self { binary_path }
    }

    /// Resolve the binary that would be invoked.
    #[must_use]
    pub fn find_binary(&self) -> Option<PathBuf> {
        if let Some(path) = self.binary_path.as_deref().map(PathBuf::from)
            && path.is_file()
        {
            return Some(path);
        }
        which::which(BINARY_NAME).ok()
    }
}

#[async_trait]
impl VideoTranscoder for FfmpegTranscoder {
    fn is_available(&self) -> bool {
        self.find_binary().is_some()
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        options: &TranscodeOptions,
    ) -> Result<()> {
        let binary = self
            .find_binary()
            .ok_or(Error::BackendUnavailable {
                backend: BINARY_NAME,
            })?;

        let mut cmd = Command::new(&binary);
        cmd.arg("-y").arg("-hide_banner").arg("-i").arg(input);
        cmd.args(options.ffmpeg_args());
        cmd.arg(output);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::piped());

        debug!(binary = %binary.display(), input = %input.display(), output = %output.display(), "running ffmpeg");

        let result = cmd
            .output()
            .await
            .map_err(|e| Error::external("failed to execute ffmpeg", e))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Error::transcode(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                stderr_tail(&stderr)
            )));
        }
        Ok(())
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join(" | ")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_args_pad_to_transparent_square() {
        let args = TranscodeOptions::default().ffmpeg_args();
        let vf = args
            .iter()
            .position(|a| a == "-vf")
            .map(|i| args[i + 1].clone())
            .unwrap();
        assert_eq!(
            vf,
            "scale=512:512:force_original_aspect_ratio=decrease,format=rgba,\
             pad=512:512:-1:-1:color=#00000000"
        );
        for flag in ["-an", "-vsync", "-lossless", "-loop"] {
            assert!(args.iter().any(|a| a == flag), "missing {flag}");
        }
        assert!(args.windows(2).any(|w| w[0] == "-loop" && w[1] == "0"));
        assert!(args.windows(2).any(|w| w[0] == "-lossless" && w[1] == "1"));
        assert!(args.windows(2).any(|w| w[0] == "-f" && w[1] == "webp"));
    }

    #[test]
    fn optional_flags_can_be_dropped() {
        let args = TranscodeOptions {
            strip_audio: false,
            passthrough_timing: false,
            ..TranscodeOptions::with_size(256)
        }
        .ffmpeg_args();
        assert!(!args.iter().any(|a| a == "-an" || a == "-vsync"));
        assert!(args.iter().any(|a| a == "256:256"));
    }

    #[test]
    fn missing_explicit_binary_falls_back_to_path_lookup() {
        let transcoder =
            FfmpegTranscoder::with_binary(Some("/definitely/not/a/real/ffmpeg".into()));
        assert_eq!(transcoder.find_binary(), which::which("ffmpeg").ok());
    }

    #[test]
    fn stderr_tail_keeps_last_lines() {
        let stderr = (0..20).map(|i| format!("line {i}\n")).collect::<String>();
        let tail = stderr_tail(&stderr);
        assert!(tail.starts_with("line 12"));
        assert!(tail.ends_with("line 19"));
    }
}
