//! The two sticker encoding strategies.
//!
//! [`StaticStickerEncoder`] works entirely in memory. [`AnimatedStickerEncoder`]
//! round-trips through two temp files because the transcoder only speaks
//! paths; both files are removed on every exit path.

use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    stickerbot_protocol::MediaKind,
    tempfile::NamedTempFile,
    tracing::{debug, warn},
};

use crate::{
    Error, Result,
    image_ops::{self, CanvasOptions},
    transcode::{TranscodeOptions, VideoTranscoder},
};

/// Turns raw media bytes into sticker bytes (square, transparent-padded,
/// lossless WebP).
#[async_trait]
pub trait StickerEncoder: Send + Sync {
    /// Whether the backing encoder can run.
    fn is_available(&self) -> bool {
        true
    }

    async fn encode(&self, media: &[u8], kind: MediaKind) -> Result<Vec<u8>>;
}

/// In-memory resize/pad/encode for still images.
#[derive(Debug, Clone, Default)]
pub struct StaticStickerEncoder {
    canvas: CanvasOptions,
}

impl StaticStickerEncoder {
    #[must_use]
    pub fn new(canvas_size: u32) -> Self {
        Self {
            canvas: CanvasOptions::square(canvas_size),
        }
    }
}

#[async_trait]
impl StickerEncoder for StaticStickerEncoder {
    async fn encode(&self, media: &[u8], _kind: MediaKind) -> Result<Vec<u8>> {
        // Header only; rejects non-images before the blocking decode.
        let source = image_ops::get_image_metadata(media)?;
        debug!(
            width = source.width,
            height = source.height,
            format = ?source.format,
            canvas = self.canvas.width,
            "encoding static sticker"
        );
        let data = media.to_vec();
        let canvas = self.canvas;
        tokio::task::spawn_blocking(move || image_ops::resize_and_encode(&data, &canvas))
            .await
            .map_err(|e| Error::external("static sticker encode task", e))?
    }
}

/// Temp-file mediated transcode for GIFs and videos.
pub struct AnimatedStickerEncoder<T> {
    transcoder: T,
    options: TranscodeOptions,
    temp_dir: Option<PathBuf>,
}

impl<T: VideoTranscoder> AnimatedStickerEncoder<T> {
    #[must_use]
    pub fn new(transcoder: T, options: TranscodeOptions) -> Self {
        Self {
            transcoder,
            options,
            temp_dir: None,
        }
    }

    /// Place temp files under `dir` instead of the system temp directory.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    fn temp_file(&self, prefix: &str, suffix: &str) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix).suffix(suffix);
        let file = match self.temp_dir {
            Some(ref dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file)
    }

    async fn convert(&self, media: &[u8], input: &Path, output: &Path) -> Result<Vec<u8>> {
        tokio::fs::write(input, media).await?;
        debug!(input = %input.display(), bytes = media.len(), "converting to animated webp");
        self.transcoder
            .transcode(input, output, &self.options)
            .await?;
        let webp = tokio::fs::read(output).await?;
        if webp.is_empty() {
            return Err(Error::transcode("transcoder produced an empty file"));
        }
        Ok(webp)
    }
}

#[async_trait]
impl<T: VideoTranscoder> StickerEncoder for AnimatedStickerEncoder<T> {
    fn is_available(&self) -> bool {
        self.transcoder.is_available()
    }

    async fn encode(&self, media: &[u8], kind: MediaKind) -> Result<Vec<u8>> {
        let extension = match kind {
            MediaKind::Video => ".mp4",
            MediaKind::Image => ".gif",
        };
        let input = self.temp_file("wa-input-", extension)?;
        let output = self.temp_file("wa-output-", ".webp")?;

        let result = self.convert(media, input.path(), output.path()).await;

        remove_temp(input);
        remove_temp(output);
        result
    }
}

fn remove_temp(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    if let Err(e) = file.close() {
        warn!(path = %path.display(), error = %e, "failed to remove temp file");
    }
}
