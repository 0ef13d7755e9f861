//! `stickerbot sticker`: encode a local file with the same encoders the bot
//! uses for chat media.

use std::path::Path;

use {
    anyhow::{Context, Result, bail},
    stickerbot_config::StickerBotConfig,
    stickerbot_media::{
        AnimatedStickerEncoder, FfmpegTranscoder, StaticStickerEncoder, StickerEncoder,
        TranscodeOptions,
    },
    stickerbot_protocol::MediaKind,
    tracing::info,
};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "webm", "mkv", "avi", "3gp"];

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Media kind by file extension; anything not a known video is an image.
fn detect_kind(path: &Path) -> MediaKind {
    match extension(path) {
        Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => MediaKind::Video,
        _ => MediaKind::Image,
    }
}

fn wants_animation(path: &Path, kind: MediaKind) -> bool {
    kind == MediaKind::Video || extension(path).as_deref() == Some("gif")
}

pub async fn handle_sticker(
    config: &StickerBotConfig,
    input: &Path,
    output: &Path,
    force_animated: bool,
) -> Result<()> {
    let media = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;
    if media.is_empty() {
        bail!("{} is empty", input.display());
    }

    let kind = detect_kind(input);
    let animated = force_animated || wants_animation(input, kind);
    let size = config.sticker.canvas_size;
    let encoder: Box<dyn StickerEncoder> = if animated {
        Box::new(AnimatedStickerEncoder::new(
            FfmpegTranscoder::with_binary(config.sticker.ffmpeg_path.clone()),
            TranscodeOptions::with_size(size),
        ))
    } else {
        Box::new(StaticStickerEncoder::new(size))
    };
    if !encoder.is_available() {
        bail!("ffmpeg not found; install it or set sticker.ffmpeg_path");
    }

    info!(input = %input.display(), %kind, animated, bytes = media.len(), "encoding sticker");
    let webp = encoder.encode(&media, kind).await?;
    tokio::fs::write(output, &webp)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("{} ({} bytes)", output.display(), webp.len());
    Ok(())
}
