//! Sticker encoding: static images in memory, animations through ffmpeg.

pub mod error;
pub mod image_ops;
pub mod sticker;
pub mod transcode;

pub use {
    error::{Error, Result},
    sticker::{AnimatedStickerEncoder, StaticStickerEncoder, StickerEncoder},
    transcode::{FfmpegTranscoder, TranscodeOptions, VideoTranscoder},
};
