//! Image operations for the static sticker path.
//!
//! Stickers are square, transparent-padded, losslessly compressed WebP
//! images. The source is scaled to fit the canvas (up or down) with its
//! aspect ratio intact and centred; the uncovered area stays transparent.

use std::io::Cursor;

use image::{
    DynamicImage, ExtendedColorType, GenericImageView, ImageFormat, ImageReader, Rgba, RgbaImage,
    codecs::webp::WebPEncoder, imageops,
};

use crate::{Error, Result};

/// Side length of a sticker canvas.
pub const STICKER_CANVAS: u32 = 512;

/// Fully transparent background.
pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

/// Dimensions and detected format of a source image.
#[derive(Debug, Clone)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<ImageFormat>,
}

/// Target canvas for [`resize_and_encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasOptions {
    pub width: u32,
    pub height: u32,
    /// RGBA fill for the letterbox area.
    pub background: [u8; 4],
}

impl CanvasOptions {
    #[must_use]
    pub fn square(size: u32) -> Self {
        Self {
            width: size,
            height: size,
            background: TRANSPARENT,
        }
    }
}

impl Default for CanvasOptions {
    fn default() -> Self {
        Self::square(STICKER_CANVAS)
    }
}

/// Get metadata about an image without fully decoding it.
pub fn get_image_metadata(data: &[u8]) -> Result<ImageMetadata> {
    let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;

    let format = reader.format();
    let (width, height) = reader.into_dimensions()?;

    Ok(ImageMetadata {
        width,
        height,
        format,
    })
}

fn decode(data: &[u8]) -> Result<DynamicImage> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()?;
    Ok(img)
}

/// Scale `img` to fit inside the canvas and centre it on the background.
pub fn fit_on_canvas(img: &DynamicImage, canvas: &CanvasOptions) -> Result<RgbaImage> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 || canvas.width == 0 || canvas.height == 0 {
        return Err(Error::invalid_input(format!(
            "cannot fit a {width}x{height} image on a {}x{} canvas",
            canvas.width, canvas.height
        )));
    }

    let ratio = (f64::from(canvas.width) / f64::from(width))
        .min(f64::from(canvas.height) / f64::from(height));
    let new_width = ((f64::from(width) * ratio).round() as u32).clamp(1, canvas.width);
    let new_height = ((f64::from(height) * ratio).round() as u32).clamp(1, canvas.height);

    let resized = img
        .resize_exact(new_width, new_height, imageops::FilterType::Lanczos3)
        .to_rgba8();

    let mut out = RgbaImage::from_pixel(canvas.width, canvas.height, Rgba(canvas.background));
    let x = i64::from((canvas.width - new_width) / 2);
    let y = i64::from((canvas.height - new_height) / 2);
    imageops::replace(&mut out, &resized, x, y);
    Ok(out)
}

/// Encode as lossless WebP.
pub fn encode_webp_lossless(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut output = Cursor::new(Vec::new());
    WebPEncoder::new_lossless(&mut output).encode(
        img.as_raw(),
        img.width(),
        img.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(output.into_inner())
}

/// Decode `data`, fit it on the canvas and encode the result as lossless WebP.
pub fn resize_and_encode(data: &[u8], canvas: &CanvasOptions) -> Result<Vec<u8>> {
    let img = decode(data)?;
    let fitted = fit_on_canvas(&img, canvas)?;
    encode_webp_lossless(&fitted)
}
