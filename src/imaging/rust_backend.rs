//! Pure Rust image backend: no system libraries.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Orientation | `ImageDecoder::orientation` + `DynamicImage::apply_orientation` |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → JPEG | `jpeg_encoder::Encoder` (quality, progressive scan, ICC profile) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (quality → zlib level + filter, ICC profile) |
//! | Encode → WebP / TIFF | `image::DynamicImage::write_to` (lossless) |
//!
//! The EXIF orientation is applied to the pixels before resizing, because
//! the re-encoded file carries no EXIF block. The ICC profile is copied to
//! JPEG and PNG output.
//!
//! PNG quality follows the ImageMagick convention: the tens digit is the
//! zlib level, the ones digit the row filter (0 none, 1 sub, 2 up,
//! 3 average, 4 Paeth, 5 and above adaptive). The `png` encoder cannot write
//! Adam7, so `interlace` only affects JPEG.

use super::backend::{BackendError, ImageBackend};
use super::calculations::calculate_bounded_dimensions;
use super::params::{OutputFormat, Quality, TransformParams};
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{ColorType, DynamicImage, ImageDecoder, ImageEncoder, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoded pixels, upright, plus the embedded colour profile.
struct Decoded {
    image: DynamicImage,
    icc_profile: Option<Vec<u8>>,
}

/// Load and decode an image from disk, applying its EXIF orientation.
fn load_image(path: &Path) -> Result<Decoded, BackendError> {
    let failed = |e: image::ImageError| {
        BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
    };
    let mut decoder = ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .into_decoder()
        .map_err(failed)?;

    // Unreadable metadata is not worth failing the image over.
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let icc_profile = decoder.icc_profile().ok().flatten();

    let mut image = DynamicImage::from_decoder(decoder).map_err(failed)?;
    image.apply_orientation(orientation);
    Ok(Decoded { image, icc_profile })
}

/// Encode as JPEG through `jpeg-encoder`, which (unlike the `image` encoder)
/// can write a progressive scan.
fn encode_jpeg(
    img: &DynamicImage,
    quality: Quality,
    progressive: bool,
    icc_profile: Option<&[u8]>,
) -> Result<Vec<u8>, BackendError> {
    let rgb = img.to_rgb8();
    let too_large = |dim: u32| {
        BackendError::ProcessingFailed(format!("JPEG dimension {dim} exceeds 65535"))
    };
    let width = u16::try_from(rgb.width()).map_err(|_| too_large(rgb.width()))?;
    let height = u16::try_from(rgb.height()).map_err(|_| too_large(rgb.height()))?;

    let mut out = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut out, quality.value() as u8);
    encoder.set_progressive(progressive);
    if let Some(icc) = icc_profile {
        encoder
            .add_icc_profile(icc)
            .map_err(|e| BackendError::ProcessingFailed(format!("ICC profile rejected: {e}")))?;
    }
    encoder
        .encode(rgb.as_raw(), width, height, jpeg_encoder::ColorType::Rgb)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {e}")))?;
    Ok(out)
}

/// zlib level and row filter for a PNG quality value.
fn png_settings(quality: Quality) -> (CompressionType, PngFilter) {
    let value = quality.value();
    let level = (value / 10).min(9) as u8;
    let filter = match value % 10 {
        0 => PngFilter::NoFilter,
        1 => PngFilter::Sub,
        2 => PngFilter::Up,
        3 => PngFilter::Avg,
        4 => PngFilter::Paeth,
        _ => PngFilter::Adaptive,
    };
    (CompressionType::Level(level), filter)
}

fn encode_png(
    img: &DynamicImage,
    quality: Quality,
    icc_profile: Option<&[u8]>,
) -> Result<Vec<u8>, BackendError> {
    // PNG has no float samples.
    let converted;
    let img = match img.color() {
        ColorType::L8
        | ColorType::La8
        | ColorType::Rgb8
        | ColorType::Rgba8
        | ColorType::L16
        | ColorType::La16
        | ColorType::Rgb16
        | ColorType::Rgba16 => img,
        _ => {
            converted = DynamicImage::ImageRgba8(img.to_rgba8());
            &converted
        }
    };

    let (compression, filter) = png_settings(quality);
    let mut out = Vec::new();
    let mut encoder = PngEncoder::new_with_quality(&mut out, compression, filter);
    if let Some(icc) = icc_profile {
        encoder
            .set_icc_profile(icc.to_vec())
            .map_err(|e| BackendError::ProcessingFailed(format!("ICC profile rejected: {e}")))?;
    }
    encoder
        .write_image(img.as_bytes(), img.width(), img.height(), img.color().into())
        .map_err(|e| BackendError::ProcessingFailed(format!("PNG encode failed: {e}")))?;
    Ok(out)
}

/// Encode WebP or TIFF through the `image` crate's lossless encoders.
fn encode_lossless(img: &DynamicImage, format: OutputFormat) -> Result<Vec<u8>, BackendError> {
    // The WebP encoder only takes 8-bit RGB(A).
    let converted;
    let img = if format == OutputFormat::WebP {
        converted = DynamicImage::ImageRgba8(img.to_rgba8());
        &converted
    } else {
        img
    };

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format.image_format()).map_err(|e| {
        BackendError::ProcessingFailed(format!("{format:?} encode failed: {e}"))
    })?;
    Ok(buf.into_inner())
}

impl ImageBackend for RustBackend {
    fn transform(&self, params: &TransformParams) -> Result<Vec<u8>, BackendError> {
        let Decoded { image, icc_profile } = load_image(&params.source)?;
        let (width, height) =
            calculate_bounded_dimensions((image.width(), image.height()), params.max_width);

        let resized = if (width, height) == (image.width(), image.height()) {
            image
        } else {
            image.resize_exact(width, height, FilterType::Lanczos3)
        };

        let icc = icc_profile.as_deref();
        match params.format {
            OutputFormat::Jpeg => encode_jpeg(&resized, params.quality, params.interlace, icc),
            OutputFormat::Png => encode_png(&resized, params.quality, icc),
            other => encode_lossless(&resized, other),
        }
    }
}
