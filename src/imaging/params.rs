//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between [`operations`](super::operations) (which decides which
//! files get transformed) and the [`backend`](super::backend) (which does the
//! pixel work), so tests can swap in a mock backend.

use std::path::{Path, PathBuf};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(70)
    }
}

/// Encoded format of a transformed image. Always the source's own format:
/// a `.png` stays a PNG so templates keep their links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    WebP,
    Tiff,
}

impl OutputFormat {
    /// Format for a file extension, or `None` for files that are copied
    /// verbatim even in production (SVG, GIF, icons, …).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::WebP),
            "tif" | "tiff" => Some(OutputFormat::Tiff),
            _ => None,
        }
    }

    pub fn image_format(self) -> image::ImageFormat {
        match self {
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
            OutputFormat::Png => image::ImageFormat::Png,
            OutputFormat::WebP => image::ImageFormat::WebP,
            OutputFormat::Tiff => image::ImageFormat::Tiff,
        }
    }
}

/// Full specification of one production transformation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformParams {
    pub source: PathBuf,
    pub format: OutputFormat,
    pub max_width: u32,
    /// JPEG: encoder quality. PNG: tens digit is the zlib level, ones digit
    /// the row filter. WebP and TIFF are written lossless and ignore it.
    pub quality: Quality,
    /// Progressive scan for JPEG output. Other formats are written
    /// non-interlaced (there is no Adam7 PNG writer).
    pub interlace: bool,
}
