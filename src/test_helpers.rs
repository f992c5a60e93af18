//! Shared test utilities for the siteforge test suite.
//!
//! Builds throwaway projects in temp directories with the conventional
//! layout (`_dev/src/{sass,js,img}`, `index.html`, …) so pipeline tests can
//! run against real files.
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_file(tmp.path(), "_dev/src/sass/main.scss", "body { color: red; }");
//! let ctx = context(tmp.path(), BuildMode::Development);
//! ```

use crate::config::SiteConfig;
use crate::registry::BuildContext;
use crate::types::BuildMode;
use image::{ImageEncoder, RgbImage};
use std::path::{Path, PathBuf};

/// Write `contents` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    path
}

/// Create a small valid JPEG file with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Create a small valid PNG file with the given dimensions.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, 64, (y % 256) as u8])
    });
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}

/// Build context for a temp project with stock config.
pub fn context(root: &Path, mode: BuildMode) -> BuildContext {
    context_with(root, SiteConfig::default(), mode)
}

/// Build context for a temp project with a custom config.
pub fn context_with(root: &Path, config: SiteConfig, mode: BuildMode) -> BuildContext {
    BuildContext::new(root, config, mode, true).unwrap()
}
