//! High-level image operations.
//!
//! These functions turn configuration into [`TransformParams`] and hand them
//! to a backend.

use super::backend::{BackendError, ImageBackend};
use super::params::{OutputFormat, Quality, TransformParams};
use crate::config::ImagesConfig;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// The fixed production transformation: bound the width, drop quality,
/// interlace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformConfig {
    pub max_width: u32,
    pub quality: Quality,
    pub interlace: bool,
}

impl TransformConfig {
    pub fn from_images_config(config: &ImagesConfig) -> Self {
        Self {
            max_width: config.max_width,
            quality: Quality::new(config.quality),
            interlace: config.interlace,
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self::from_images_config(&ImagesConfig::default())
    }
}

/// Plan the transformation for one source file.
///
/// Returns `None` for files the backend does not re-encode; the pipeline
/// copies those verbatim.
pub fn plan_transform(source: &Path, config: &TransformConfig) -> Option<TransformParams> {
    let format = OutputFormat::from_path(source)?;
    Some(TransformParams {
        source: source.to_path_buf(),
        format,
        max_width: config.max_width,
        quality: config.quality,
        interlace: config.interlace,
    })
}

/// Run a planned transformation and return the encoded bytes.
pub fn transform_image(backend: &impl ImageBackend, params: &TransformParams) -> Result<Vec<u8>> {
    backend.transform(params)
}
