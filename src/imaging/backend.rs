//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the one operation the image pipeline
//! needs: transform. It returns the encoded bytes instead of writing them, so
//! the pipeline decides when (and whether) an output file is touched.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend).

use super::params::TransformParams;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image processing backends.
///
/// `Sync` so one backend can be shared across rayon workers.
pub trait ImageBackend: Sync {
    /// Decode, bound the width, and re-encode. Returns the encoded file.
    fn transform(&self, params: &TransformParams) -> Result<Vec<u8>, BackendError>;
}
