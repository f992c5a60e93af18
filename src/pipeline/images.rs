//! Image pipeline: copy in development, bound and re-encode in production.
//!
//! ## Development
//!
//! Every matched file is copied byte for byte, streamed from the source to
//! the output. Nothing is decoded or held in memory. The staging phase only
//! checks that each source can be opened.
//!
//! ## Production
//!
//! Raster formats the backend understands (JPEG, PNG, WebP, TIFF) are
//! resized to at most `images.max_width` pixels wide and re-encoded in their
//! own format at `images.quality`; JPEGs are written progressive when
//! `images.interlace` is set. Everything else (SVG, GIF, icons) is copied.
//!
//! Encoding runs on the rayon pool. Results are collected in match order
//! and written only after every image succeeded, so one corrupt file leaves
//! the whole output directory as it was.
//!
//! Encodings are cached by content hash (see [`crate::cache`]): an unchanged
//! image is read back from the cache instead of being encoded again.

use super::{PipelineError, PipelineReport, copy_atomic, flatten_into, write_atomic};
use crate::cache::{self, CacheManifest, CacheStats};
use crate::imaging::{
    BackendError, ImageBackend, RustBackend, TransformConfig, plan_transform, transform_image,
};
use crate::registry::BuildContext;
use crate::types::AssetKind;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// How a staged output was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Origin {
    /// Source bytes, untouched.
    Verbatim,
    /// Stored encoding under the same name.
    Cached,
    /// Stored encoding under another name (the source was renamed).
    Copied { source_hash: String, params_hash: String },
    Encoded { source_hash: String, params_hash: String },
}

/// Output contents: fresh bytes, or an existing file to copy from.
enum Payload {
    Bytes(Vec<u8>),
    File(PathBuf),
}

impl Payload {
    fn write_to(&self, path: &Path) -> Result<(), PipelineError> {
        match self {
            Payload::Bytes(bytes) => write_atomic(path, bytes),
            Payload::File(source) => copy_atomic(source, path),
        }
    }
}

struct Staged {
    target: PathBuf,
    payload: Payload,
    origin: Origin,
}

/// Stage a file for a later verbatim copy, failing now if it cannot be read.
fn stage_copy(source: &Path, target: PathBuf) -> Result<Staged, PipelineError> {
    std::fs::File::open(source).map_err(|e| PipelineError::io(source, e))?;
    Ok(Staged {
        target,
        payload: Payload::File(source.to_path_buf()),
        origin: Origin::Verbatim,
    })
}

fn cache_name(target: &Path) -> String {
    target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn backend_error(source: &Path, err: BackendError) -> PipelineError {
    match err {
        BackendError::Io(e) => PipelineError::io(source, e),
        other => PipelineError::Transform {
            path: source.to_path_buf(),
            message: other.to_string(),
        },
    }
}

fn stage_production(
    backend: &impl ImageBackend,
    source: &Path,
    target: PathBuf,
    transform: &TransformConfig,
    manifest: &CacheManifest,
    encodings: &Path,
) -> Result<Staged, PipelineError> {
    let Some(params) = plan_transform(source, transform) else {
        return stage_copy(source, target);
    };

    let source_hash = cache::hash_file(source).map_err(|e| PipelineError::io(source, e))?;
    let params_hash = cache::hash_transform_params(&params);

    if let Some(stored) = manifest.find_cached(&source_hash, &params_hash, encodings) {
        let stored_path = encodings.join(&stored);
        std::fs::File::open(&stored_path).map_err(|e| PipelineError::io(&stored_path, e))?;
        let origin = if stored == cache_name(&target) {
            Origin::Cached
        } else {
            Origin::Copied {
                source_hash,
                params_hash,
            }
        };
        return Ok(Staged {
            target,
            payload: Payload::File(stored_path),
            origin,
        });
    }

    tracing::debug!(source = %source.display(), "encoding");
    let bytes = transform_image(backend, &params).map_err(|e| backend_error(source, e))?;
    Ok(Staged {
        target,
        payload: Payload::Bytes(bytes),
        origin: Origin::Encoded {
            source_hash,
            params_hash,
        },
    })
}

/// Run the image pipeline with the pure-Rust backend.
pub fn run(ctx: &BuildContext) -> Result<PipelineReport, PipelineError> {
    run_with_backend(ctx, &RustBackend::new())
}

/// Run the image pipeline with a custom backend (for testing).
pub fn run_with_backend(
    ctx: &BuildContext,
    backend: &impl ImageBackend,
) -> Result<PipelineReport, PipelineError> {
    let started = Instant::now();
    let kind = AssetKind::Images.into();
    let pairs = flatten_into(ctx.registry.sources(kind), ctx.destination(kind));
    let production = ctx.mode.is_production();

    let cache_dir = ctx.cache_dir();
    let encodings = cache::encodings_dir(&cache_dir);
    let mut manifest = if production && ctx.use_cache {
        CacheManifest::load(&cache_dir)
    } else {
        CacheManifest::empty()
    };
    let transform = TransformConfig::from_images_config(&ctx.config.images);

    let staged: Vec<Staged> = pairs
        .into_par_iter()
        .map(|(source, target)| {
            if production {
                stage_production(backend, &source, target, &transform, &manifest, &encodings)
            } else {
                stage_copy(&source, target)
            }
        })
        .collect::<Result<_, _>>()?;

    let mut stats = CacheStats::default();
    let mut written = Vec::with_capacity(staged.len());
    for Staged {
        target,
        payload,
        origin,
    } in staged
    {
        payload.write_to(&target)?;

        let store = match origin {
            Origin::Verbatim => None,
            Origin::Cached => {
                stats.hit();
                None
            }
            Origin::Copied {
                source_hash,
                params_hash,
            } => {
                stats.copy();
                Some((source_hash, params_hash))
            }
            Origin::Encoded {
                source_hash,
                params_hash,
            } => {
                stats.miss();
                Some((source_hash, params_hash))
            }
        };
        if let Some((source_hash, params_hash)) = store {
            let name = cache_name(&target);
            match payload.write_to(&encodings.join(&name)) {
                Ok(()) => manifest.insert(name, source_hash, params_hash),
                Err(e) => tracing::warn!("could not store encoding: {e}"),
            }
        }
        written.push(target);
    }

    if production && let Err(e) = manifest.save(&cache_dir) {
        tracing::warn!(path = %cache_dir.display(), "could not save image cache: {e}");
    }

    Ok(PipelineReport {
        kind: AssetKind::Images,
        mode: ctx.mode,
        written,
        cache: production.then_some(stats),
        elapsed: started.elapsed(),
    })
}
