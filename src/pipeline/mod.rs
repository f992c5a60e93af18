//! Asset pipelines: one synchronous function per [`AssetKind`].
//!
//! | Pipeline | Sources (default) | Output |
//! |----------|-------------------|--------|
//! | [`styles`] | `sass/**/*.scss` | `assets/css/styles.css` (compiled, prefixed, minified) |
//! | [`scripts`] | `js/**/*.js` | `assets/js/<name>` (verbatim) |
//! | [`images`] | `img/**/*` | `assets/img/<name>` (verbatim, or bounded and re-encoded in production) |
//!
//! Every pipeline reads its sources from the [`AssetRegistry`](crate::registry::AssetRegistry)
//! in match order, computes all outputs in memory, then writes them one by
//! one with [`write_atomic`]. A failure before the write phase leaves every
//! destination untouched; a reader never sees a half-written file.
//!
//! Pipelines return a [`PipelineReport`] or a [`PipelineError`]. They never
//! log failures themselves: the caller hands the result to
//! [`output`](crate::output), which decides how it is presented.

pub mod images;
pub mod scripts;
pub mod styles;

use crate::cache::CacheStats;
use crate::registry::BuildContext;
use crate::types::{AssetKind, BuildMode};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A source file could not be parsed (SCSS or CSS syntax).
    #[error("{}: {message}", path.display())]
    SourceSyntax { path: PathBuf, message: String },
    /// A library failed while transforming valid input.
    #[error("{}: {message}", path.display())]
    Transform { path: PathBuf, message: String },
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Short label used by the output layer.
    pub fn kind_label(&self) -> &'static str {
        match self {
            PipelineError::SourceSyntax { .. } => "syntax",
            PipelineError::Transform { .. } => "transform",
            PipelineError::Io { .. } => "io",
        }
    }

    /// The error without its path.
    pub fn detail(&self) -> String {
        match self {
            PipelineError::SourceSyntax { message, .. } | PipelineError::Transform { message, .. } => {
                message.clone()
            }
            PipelineError::Io { source, .. } => source.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            PipelineError::SourceSyntax { path, .. }
            | PipelineError::Transform { path, .. }
            | PipelineError::Io { path, .. } => path,
        }
    }
}

/// Outcome of one successful pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub kind: AssetKind,
    pub mode: BuildMode,
    /// Output files in write order.
    pub written: Vec<PathBuf>,
    /// Only set by production image runs.
    pub cache: Option<CacheStats>,
    pub elapsed: Duration,
}

/// Run one pipeline against the context's registry.
pub fn run(ctx: &BuildContext, kind: AssetKind) -> Result<PipelineReport, PipelineError> {
    match kind {
        AssetKind::Styles => styles::run(ctx),
        AssetKind::Scripts => scripts::run(ctx),
        AssetKind::Images => images::run(ctx),
    }
}

/// Write `bytes` to `path` through a temporary sibling and a rename.
///
/// Parent directories are created as needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| PipelineError::io(path, e))?;
    tmp.write_all(bytes).map_err(|e| PipelineError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| PipelineError::io(path, e.error))?;
    Ok(())
}

/// Copy `source` to `path` through a temporary sibling, like [`write_atomic`],
/// without holding the whole file in memory.
pub fn copy_atomic(source: &Path, path: &Path) -> Result<(), PipelineError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;

    let mut input = std::fs::File::open(source).map_err(|e| PipelineError::io(source, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| PipelineError::io(path, e))?;
    std::io::copy(&mut input, tmp.as_file_mut()).map_err(|e| PipelineError::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| PipelineError::io(path, e.error))?;
    Ok(())
}

/// Pair every source with its flattened destination `destination/<file name>`.
///
/// When two sources share a file name the later one (in match order) wins
/// and the earlier one is dropped with a warning.
pub(crate) fn flatten_into(sources: Vec<PathBuf>, destination: &Path) -> Vec<(PathBuf, PathBuf)> {
    let mut pairs: Vec<(PathBuf, PathBuf)> = Vec::with_capacity(sources.len());
    let mut by_name: HashMap<std::ffi::OsString, usize> = HashMap::new();

    for source in sources {
        let Some(name) = source.file_name().map(|n| n.to_os_string()) else {
            continue;
        };
        let target = destination.join(&name);
        match by_name.get(&name) {
            Some(&index) => {
                tracing::warn!(
                    shadowed = %pairs[index].0.display(),
                    winner = %source.display(),
                    "two sources flatten to {}",
                    target.display()
                );
                pairs[index] = (source, target);
            }
            None => {
                by_name.insert(name, pairs.len());
                pairs.push((source, target));
            }
        }
    }
    pairs
}
