//! Encoded-image cache for incremental production builds.
//!
//! Re-encoding every photo on every `--env=prod` run is the slowest part of
//! a build, and the watcher re-runs the image pipeline whenever any image
//! changes. This module lets the pipeline skip decoding and encoding when
//! the source image and the transformation parameters are unchanged.
//!
//! # Design
//!
//! Only the production transformation is cached. Development runs copy
//! bytes verbatim, which is already cheap.
//!
//! ## Cache keys
//!
//! The cache is **content-addressed**: lookups are by the combination of
//! `source_hash` and `params_hash`, not by file name. Renaming an image does
//! not invalidate its cached encoding; only content or parameter changes do.
//!
//! - **`source_hash`**: SHA-256 of the source file contents. Content-based
//!   rather than mtime-based so it survives `git checkout`.
//! - **`params_hash`**: SHA-256 of output format, maximum width, quality and
//!   interlacing. Changing any `[images]` setting re-encodes everything.
//!
//! A cache hit requires:
//! 1. An entry with matching `source_hash` and `params_hash` exists
//! 2. The stored encoding still exists on disk
//!
//! When a hit is found under a different name (the source was renamed), the
//! stored encoding is copied to the new name instead of re-encoding.
//!
//! ## Storage
//!
//! ```text
//! .siteforge-cache/
//! ├── images.json        # manifest: stored name → (source_hash, params_hash)
//! └── images/
//!     ├── photo.jpg      # last production encoding of each output
//!     └── banner.png
//! ```
//!
//! Encodings are kept apart from `assets/img` because a development run
//! overwrites those outputs with verbatim copies.
//!
//! ## Bypassing the cache
//!
//! `--no-cache` loads an empty manifest, so every image is re-encoded. The
//! stored encodings are overwritten naturally.

use crate::imaging::TransformParams;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the cache directory.
const MANIFEST_FILENAME: &str = "images.json";

/// Directory (within the cache directory) holding stored encodings.
const ENCODINGS_DIR: &str = "images";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing caches when the format or key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// A single cached encoding.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
}

/// On-disk cache manifest mapping stored names to their cache entries.
///
/// Lookups go through a runtime `content_index` that maps
/// `"{source_hash}:{params_hash}"` to the stored name, so a renamed source
/// still finds its encoding.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
    /// Runtime reverse index: `"{source_hash}:{params_hash}"` → stored name.
    /// Built at load time, maintained on insert. Never serialized.
    #[serde(skip)]
    content_index: HashMap<String, String>,
}

impl CacheManifest {
    /// Create an empty manifest (used for `--no-cache` or first build).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
            content_index: HashMap::new(),
        }
    }

    /// Load from the cache directory. Returns an empty manifest if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(cache_dir: &Path) -> Self {
        let content = match std::fs::read_to_string(manifest_path(cache_dir)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let mut manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(_) => return Self::empty(),
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest.content_index = build_content_index(&manifest.entries);
        manifest
    }

    /// Save to the cache directory, creating it if needed.
    pub fn save(&self, cache_dir: &Path) -> io::Result<()> {
        std::fs::create_dir_all(cache_dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(manifest_path(cache_dir), json)
    }

    /// Look up a stored encoding by content hashes.
    ///
    /// Returns `Some(stored_name)` if an entry with matching hashes exists
    /// **and** its file is still in `encodings_dir`. The name may differ
    /// from the caller's output name after a rename.
    pub fn find_cached(
        &self,
        source_hash: &str,
        params_hash: &str,
        encodings_dir: &Path,
    ) -> Option<String> {
        let content_key = format!("{}:{}", source_hash, params_hash);
        let stored = self.content_index.get(&content_key)?;
        if encodings_dir.join(stored).exists() {
            Some(stored.clone())
        } else {
            None
        }
    }

    /// Record the stored encoding for an output name.
    ///
    /// If the same content was stored under another name, that entry is
    /// dropped so the manifest follows renames.
    pub fn insert(&mut self, name: String, source_hash: String, params_hash: String) {
        let content_key = format!("{}:{}", source_hash, params_hash);

        if let Some(old_name) = self.content_index.get(&content_key)
            && *old_name != name
        {
            self.entries.remove(old_name.as_str());
        }

        // The name may previously have held other content.
        if let Some(previous) = self.entries.get(&name) {
            let previous_key = format!("{}:{}", previous.source_hash, previous.params_hash);
            if previous_key != content_key {
                self.content_index.remove(&previous_key);
            }
        }

        self.content_index.insert(content_key, name.clone());
        self.entries.insert(
            name,
            CacheEntry {
                source_hash,
                params_hash,
            },
        );
    }
}

/// Build the content_index reverse map from the entries map.
fn build_content_index(entries: &HashMap<String, CacheEntry>) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(name, entry)| {
            let content_key = format!("{}:{}", entry.source_hash, entry.params_hash);
            (content_key, name.clone())
        })
        .collect()
}

/// SHA-256 hash of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

/// SHA-256 hash of a byte slice, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 hash of the transformation parameters, excluding the source path.
pub fn hash_transform_params(params: &TransformParams) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"transform\0");
    hasher.update(format!("{:?}", params.format).as_bytes());
    hasher.update(b"\0");
    hasher.update(params.max_width.to_le_bytes());
    hasher.update(params.quality.value().to_le_bytes());
    hasher.update([u8::from(params.interlace)]);
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for one image run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn copy(&mut self) {
        self.copies += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 || self.copies > 0 {
            if self.copies > 0 {
                write!(
                    f,
                    "{} cached, {} copied, {} encoded ({} total)",
                    self.hits,
                    self.copies,
                    self.misses,
                    self.total()
                )
            } else {
                write!(
                    f,
                    "{} cached, {} encoded ({} total)",
                    self.hits,
                    self.misses,
                    self.total()
                )
            }
        } else {
            write!(f, "{} encoded", self.misses)
        }
    }
}

/// Resolve the cache manifest path for a cache directory.
pub fn manifest_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(MANIFEST_FILENAME)
}

/// Resolve the stored-encodings directory for a cache directory.
pub fn encodings_dir(cache_dir: &Path) -> PathBuf {
    cache_dir.join(ENCODINGS_DIR)
}
