//! Build configuration module.
//!
//! Handles loading, validating, and merging `siteforge.toml`. Configuration is
//! layered: stock defaults are overridden by the user file in the project
//! root, which is in turn overridden by a named profile selected with
//! `--profile`.
//!
//! ## Config File Location
//!
//! ```text
//! project/
//! ├── siteforge.toml        # Optional; stock defaults apply when absent
//! ├── _dev/src/             # Asset sources (sass/, js/, img/)
//! ├── assets/               # Pipeline output, read by the generator
//! ├── _site/                # Generator output, served and deployed
//! └── index.html, _posts/, _layouts/, _includes/, _data/
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! source_root = "_dev/src"
//! assets_dir = "assets"
//! site_dir = "_site"
//! cache_dir = ".siteforge-cache"
//!
//! [styles]
//! sources = ["sass/**/*.scss"]
//! output = "css"
//! basename = "styles"
//! browsers = ["last 3 versions", "ie 9"]
//! custom_media = true
//! fingerprint = false
//! asset_map = "_data/assets.json"
//!
//! [images]
//! sources = ["img/**/*"]
//! output = "img"
//! max_width = 750
//! quality = 70
//! interlace = true
//!
//! [generator]
//! command = "jekyll"
//! args = ["build", "--incremental"]
//!
//! [server]
//! port = 4000
//! ```
//!
//! ## Profiles
//!
//! A profile is a sparse table under `[profiles.<name>]` with the same shape
//! as the top level. It is merged last:
//!
//! ```toml
//! [profiles.preview]
//! paths = { site_dir = "_preview" }
//! generator = { args = ["build", "--drafts"] }
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default config file name, looked up in the project root.
pub const CONFIG_FILENAME: &str = "siteforge.toml";

/// Key holding the named profile overlays. Stripped before deserializing.
const PROFILES_KEY: &str = "profiles";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Unknown profile '{name}' (available: {available})")]
    UnknownProfile { name: String, available: String },
    #[error("Invalid glob pattern '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Build configuration loaded from `siteforge.toml`.
///
/// All fields have sensible defaults mirroring a conventional Jekyll project.
/// User config files need only specify the values they want to override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Directory layout, relative to the project root.
    pub paths: PathsConfig,
    /// Stylesheet pipeline settings.
    pub styles: StylesConfig,
    /// Script pipeline settings.
    pub scripts: ScriptsConfig,
    /// Image pipeline settings.
    pub images: ImagesConfig,
    /// External site generator invocation.
    pub generator: GeneratorConfig,
    /// Local dev server.
    pub server: ServerConfig,
    /// File watcher.
    pub watch: WatchConfig,
    /// Deploy target.
    pub deploy: DeployConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.quality == 0 || self.images.quality > 100 {
            return Err(ConfigError::Validation(
                "images.quality must be 1-100".into(),
            ));
        }
        if self.images.max_width == 0 {
            return Err(ConfigError::Validation(
                "images.max_width must be non-zero".into(),
            ));
        }
        for (name, sources) in [
            ("styles.sources", &self.styles.sources),
            ("scripts.sources", &self.scripts.sources),
            ("images.sources", &self.images.sources),
            ("generator.sources", &self.generator.sources),
        ] {
            if sources.is_empty() {
                return Err(ConfigError::Validation(format!("{name} must not be empty")));
            }
        }
        if self.styles.basename.trim().is_empty() {
            return Err(ConfigError::Validation(
                "styles.basename must not be empty".into(),
            ));
        }
        if self.styles.fingerprint && self.styles.asset_map.trim().is_empty() {
            return Err(ConfigError::Validation(
                "styles.asset_map must not be empty when fingerprint is on".into(),
            ));
        }
        if self.generator.command.trim().is_empty() {
            return Err(ConfigError::Validation(
                "generator.command must not be empty".into(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port must be non-zero".into(),
            ));
        }
        if self.deploy.branch.trim().is_empty() {
            return Err(ConfigError::Validation(
                "deploy.branch must not be empty".into(),
            ));
        }
        crate::pipeline::styles::browser_targets(&self.styles.browsers)
            .map_err(|e| ConfigError::Validation(format!("styles.browsers: {e}")))?;
        Ok(())
    }
}

/// Directory layout. Every path is relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Root of the asset sources (`sass/`, `js/`, `img/` live below it).
    pub source_root: String,
    /// Where pipeline output is written; the generator reads it from here.
    pub assets_dir: String,
    /// Where the external generator writes the finished site.
    pub site_dir: String,
    /// Intermediate files (image cache manifest).
    pub cache_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_root: "_dev/src".to_string(),
            assets_dir: "assets".to_string(),
            site_dir: "_site".to_string(),
            cache_dir: ".siteforge-cache".to_string(),
        }
    }
}

/// Stylesheet pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesConfig {
    /// Glob patterns relative to `paths.source_root`.
    pub sources: Vec<String>,
    /// Output directory below `paths.assets_dir`.
    pub output: String,
    /// Output file stem (`styles` → `styles.css`).
    pub basename: String,
    /// Browserslist queries driving vendor prefixing.
    pub browsers: Vec<String>,
    /// Resolve `@custom-media` rules at build time.
    pub custom_media: bool,
    /// Append a content hash to the output file name.
    pub fingerprint: bool,
    /// JSON file (relative to the project root) naming the fingerprinted
    /// stylesheet, for templates to link to. Written only with `fingerprint`.
    pub asset_map: String,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            sources: vec!["sass/**/*.scss".to_string()],
            output: "css".to_string(),
            basename: "styles".to_string(),
            browsers: vec!["last 3 versions".to_string(), "ie 9".to_string()],
            custom_media: true,
            fingerprint: false,
            asset_map: "_data/assets.json".to_string(),
        }
    }
}

/// Script pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
    /// Glob patterns relative to `paths.source_root`.
    pub sources: Vec<String>,
    /// Output directory below `paths.assets_dir`.
    pub output: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            sources: vec!["js/**/*.js".to_string()],
            output: "js".to_string(),
        }
    }
}

/// Image pipeline settings. The transformation fields only apply to
/// production builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Glob patterns relative to `paths.source_root`.
    pub sources: Vec<String>,
    /// Output directory below `paths.assets_dir`.
    pub output: String,
    /// Maximum output width in pixels. Smaller images are never upscaled.
    pub max_width: u32,
    /// JPEG quality (1 = worst, 100 = best). For PNG the tens digit is the
    /// zlib level and the ones digit the row filter.
    pub quality: u32,
    /// Write progressive (line-interlaced) JPEGs.
    pub interlace: bool,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            sources: vec!["img/**/*".to_string()],
            output: "img".to_string(),
            max_width: 750,
            quality: 70,
            interlace: true,
        }
    }
}

/// External site generator invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Program to run (looked up on `PATH`).
    pub command: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Files the generator reads, relative to the project root. Changes to
    /// these trigger a full rebuild in watch mode.
    pub sources: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: "jekyll".to_string(),
            args: vec!["build".to_string(), "--incremental".to_string()],
            sources: vec![
                "index.html".to_string(),
                "_posts/*".to_string(),
                "_layouts/*".to_string(),
                "_includes/*".to_string(),
                "_data/*.yml".to_string(),
            ],
        }
    }
}

/// Local dev server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
        }
    }
}

/// File watcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Quiet period after a change before the pipeline runs. Changes inside
    /// the window are coalesced into one run.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

/// Deploy target: a branch on a git remote, overwritten on every deploy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeployConfig {
    /// Name of the git remote in the project repository.
    pub remote: String,
    /// Branch that receives the site tree.
    pub branch: String,
    /// Commit message. Defaults to `Update <timestamp>`.
    pub message: Option<String>,
    /// Committer name; falls back to the host's git configuration.
    pub author_name: Option<String>,
    /// Committer email; falls back to the host's git configuration.
    pub author_email: Option<String>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            branch: "gh-pages".to_string(),
            message: None,
            author_name: None,
            author_email: None,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image encoding workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Remove the `[profiles]` table from a raw user config and return it.
fn take_profiles(raw: &mut Option<toml::Value>) -> toml::Table {
    match raw.as_mut().and_then(|v| v.as_table_mut()) {
        Some(table) => match table.remove(PROFILES_KEY) {
            Some(toml::Value::Table(profiles)) => profiles,
            _ => toml::Table::new(),
        },
        None => toml::Table::new(),
    }
}

/// Pick the named profile overlay out of the profiles table.
fn select_profile(
    profiles: &toml::Table,
    name: Option<&str>,
) -> Result<Option<toml::Value>, ConfigError> {
    let Some(name) = name else {
        return Ok(None);
    };
    match profiles.get(name) {
        Some(value) => Ok(Some(value.clone())),
        None => {
            let mut available: Vec<&str> = profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            Err(ConfigError::UnknownProfile {
                name: name.to_string(),
                available: if available.is_empty() {
                    "none".to_string()
                } else {
                    available.join(", ")
                },
            })
        }
    }
}

/// Merge the user overlay and then the profile overlay onto a base value,
/// deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
    profile: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let mut merged = base;
    for layer in [overlay, profile].into_iter().flatten() {
        merged = merge_toml(merged, layer);
    }
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file, applying an optional profile.
///
/// Merges user values on top of stock defaults, then the profile on top of
/// that, rejects unknown keys, and validates the result. A missing file is
/// not an error (stock defaults apply), but a missing profile is.
pub fn load_config(path: &Path, profile: Option<&str>) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let mut overlay = load_raw_config(path)?;
    let profiles = take_profiles(&mut overlay);
    let profile_overlay = select_profile(&profiles, profile)?;
    resolve_config(base, overlay, profile_overlay)
}

/// Returns a fully-commented stock `siteforge.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# siteforge configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.
#
# Named profiles live under [profiles.<name>] and are selected with
# `siteforge --profile <name>`. They only need the keys they override.

# ---------------------------------------------------------------------------
# Directory layout (relative to the project root)
# ---------------------------------------------------------------------------
[paths]
# Asset sources: sass/, js/ and img/ live below this directory.
source_root = "_dev/src"
# Pipeline output. The site generator copies it into the site.
assets_dir = "assets"
# Generator output. Served by `siteforge server`, pushed by `siteforge deploy`.
site_dir = "_site"
# Intermediate files such as the image cache manifest.
cache_dir = ".siteforge-cache"

# ---------------------------------------------------------------------------
# Stylesheets: SCSS -> CSS -> prefixed -> minified -> one file
# ---------------------------------------------------------------------------
[styles]
# Globs relative to paths.source_root. Files starting with `_` are partials.
sources = ["sass/**/*.scss"]
# Output directory below paths.assets_dir.
output = "css"
# Output file name without extension.
basename = "styles"
# Browserslist queries used for vendor prefixing.
browsers = ["last 3 versions", "ie 9"]
# Resolve @custom-media definitions at build time.
custom_media = true
# Write <basename>-<hash>.css instead of <basename>.css.
fingerprint = false
# With fingerprint on, the current file name is written here as
# {"stylesheet": "/assets/css/styles-<hash>.css"}; in Jekyll templates use
# {{ site.data.assets.stylesheet }}.
asset_map = "_data/assets.json"

# ---------------------------------------------------------------------------
# Scripts: copied verbatim
# ---------------------------------------------------------------------------
[scripts]
sources = ["js/**/*.js"]
output = "js"

# ---------------------------------------------------------------------------
# Images: copied in development, resized in production (--env prod)
# ---------------------------------------------------------------------------
[images]
sources = ["img/**/*"]
output = "img"
# Maximum width in pixels. Smaller images are never upscaled.
max_width = 750
# JPEG quality (1-100). For PNG: tens digit = zlib level, ones digit =
# row filter (0 none, 1 sub, 2 up, 3 average, 4 paeth, 5+ adaptive).
quality = 70
# Write progressive (line-interlaced) JPEGs.
interlace = true

# ---------------------------------------------------------------------------
# External site generator
# ---------------------------------------------------------------------------
[generator]
command = "jekyll"
args = ["build", "--incremental"]
# Files the generator reads; a change triggers a full rebuild in watch mode.
sources = ["index.html", "_posts/*", "_layouts/*", "_includes/*", "_data/*.yml"]

# ---------------------------------------------------------------------------
# Dev server
# ---------------------------------------------------------------------------
[server]
host = "127.0.0.1"
port = 4000

# ---------------------------------------------------------------------------
# Watcher
# ---------------------------------------------------------------------------
[watch]
# Changes within this window are coalesced into one run.
debounce_ms = 100

# ---------------------------------------------------------------------------
# Deploy: force-push the site tree to a branch
# ---------------------------------------------------------------------------
[deploy]
remote = "origin"
branch = "gh-pages"
# message = "Update site"
# author_name = "Site Bot"
# author_email = "bot@example.com"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-encoding workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
