//! Path/asset registry.
//!
//! Maps every [`GroupKind`] to a base directory, an ordered list of glob
//! patterns and a destination directory. The registry answers two questions:
//!
//! - **Which files does a pipeline read?** ([`AssetGroup::matched_files`]):
//!   sorted per pattern, patterns in configured order, duplicates dropped.
//! - **Which groups own a changed path?** ([`AssetRegistry::route`]): used by
//!   the watcher to decide what to re-run.
//!
//! Patterns are matched against the path relative to the group's base with
//! `/` as a literal separator, so `_posts/*` does not reach into
//! `_posts/drafts/old.md` and `index.html` never matches `_site/index.html`.
//!
//! Files below any output directory (assets, site, cache) are never matched,
//! so no pipeline reads its own output.

use crate::config::{ConfigError, SiteConfig};
use crate::types::{AssetKind, BuildMode, GroupKind};
use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One named category of source files sharing patterns and a destination.
#[derive(Debug, Clone)]
pub struct AssetGroup {
    pub kind: GroupKind,
    /// Directory the patterns are relative to.
    pub base: PathBuf,
    pub patterns: Vec<String>,
    /// Directory the group's pipeline writes into.
    pub destination: PathBuf,
    matchers: Vec<GlobMatcher>,
    set: GlobSet,
}

fn compile_glob(pattern: &str) -> Result<Glob, ConfigError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|source| ConfigError::Glob {
            pattern: pattern.to_string(),
            source,
        })
}

impl AssetGroup {
    pub fn new(
        kind: GroupKind,
        base: PathBuf,
        patterns: Vec<String>,
        destination: PathBuf,
    ) -> Result<Self, ConfigError> {
        let mut matchers = Vec::with_capacity(patterns.len());
        let mut builder = GlobSetBuilder::new();
        for pattern in &patterns {
            let glob = compile_glob(pattern)?;
            matchers.push(glob.compile_matcher());
            builder.add(glob);
        }
        let set = builder.build().map_err(|source| ConfigError::Glob {
            pattern: patterns.join(", "),
            source,
        })?;
        Ok(Self {
            kind,
            base,
            patterns,
            destination,
            matchers,
            set,
        })
    }

    /// Whether a path relative to [`base`](Self::base) matches any pattern.
    pub fn matches_relative(&self, relative: &Path) -> bool {
        self.set.is_match(relative)
    }

    /// All files matched by the group, in write order.
    ///
    /// Files under any of `excluded` (output directories) are skipped. A
    /// missing base directory yields an empty list; an empty match is not an
    /// error.
    pub fn matched_files(&self, excluded: &[PathBuf]) -> Vec<PathBuf> {
        if !self.base.is_dir() {
            return Vec::new();
        }

        let candidates: Vec<(PathBuf, PathBuf)> = WalkDir::new(&self.base)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !excluded.iter().any(|dir| entry.path().starts_with(dir)))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let path = entry.into_path();
                let relative = path.strip_prefix(&self.base).ok()?.to_path_buf();
                Some((path, relative))
            })
            .collect();

        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        for matcher in &self.matchers {
            for (path, relative) in &candidates {
                if matcher.is_match(relative) && seen.insert(path.clone()) {
                    ordered.push(path.clone());
                }
            }
        }
        ordered
    }
}

/// All four groups of a project.
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    groups: Vec<AssetGroup>,
    /// Output directories plus `.git`; never treated as sources.
    excluded: Vec<PathBuf>,
}

impl AssetRegistry {
    /// Build the registry for a project root from configuration.
    ///
    /// Rejects layouts where a group's base lies inside its own destination,
    /// or an asset group writes straight into its source directory.
    pub fn from_config(root: &Path, config: &SiteConfig) -> Result<Self, ConfigError> {
        let source_root = root.join(&config.paths.source_root);
        let assets = root.join(&config.paths.assets_dir);
        let site = root.join(&config.paths.site_dir);

        let groups = vec![
            AssetGroup::new(
                AssetKind::Styles.into(),
                source_root.clone(),
                config.styles.sources.clone(),
                assets.join(&config.styles.output),
            )?,
            AssetGroup::new(
                AssetKind::Scripts.into(),
                source_root.clone(),
                config.scripts.sources.clone(),
                assets.join(&config.scripts.output),
            )?,
            AssetGroup::new(
                AssetKind::Images.into(),
                source_root,
                config.images.sources.clone(),
                assets.join(&config.images.output),
            )?,
            AssetGroup::new(
                GroupKind::Generator,
                root.to_path_buf(),
                config.generator.sources.clone(),
                site.clone(),
            )?,
        ];

        for group in &groups {
            if group.base.starts_with(&group.destination) {
                return Err(ConfigError::Validation(format!(
                    "{} sources ({}) must not live inside the output directory {}",
                    group.kind,
                    group.base.display(),
                    group.destination.display()
                )));
            }
            if matches!(group.kind, GroupKind::Asset(_)) && group.destination.starts_with(&group.base)
            {
                return Err(ConfigError::Validation(format!(
                    "{} output ({}) must not live inside the source directory {}",
                    group.kind,
                    group.destination.display(),
                    group.base.display()
                )));
            }
        }

        let excluded = vec![
            assets,
            site,
            root.join(&config.paths.cache_dir),
            root.join(".git"),
        ];

        Ok(Self { groups, excluded })
    }

    pub fn group(&self, kind: GroupKind) -> &AssetGroup {
        self.groups
            .iter()
            .find(|g| g.kind == kind)
            .expect("registry holds every group kind")
    }

    pub fn groups(&self) -> &[AssetGroup] {
        &self.groups
    }

    /// Files a group's pipeline should read, in write order.
    pub fn sources(&self, kind: GroupKind) -> Vec<PathBuf> {
        self.group(kind).matched_files(&self.excluded)
    }

    /// Groups owning a changed path. Paths in output directories own none.
    pub fn route(&self, path: &Path) -> Vec<GroupKind> {
        if self.excluded.iter().any(|dir| path.starts_with(dir)) {
            return Vec::new();
        }
        self.groups
            .iter()
            .filter(|group| {
                path.strip_prefix(&group.base)
                    .is_ok_and(|relative| group.matches_relative(relative))
            })
            .map(|group| group.kind)
            .collect()
    }
}

/// Everything a build step needs, created once at startup and shared
/// read-only by every component.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Absolute project root.
    pub root: PathBuf,
    pub config: SiteConfig,
    pub mode: BuildMode,
    pub registry: AssetRegistry,
    /// When false, the image cache is ignored and every image re-encoded.
    pub use_cache: bool,
}

impl BuildContext {
    pub fn new(
        root: &Path,
        config: SiteConfig,
        mode: BuildMode,
        use_cache: bool,
    ) -> Result<Self, ConfigError> {
        let root = root.canonicalize()?;
        let registry = AssetRegistry::from_config(&root, &config)?;
        Ok(Self {
            root,
            config,
            mode,
            registry,
            use_cache,
        })
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.assets_dir)
    }

    pub fn site_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.site_dir)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.cache_dir)
    }

    pub fn destination(&self, kind: GroupKind) -> &Path {
        &self.registry.group(kind).destination
    }
}
