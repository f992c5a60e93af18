//! Shared types used across the pipelines, the orchestrator and the watcher.

use std::fmt;

/// Development vs production build.
///
/// Chosen once at process start and never changed afterwards. Only the image
/// pipeline looks at it: production runs resize and re-encode, development
/// runs copy bytes verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    pub fn is_production(self) -> bool {
        self == BuildMode::Production
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildMode::Development => f.write_str("development"),
            BuildMode::Production => f.write_str("production"),
        }
    }
}

/// The three asset groups that have an in-process pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Styles,
    Scripts,
    Images,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Styles => "styles",
            AssetKind::Scripts => "scripts",
            AssetKind::Images => "images",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every group the registry knows about: the asset groups plus the files the
/// external generator reads (templates, posts, includes, data).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupKind {
    Asset(AssetKind),
    Generator,
}

impl GroupKind {
    pub const ALL: [GroupKind; 4] = [
        GroupKind::Asset(AssetKind::Styles),
        GroupKind::Asset(AssetKind::Scripts),
        GroupKind::Asset(AssetKind::Images),
        GroupKind::Generator,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GroupKind::Asset(kind) => kind.as_str(),
            GroupKind::Generator => "generator",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<AssetKind> for GroupKind {
    fn from(kind: AssetKind) -> Self {
        GroupKind::Asset(kind)
    }
}
