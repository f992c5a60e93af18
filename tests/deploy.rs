//! Deploy against a local bare repository standing in for the hosting remote.
//!
//! Skipped when `git` is not installed.

#![cfg(unix)]

use siteforge::config::SiteConfig;
use siteforge::deploy::{self, DeployError};
use siteforge::orchestrator::Orchestrator;
use siteforge::registry::BuildContext;
use siteforge::types::BuildMode;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git").args(args).current_dir(dir).output().unwrap();
    assert!(
        out.status.success(),
        "git {args:?}: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn git_available() -> bool {
    Command::new("git").arg("--version").output().is_ok()
}

/// A project whose `origin` is a fresh bare repository, and a generator that
/// writes `_site/index.html` with the given body.
fn project(page: &str) -> (TempDir, TempDir, Orchestrator) {
    let project = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    git(remote.path(), &["init", "-q", "--bare"]);
    git(project.path(), &["init", "-q"]);
    git(
        project.path(),
        &["remote", "add", "origin", remote.path().to_str().unwrap()],
    );

    let mut config = SiteConfig::default();
    config.generator.command = "sh".into();
    config.generator.args = vec![
        "-c".into(),
        format!("mkdir -p _site && printf '{page}' > _site/index.html"),
    ];
    config.deploy.message = Some("Publish site".into());
    config.deploy.author_name = Some("Site Bot".into());
    config.deploy.author_email = Some("bot@example.com".into());

    let ctx = BuildContext::new(project.path(), config, BuildMode::Production, true).unwrap();
    let orchestrator = Orchestrator::new(Arc::new(ctx));
    (project, remote, orchestrator)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deploy_force_pushes_site_to_branch() {
    if !git_available() {
        return;
    }
    let (_project, remote, orchestrator) = project("v1");

    let report = deploy::deploy(&orchestrator).await.unwrap();
    assert_eq!(report.branch, "gh-pages");
    assert_eq!(report.files, 1);
    assert_eq!(
        git(remote.path(), &["show", "gh-pages:index.html"]),
        "v1"
    );
    assert_eq!(
        git(remote.path(), &["log", "-1", "--format=%s", "gh-pages"]),
        "Publish site"
    );

    // A second deploy replaces the branch instead of extending it.
    deploy::deploy(&orchestrator).await.unwrap();
    assert_eq!(
        git(remote.path(), &["rev-list", "--count", "gh-pages"]),
        "1"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_build_does_not_push() {
    if !git_available() {
        return;
    }
    let (project, remote, _) = project("v1");

    let mut config = SiteConfig::default();
    config.generator.command = "false".into();
    config.generator.args = Vec::new();
    let ctx = BuildContext::new(project.path(), config, BuildMode::Production, true).unwrap();
    let orchestrator = Orchestrator::new(Arc::new(ctx));

    let err = deploy::deploy(&orchestrator).await.unwrap_err();
    assert!(matches!(err, DeployError::Build(1)));

    let branches = Command::new("git")
        .args(["branch", "--list", "gh-pages"])
        .current_dir(remote.path())
        .output()
        .unwrap();
    assert!(String::from_utf8_lossy(&branches.stdout).trim().is_empty());
}
