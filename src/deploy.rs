//! Deploy: publish the generated site to a hosting branch.
//!
//! ```text
//! build ─ exit 0? ─ temp repo ← copy _site/ ─ git add -A ─ commit ─ push --force <url> HEAD:gh-pages
//! ```
//!
//! The branch is overwritten on every deploy; its history is not kept. The
//! remote URL is read from the project repository (`git remote get-url`),
//! so whatever the project pushes to is where the site goes.
//!
//! `git` runs with captured output. Its stderr becomes the error message.

use crate::config::DeployConfig;
use crate::orchestrator::Orchestrator;
use crate::registry::BuildContext;
use chrono::{SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("site directory {0} does not exist; nothing to deploy")]
    MissingSite(PathBuf),
    #[error("git {args} failed: {stderr}")]
    Git { args: String, stderr: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("build failed (generator exit code {0}); not deploying")]
    Build(i32),
}

/// What a successful deploy pushed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub url: String,
    pub branch: String,
    pub files: usize,
    pub message: String,
}

/// Run git in `dir` and return its trimmed stdout.
fn git(dir: &Path, args: &[&str]) -> Result<String, DeployError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .map_err(|e| DeployError::Git {
            args: args.join(" "),
            stderr: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(DeployError::Git {
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Make a remote URL usable from another working directory.
///
/// URLs with a scheme (`https://`, `ssh://`, `file://`) and scp-style
/// `user@host:path` addresses are kept; relative local paths are resolved
/// against the project root.
pub fn resolve_url(root: &Path, url: &str) -> String {
    let has_scheme = url.contains("://");
    let scp_like = url
        .split_once(':')
        .is_some_and(|(host, _)| !host.is_empty() && !host.contains('/') && host.len() > 1);
    if has_scheme || scp_like || Path::new(url).is_absolute() {
        url.to_string()
    } else {
        root.join(url).display().to_string()
    }
}

/// Commit message for a deploy made at the current time.
pub fn commit_message(config: &DeployConfig) -> String {
    match &config.message {
        Some(message) => message.clone(),
        None => format!(
            "Update {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
        ),
    }
}

/// Copy the site tree into `work_dir`. Returns the number of files copied.
fn stage_site(site_dir: &Path, work_dir: &Path) -> Result<usize, DeployError> {
    let mut files = 0;
    for entry in WalkDir::new(site_dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(site_dir)
            .map_err(std::io::Error::other)?;
        let target = work_dir.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)?;
            files += 1;
        }
    }
    Ok(files)
}

/// Push the current site directory to the configured branch.
///
/// Does not build; see [`deploy`].
pub fn publish(ctx: &BuildContext) -> Result<DeployReport, DeployError> {
    let config = &ctx.config.deploy;
    let site_dir = ctx.site_dir();
    if !site_dir.is_dir() {
        return Err(DeployError::MissingSite(site_dir));
    }

    let url = git(&ctx.root, &["remote", "get-url", &config.remote])?;
    let url = resolve_url(&ctx.root, &url);

    let work = tempfile::TempDir::new()?;
    let files = stage_site(&site_dir, work.path())?;
    tracing::info!(files, branch = %config.branch, "publishing site");

    let message = commit_message(config);
    let mut identity = Vec::new();
    if let Some(name) = &config.author_name {
        identity.push(format!("user.name={name}"));
    }
    if let Some(email) = &config.author_email {
        identity.push(format!("user.email={email}"));
    }

    git(work.path(), &["init", "-q"])?;
    git(work.path(), &["add", "-A"])?;

    let mut commit: Vec<&str> = Vec::new();
    for setting in &identity {
        commit.extend(["-c", setting.as_str()]);
    }
    commit.extend([
        "-c",
        "commit.gpgsign=false",
        "commit",
        "-q",
        "--allow-empty",
        "-m",
        message.as_str(),
    ]);
    git(work.path(), &commit)?;

    let refspec = format!("HEAD:refs/heads/{}", config.branch);
    git(work.path(), &["push", "--force", "-q", &url, &refspec])?;

    Ok(DeployReport {
        url,
        branch: config.branch.clone(),
        files,
        message,
    })
}

/// Build the site, then publish it. A failed build aborts the deploy.
pub async fn deploy(orchestrator: &Orchestrator) -> Result<DeployReport, DeployError> {
    let outcome = orchestrator.build().await;
    let code = outcome.exit_code();
    if code != 0 {
        return Err(DeployError::Build(code));
    }

    let ctx = Arc::clone(orchestrator.context());
    tokio::task::spawn_blocking(move || publish(&ctx))
        .await
        .map_err(|e| DeployError::Io(std::io::Error::other(e)))?
}
