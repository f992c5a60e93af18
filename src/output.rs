//! Run output: human-readable summaries of pipelines, builds and services.
//!
//! # Output Format
//!
//! ## Pipeline
//!
//! ```text
//! styles: 1 file (38ms)
//!     assets/css/styles.css
//! images: 3 files (1.2s)
//!     assets/img/banner.jpg
//!     assets/img/logo.svg
//!     assets/img/photo.png
//!     Cache: 1 cached, 1 encoded (2 total)
//! ✗ [syntax] styles
//!     _dev/src/sass/main.scss: expected "}".
//! ```
//!
//! ## Build
//!
//! ```text
//! jekyll finished
//! Build finished in 2.4s: 3/3 pipelines ok, generator exited with 0
//! ```
//!
//! # Architecture
//!
//! Each entity has a `format_*` function (returns `Vec<String>`) for
//! testability and a `log_*` wrapper that emits the lines as `tracing`
//! events. Format functions are pure: no I/O, no side effects. The wrappers
//! pick the level: `info` for success, `warn` for a non-zero generator exit,
//! `error` for failures.

use crate::deploy::DeployReport;
use crate::generator::GeneratorError;
use crate::orchestrator::BuildOutcome;
use crate::pipeline::{PipelineError, PipelineReport};
use crate::registry::AssetGroup;
use crate::types::AssetKind;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Path relative to the project root when possible, for display.
fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// `38ms` below one second, `1.2s` above.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else {
        format!("{:.1}s", duration.as_secs_f64())
    }
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

// ============================================================================
// Pipelines
// ============================================================================

/// Format a successful pipeline run: header plus one line per written file.
pub fn format_pipeline_report(report: &PipelineReport, root: &Path) -> Vec<String> {
    let mut lines = vec![format!(
        "{}: {} ({})",
        report.kind,
        plural(report.written.len(), "file"),
        format_duration(report.elapsed)
    )];
    for path in &report.written {
        lines.push(format!("{}{}", indent(1), display_path(path, root)));
    }
    if let Some(stats) = &report.cache
        && stats.total() > 0
    {
        lines.push(format!("{}Cache: {}", indent(1), stats));
    }
    lines
}

/// Format a failed pipeline run. The first line carries the error kind.
pub fn format_pipeline_error(kind: AssetKind, err: &PipelineError, root: &Path) -> Vec<String> {
    vec![
        format!("\u{2717} [{}] {}", err.kind_label(), kind),
        format!(
            "{}{}: {}",
            indent(1),
            display_path(err.path(), root),
            err.detail()
        ),
    ]
}

pub fn log_pipeline_result(
    kind: AssetKind,
    result: &Result<PipelineReport, PipelineError>,
    root: &Path,
) {
    match result {
        Ok(report) => {
            for line in format_pipeline_report(report, root) {
                tracing::info!("{line}");
            }
        }
        Err(err) => {
            for line in format_pipeline_error(kind, err, root) {
                tracing::error!("{line}");
            }
        }
    }
}

// ============================================================================
// Generator and build
// ============================================================================

pub fn format_generator_result(command: &str, result: &Result<i32, GeneratorError>) -> Vec<String> {
    match result {
        Ok(0) => vec![format!("{command} finished")],
        Ok(code) => vec![format!("{command} exited with {code}")],
        Err(err) => vec![format!("\u{2717} [generator] {err}")],
    }
}

pub fn log_generator_result(command: &str, result: &Result<i32, GeneratorError>) {
    for line in format_generator_result(command, result) {
        match result {
            Ok(0) => tracing::info!("{line}"),
            Ok(_) => tracing::warn!("{line}"),
            Err(_) => tracing::error!("{line}"),
        }
    }
}

/// One-line summary of a full build.
pub fn format_build_summary(outcome: &BuildOutcome) -> Vec<String> {
    let total = outcome.pipelines.len();
    let ok = total - outcome.failed_pipelines();
    let generator = match &outcome.generator {
        Ok(code) => format!("generator exited with {code}"),
        Err(_) => "generator did not run".to_string(),
    };
    vec![format!(
        "Build finished in {}: {ok}/{total} pipelines ok, {generator}",
        format_duration(outcome.elapsed)
    )]
}

pub fn log_build_summary(outcome: &BuildOutcome) {
    let clean = outcome.failed_pipelines() == 0 && outcome.exit_code() == 0;
    for line in format_build_summary(outcome) {
        if clean {
            tracing::info!("{line}");
        } else {
            tracing::warn!("{line}");
        }
    }
}

// ============================================================================
// Long-running services
// ============================================================================

pub fn format_server_banner(addr: SocketAddr, site_dir: &Path, root: &Path) -> Vec<String> {
    vec![format!(
        "Serving {} at http://{addr}/",
        display_path(site_dir, root)
    )]
}

/// Watched groups with their base directory and patterns.
pub fn format_watch_banner(groups: &[AssetGroup], root: &Path) -> Vec<String> {
    let mut lines = vec![format!("Watching {}", root.display())];
    for group in groups {
        let base = display_path(&group.base, root);
        let base = if base.is_empty() { ".".to_string() } else { base };
        lines.push(format!(
            "{}{} ({base}): {}",
            indent(1),
            group.kind,
            group.patterns.join(", ")
        ));
    }
    lines
}

pub fn format_deploy_report(report: &DeployReport) -> Vec<String> {
    vec![
        format!(
            "Deployed {} to {} ({})",
            plural(report.files, "file"),
            report.branch,
            report.url
        ),
        format!("{}Commit: {}", indent(1), report.message),
    ]
}

/// Emit pre-formatted lines at `info`.
pub fn log_lines(lines: Vec<String>) {
    for line in lines {
        tracing::info!("{line}");
    }
}

// ============================================================================
// Tests
// ============================================================================
