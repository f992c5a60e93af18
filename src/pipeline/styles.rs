//! SCSS → one prefixed, minified stylesheet.
//!
//! ```text
//! sass/main.scss ─ grass ─ parse ─┐
//! sass/print.scss ─ grass ─ parse ─┴─ merge ─ minify ─ print ─ assets/css/styles.css
//! sass/_vars.scss   (partial: importable, not an entry point)
//! ```
//!
//! Entry points are compiled separately with `grass` and parsed separately
//! by `lightningcss`, then merged in match order into one stylesheet.
//! `lightningcss` resolves `@custom-media` rules, adds vendor prefixes for
//! the configured browsers and prints the minified result.
//!
//! With `fingerprint = true` the output is named `<basename>-<hash>.css`
//! (first 8 hex digits of the SHA-256 of the output), its URL is written to
//! `styles.asset_map` for templates, and older fingerprinted siblings are
//! removed after the new file is written.

use super::{PipelineError, PipelineReport, write_atomic};
use crate::cache::hash_bytes;
use crate::config::StylesConfig;
use crate::registry::BuildContext;
use crate::types::AssetKind;
use lightningcss::printer::PrinterOptions;
use lightningcss::rules::{CssRule, CssRuleList};
use lightningcss::stylesheet::{MinifyOptions, ParserFlags, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Resolve a browserslist query list into `lightningcss` targets.
///
/// An empty list means no prefixing. Errors carry the browserslist message.
pub fn browser_targets(queries: &[String]) -> Result<Targets, String> {
    if queries.is_empty() {
        return Ok(Targets::default());
    }
    let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
        .map_err(|e| e.to_string())?;
    Ok(Targets {
        browsers,
        ..Targets::default()
    })
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

fn compile_scss(path: &Path, load_path: &Path) -> Result<String, PipelineError> {
    let options = grass::Options::default().load_path(load_path);
    grass::from_path(path, &options).map_err(|e| PipelineError::SourceSyntax {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Prefix and minify compiled CSS. `origin` names the input in errors.
pub fn finish_css(css: &str, origin: &Path, config: &StylesConfig) -> Result<String, PipelineError> {
    finish_entries(&[(origin.to_path_buf(), css.to_string())], config)
}

/// Prefix and minify several compiled entry points as one stylesheet.
///
/// Each entry is parsed on its own, so errors name the entry's path and
/// line. The rules are then merged in entry order with every `@import`
/// hoisted to the front, which keeps a later entry's plain CSS imports
/// valid. Custom media defined in one entry apply to all of them.
pub fn finish_entries(
    entries: &[(PathBuf, String)],
    config: &StylesConfig,
) -> Result<String, PipelineError> {
    let first = entries
        .first()
        .map(|(path, _)| path.clone())
        .unwrap_or_default();
    let targets = browser_targets(&config.browsers).map_err(|message| PipelineError::Transform {
        path: first.clone(),
        message,
    })?;

    let flags = if config.custom_media {
        ParserFlags::CUSTOM_MEDIA
    } else {
        ParserFlags::empty()
    };

    let mut imports = Vec::new();
    let mut rules = Vec::new();
    for (index, (path, css)) in entries.iter().enumerate() {
        let options = ParserOptions {
            filename: path.display().to_string(),
            source_index: index as u32,
            flags: flags.clone(),
            ..ParserOptions::default()
        };
        let sheet = StyleSheet::parse(css, options).map_err(|e| PipelineError::SourceSyntax {
            path: path.clone(),
            message: e.to_string(),
        })?;
        for rule in sheet.rules.0 {
            match rule {
                CssRule::Import(_) => imports.push(rule),
                other => rules.push(other),
            }
        }
    }
    imports.append(&mut rules);

    let sources = entries
        .iter()
        .map(|(path, _)| path.display().to_string())
        .collect();
    let mut sheet = StyleSheet::new(
        sources,
        CssRuleList(imports),
        ParserOptions {
            filename: first.display().to_string(),
            flags,
            ..ParserOptions::default()
        },
    );

    // Errors after parsing carry the file name of the entry they came from.
    let failing_entry = |filename: Option<&str>| {
        filename
            .and_then(|name| {
                entries
                    .iter()
                    .find(|(path, _)| path.display().to_string() == name)
            })
            .map(|(path, _)| path.clone())
            .unwrap_or_else(|| first.clone())
    };

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| PipelineError::Transform {
            path: failing_entry(e.loc.as_ref().map(|l| l.filename.as_str())),
            message: e.to_string(),
        })?;

    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| PipelineError::Transform {
            path: failing_entry(e.loc.as_ref().map(|l| l.filename.as_str())),
            message: e.to_string(),
        })?;

    Ok(printed.code)
}

/// File name of the stylesheet for the given output bytes.
pub fn output_name(config: &StylesConfig, css: &str) -> String {
    if config.fingerprint {
        format!("{}-{}.css", config.basename, &hash_bytes(css.as_bytes())[..8])
    } else {
        format!("{}.css", config.basename)
    }
}

fn is_fingerprinted_sibling(name: &str, basename: &str) -> bool {
    name.strip_prefix(basename)
        .and_then(|rest| rest.strip_prefix('-'))
        .and_then(|rest| rest.strip_suffix(".css"))
        .is_some_and(|hash| hash.len() == 8 && hash.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Remove fingerprinted stylesheets other than `keep`.
fn remove_stale(destination: &Path, basename: &str, keep: &Path) {
    let Ok(entries) = std::fs::read_dir(destination) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if path != keep && is_fingerprinted_sibling(name, basename) {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "removed stale stylesheet"),
                Err(e) => tracing::warn!(path = %path.display(), "could not remove stale stylesheet: {e}"),
            }
        }
    }
}

#[derive(Serialize)]
struct AssetMap {
    stylesheet: String,
}

/// JSON naming the stylesheet by its site URL (`/assets/css/<name>`).
fn asset_map_json(root: &Path, stylesheet: &Path) -> Result<Vec<u8>, PipelineError> {
    let relative = stylesheet.strip_prefix(root).unwrap_or(stylesheet);
    let url = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .fold(String::new(), |url, part| format!("{url}/{part}"));
    serde_json::to_vec_pretty(&AssetMap { stylesheet: url }).map_err(|e| PipelineError::Transform {
        path: stylesheet.to_path_buf(),
        message: e.to_string(),
    })
}

pub fn run(ctx: &BuildContext) -> Result<PipelineReport, PipelineError> {
    let started = Instant::now();
    let config = &ctx.config.styles;
    let group = ctx.registry.group(AssetKind::Styles.into());

    let entries: Vec<PathBuf> = ctx
        .registry
        .sources(AssetKind::Styles.into())
        .into_iter()
        .filter(|p| !is_partial(p))
        .collect();

    let mut written = Vec::new();
    if !entries.is_empty() {
        let mut compiled = Vec::with_capacity(entries.len());
        for entry in entries {
            tracing::debug!(source = %entry.display(), "compiling");
            let css = compile_scss(&entry, &group.base)?;
            compiled.push((entry, css));
        }
        let css = finish_entries(&compiled, config)?;

        let target = group.destination.join(output_name(config, &css));
        write_atomic(&target, css.as_bytes())?;
        written.push(target.clone());
        if config.fingerprint {
            let map = ctx.root.join(&config.asset_map);
            write_atomic(&map, &asset_map_json(&ctx.root, &target)?)?;
            written.push(map);
            remove_stale(&group.destination, &config.basename, &target);
        }
    }

    Ok(PipelineReport {
        kind: AssetKind::Styles,
        mode: ctx.mode,
        written,
        cache: None,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::test_helpers::{context, context_with, write_file};
    use crate::types::BuildMode;
    use tempfile::TempDir;

    fn css_path(root: &Path) -> PathBuf {
        root.join("assets/css/styles.css")
    }

    #[test]
    fn minifies_simple_rule() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "_dev/src/sass/main.scss", "body {\n  color: red;\n}\n");

        let report = run(&context(tmp.path(), BuildMode::Development)).unwrap();
        assert_eq!(report.written.len(), 1);

        let css = std::fs::read_to_string(css_path(tmp.path())).unwrap();
        assert_eq!(css.trim(), "body{color:red}");
    }

    #[test]
    fn compiles_scss_features_and_partials() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "_dev/src/sass/_vars.scss", "$accent: #ff0000;");
        write_file(
            tmp.path(),
            "_dev/src/sass/main.scss",
            "@import 'vars';\nnav { a { color: $accent; } }",
        );

        run(&context(tmp.path(), BuildMode::Development)).unwrap();
        let css = std::fs::read_to_string(css_path(tmp.path())).unwrap();
        assert!(css.contains("nav a{color:red}"), "got {css}");
        assert!(!css.contains('$'));
    }

    #[test]
    fn concatenates_entries_in_match_order() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "_dev/src/sass/b.scss", ".b { margin: 0 }");
        write_file(tmp.path(), "_dev/src/sass/a.scss", ".a { padding: 0 }");

        run(&context(tmp.path(), BuildMode::Development)).unwrap();
        let css = std::fs::read_to_string(css_path(tmp.path())).unwrap();
        let a = css.find(".a").unwrap();
        let b = css.find(".b").unwrap();
        assert!(a < b);
    }

    #[test]
    fn resolves_custom_media() {
        let css = finish_css(
            "@custom-media --small (max-width: 30em);\n@media (--small) { .x { color: blue; } }",
            Path::new("main.css"),
            &StylesConfig::default(),
        )
        .unwrap();
        assert!(!css.contains("--small"), "got {css}");
        assert!(css.contains("30em"));
    }

    #[test]
    fn later_entry_may_start_with_plain_import() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "_dev/src/sass/a.scss", "a { color: red; }");
        write_file(
            tmp.path(),
            "_dev/src/sass/b.scss",
            "@import url(\"https://example.com/fonts.css\");\nb { color: blue; }",
        );

        run(&context(tmp.path(), BuildMode::Development)).unwrap();
        let css = std::fs::read_to_string(css_path(tmp.path())).unwrap();
        assert!(css.starts_with("@import"), "got {css}");
        assert!(css.find("a{").unwrap() < css.find("b{").unwrap());
    }

    #[test]
    fn syntax_error_names_the_failing_entry() {
        let entries = vec![
            (PathBuf::from("sass/a.scss"), "a{color:red}".to_string()),
            (PathBuf::from("sass/b.scss"), ".b { color: red; } }}".to_string()),
        ];
        let err = finish_entries(&entries, &StylesConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::SourceSyntax { .. }));
        assert_eq!(err.path(), Path::new("sass/b.scss"));
    }

    #[test]
    fn custom_media_applies_across_entries() {
        let entries = vec![
            (
                PathBuf::from("sass/a.scss"),
                "@custom-media --small (max-width: 30em);".to_string(),
            ),
            (
                PathBuf::from("sass/b.scss"),
                "@media (--small) { .x { color: blue; } }".to_string(),
            ),
        ];
        let css = finish_entries(&entries, &StylesConfig::default()).unwrap();
        assert!(!css.contains("--small"), "got {css}");
        assert!(css.contains("30em"));
    }

    #[test]
    fn css_syntax_error_is_reported() {
        let err = finish_css(".a { color: red; } }}", Path::new("main.css"), &StylesConfig::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::SourceSyntax { .. }));
    }

    #[test]
    fn adds_vendor_prefixes_for_old_browsers() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "_dev/src/sass/main.scss", ".box { user-select: none; }");
        let mut config = SiteConfig::default();
        config.styles.browsers = vec!["safari 8".into()];

        run(&context_with(tmp.path(), config, BuildMode::Development)).unwrap();
        let css = std::fs::read_to_string(css_path(tmp.path())).unwrap();
        assert!(css.contains("-webkit-user-select:none"), "got {css}");
    }

    #[test]
    fn output_is_deterministic() {
        let tmp = TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "_dev/src/sass/main.scss",
            ".a { display: flex; transition: opacity .2s; }",
        );
        let ctx = context(tmp.path(), BuildMode::Development);

        run(&ctx).unwrap();
        let first = std::fs::read(css_path(tmp.path())).unwrap();
        run(&ctx).unwrap();
        let second = std::fs::read(css_path(tmp.path())).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn syntax_error_leaves_previous_output() {
        let tmp = TempDir::new().unwrap();
        let source = write_file(tmp.path(), "_dev/src/sass/main.scss", "body { color: red; }");
        let ctx = context(tmp.path(), BuildMode::Development);
        run(&ctx).unwrap();
        let before = std::fs::read(css_path(tmp.path())).unwrap();

        std::fs::write(&source, "body { color: red;").unwrap();
        let err = run(&ctx).unwrap_err();
        assert!(matches!(err, PipelineError::SourceSyntax { .. }));
        assert_eq!(std::fs::read(css_path(tmp.path())).unwrap(), before);
    }

    #[test]
    fn syntax_error_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "_dev/src/sass/main.scss", ".a { color: red;");

        assert!(run(&context(tmp.path(), BuildMode::Development)).is_err());
        assert!(!tmp.path().join("assets/css").exists());
    }

    #[test]
    fn no_sources_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "_dev/src/sass/_only_partial.scss", "$x: 1;");

        let report = run(&context(tmp.path(), BuildMode::Development)).unwrap();
        assert!(report.written.is_empty());
        assert!(!tmp.path().join("assets/css").exists());
    }

    #[test]
    fn fingerprinted_output_replaces_stale_versions() {
        let tmp = TempDir::new().unwrap();
        let source = write_file(tmp.path(), "_dev/src/sass/main.scss", ".a { color: red; }");
        let mut config = SiteConfig::default();
        config.styles.fingerprint = true;
        let ctx = context_with(tmp.path(), config, BuildMode::Development);

        let first = run(&ctx).unwrap().written[0].clone();
        std::fs::write(&source, ".a { color: blue; }").unwrap();
        let second = run(&ctx).unwrap().written[0].clone();

        assert_ne!(first, second);
        assert!(!first.exists());
        assert!(second.exists());
        let name = second.file_name().unwrap().to_str().unwrap();
        assert!(is_fingerprinted_sibling(name, "styles"), "got {name}");

        let map = std::fs::read_to_string(tmp.path().join("_data/assets.json")).unwrap();
        let map: serde_json::Value = serde_json::from_str(&map).unwrap();
        assert_eq!(map["stylesheet"], format!("/assets/css/{name}"));
    }

    #[test]
    fn plain_output_writes_no_asset_map() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "_dev/src/sass/main.scss", ".a { color: red; }");

        let ctx = context(tmp.path(), BuildMode::Development);
        let report = run(&ctx).unwrap();
        assert_eq!(report.written, vec![css_path(&ctx.root)]);
        assert!(!tmp.path().join("_data/assets.json").exists());
    }

    #[test]
    fn fingerprint_sibling_detection() {
        assert!(is_fingerprinted_sibling("styles-0a1b2c3d.css", "styles"));
        assert!(!is_fingerprinted_sibling("styles.css", "styles"));
        assert!(!is_fingerprinted_sibling("styles-print.css", "styles"));
        assert!(!is_fingerprinted_sibling("other-0a1b2c3d.css", "styles"));
    }

    #[test]
    fn browser_targets_rejects_unknown_query() {
        assert!(browser_targets(&["unknownbrowser 99".into()]).is_err());
        assert!(browser_targets(&["last 3 versions".into(), "ie 9".into()]).is_ok());
        assert!(browser_targets(&[]).unwrap().browsers.is_none());
    }
}
