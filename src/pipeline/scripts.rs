//! Script pipeline: copy matched scripts verbatim into the scripts output.
//!
//! Directory structure is flattened: `js/vendor/lib.js` lands at
//! `assets/js/lib.js`.

use super::{PipelineError, PipelineReport, flatten_into, write_atomic};
use crate::registry::BuildContext;
use crate::types::AssetKind;
use std::time::Instant;

pub fn run(ctx: &BuildContext) -> Result<PipelineReport, PipelineError> {
    let started = Instant::now();
    let kind = AssetKind::Scripts.into();
    let pairs = flatten_into(ctx.registry.sources(kind), ctx.destination(kind));

    let mut staged = Vec::with_capacity(pairs.len());
    for (source, target) in pairs {
        let bytes = std::fs::read(&source).map_err(|e| PipelineError::io(&source, e))?;
        staged.push((target, bytes));
    }

    let mut written = Vec::with_capacity(staged.len());
    for (target, bytes) in staged {
        write_atomic(&target, &bytes)?;
        tracing::debug!(target = %target.display(), "copied script");
        written.push(target);
    }

    Ok(PipelineReport {
        kind: AssetKind::Scripts,
        mode: ctx.mode,
        written,
        cache: None,
        elapsed: started.elapsed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{context, write_file};
    use crate::types::BuildMode;
    use tempfile::TempDir;

    #[test]
    fn copies_scripts_verbatim_and_flattened() {
        let tmp = TempDir::new().unwrap();
        let body = "const x = 1;\n\n// keep me\nfunction f () { return x }\n";
        write_file(tmp.path(), "_dev/src/js/app.js", body);
        write_file(tmp.path(), "_dev/src/js/vendor/lib.js", "lib()");

        let report = run(&context(tmp.path(), BuildMode::Production)).unwrap();
        assert_eq!(report.written.len(), 2);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("assets/js/app.js")).unwrap(),
            body
        );
        assert!(tmp.path().join("assets/js/lib.js").exists());
    }

    #[test]
    fn ignores_non_script_files() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "_dev/src/js/README.md", "docs");

        let report = run(&context(tmp.path(), BuildMode::Development)).unwrap();
        assert!(report.written.is_empty());
        assert!(!tmp.path().join("assets/js").exists());
    }

    #[test]
    fn later_duplicate_name_wins() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "_dev/src/js/a/app.js", "first");
        write_file(tmp.path(), "_dev/src/js/b/app.js", "second");

        let report = run(&context(tmp.path(), BuildMode::Development)).unwrap();
        assert_eq!(report.written.len(), 1);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("assets/js/app.js")).unwrap(),
            "second"
        );
    }
}
