//! Site build orchestration.
//!
//! A build runs the three asset pipelines concurrently, waits for all of them
//! (the barrier), then runs the external generator:
//!
//! ```text
//! styles  ─┐
//! scripts ─┼─ join ─ generator ─ exit code
//! images  ─┘
//! ```
//!
//! A failing pipeline is logged and does not stop the build: the generator
//! still runs against whatever assets are on disk.
//!
//! ## Run locks
//!
//! Every group has one async lock. A pipeline run holds its group's lock for
//! its whole duration, and a build holds the generator lock around the
//! pipelines and the generator. Two runs of the same group therefore never
//! overlap, whether they come from the watcher, the CLI or a deploy.
//!
//! Pipelines and the generator are blocking work and run on tokio's
//! blocking pool. The [`BuildSteps`] trait is the seam that lets tests
//! replace them.

use crate::generator::{self, GeneratorError};
use crate::output;
use crate::pipeline::{self, PipelineError, PipelineReport};
use crate::registry::BuildContext;
use crate::types::{AssetKind, GroupKind};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// The blocking work a build is made of.
pub trait BuildSteps: Send + Sync + 'static {
    fn pipeline(
        &self,
        ctx: &BuildContext,
        kind: AssetKind,
    ) -> Result<PipelineReport, PipelineError>;

    /// Run the generator and return its exit code.
    fn generator(&self, ctx: &BuildContext) -> Result<i32, GeneratorError>;
}

/// The real steps: in-process pipelines and the configured generator.
pub struct SiteSteps;

impl BuildSteps for SiteSteps {
    fn pipeline(
        &self,
        ctx: &BuildContext,
        kind: AssetKind,
    ) -> Result<PipelineReport, PipelineError> {
        pipeline::run(ctx, kind)
    }

    fn generator(&self, ctx: &BuildContext) -> Result<i32, GeneratorError> {
        generator::run(ctx)
    }
}

/// Result of one full build.
#[derive(Debug)]
pub struct BuildOutcome {
    /// Pipeline results: styles, scripts, images.
    pub pipelines: Vec<(AssetKind, Result<PipelineReport, PipelineError>)>,
    pub generator: Result<i32, GeneratorError>,
    pub elapsed: Duration,
}

impl BuildOutcome {
    /// The generator's exit code, or 1 when it could not run.
    pub fn exit_code(&self) -> i32 {
        match &self.generator {
            Ok(code) => *code,
            Err(_) => 1,
        }
    }

    pub fn failed_pipelines(&self) -> usize {
        self.pipelines.iter().filter(|(_, r)| r.is_err()).count()
    }
}

fn lock_slot(kind: GroupKind) -> usize {
    match kind {
        GroupKind::Asset(AssetKind::Styles) => 0,
        GroupKind::Asset(AssetKind::Scripts) => 1,
        GroupKind::Asset(AssetKind::Images) => 2,
        GroupKind::Generator => 3,
    }
}

/// Shared handle that runs pipelines and builds. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    ctx: Arc<BuildContext>,
    steps: Arc<dyn BuildSteps>,
    locks: Arc<[Mutex<()>; 4]>,
}

impl Orchestrator {
    pub fn new(ctx: Arc<BuildContext>) -> Self {
        Self::with_steps(ctx, Arc::new(SiteSteps))
    }

    pub fn with_steps(ctx: Arc<BuildContext>, steps: Arc<dyn BuildSteps>) -> Self {
        Self {
            ctx,
            steps,
            locks: Arc::new(std::array::from_fn(|_| Mutex::new(()))),
        }
    }

    pub fn context(&self) -> &Arc<BuildContext> {
        &self.ctx
    }

    /// Run one pipeline under its group's lock and log the result.
    pub async fn run_pipeline(&self, kind: AssetKind) -> Result<PipelineReport, PipelineError> {
        let _guard = self.locks[lock_slot(kind.into())].lock().await;

        let ctx = Arc::clone(&self.ctx);
        let steps = Arc::clone(&self.steps);
        let result = match tokio::task::spawn_blocking(move || steps.pipeline(&ctx, kind)).await {
            Ok(result) => result,
            Err(e) => Err(PipelineError::Transform {
                path: self.ctx.destination(kind.into()).to_path_buf(),
                message: format!("pipeline task failed: {e}"),
            }),
        };

        output::log_pipeline_result(kind, &result, &self.ctx.root);
        result
    }

    async fn run_generator(&self) -> Result<i32, GeneratorError> {
        let ctx = Arc::clone(&self.ctx);
        let steps = Arc::clone(&self.steps);
        let result = tokio::task::spawn_blocking(move || steps.generator(&ctx))
            .await
            .map_err(|e| GeneratorError::Join(e.to_string()))
            .and_then(|r| r);
        output::log_generator_result(&self.ctx.config.generator.command, &result);
        result
    }

    /// Run all pipelines, wait for them, then run the generator.
    pub async fn build(&self) -> BuildOutcome {
        let started = Instant::now();
        let _guard = self.locks[lock_slot(GroupKind::Generator)].lock().await;

        let (styles, scripts, images) = tokio::join!(
            self.run_pipeline(AssetKind::Styles),
            self.run_pipeline(AssetKind::Scripts),
            self.run_pipeline(AssetKind::Images),
        );
        let generator = self.run_generator().await;

        let outcome = BuildOutcome {
            pipelines: vec![
                (AssetKind::Styles, styles),
                (AssetKind::Scripts, scripts),
                (AssetKind::Images, images),
            ],
            generator,
            elapsed: started.elapsed(),
        };
        output::log_build_summary(&outcome);
        outcome
    }

    /// Run whatever a change to `group` requires: its pipeline, or a full
    /// build for generator sources.
    pub async fn run_group(&self, group: GroupKind) {
        match group {
            GroupKind::Asset(kind) => {
                let _ = self.run_pipeline(kind).await;
            }
            GroupKind::Generator => {
                self.build().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::context;
    use crate::types::BuildMode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Steps that sleep and record when each one finished.
    struct RecordingSteps {
        delays_ms: [u64; 3],
        finished: std::sync::Mutex<Vec<(String, Instant)>>,
        fail_styles: bool,
        exit_code: i32,
    }

    impl RecordingSteps {
        fn new(delays_ms: [u64; 3]) -> Self {
            Self {
                delays_ms,
                finished: std::sync::Mutex::new(Vec::new()),
                fail_styles: false,
                exit_code: 0,
            }
        }
    }

    impl BuildSteps for RecordingSteps {
        fn pipeline(
            &self,
            ctx: &BuildContext,
            kind: AssetKind,
        ) -> Result<PipelineReport, PipelineError> {
            let index = lock_slot(kind.into());
            std::thread::sleep(Duration::from_millis(self.delays_ms[index]));
            self.finished
                .lock()
                .unwrap()
                .push((kind.to_string(), Instant::now()));
            if self.fail_styles && kind == AssetKind::Styles {
                return Err(PipelineError::SourceSyntax {
                    path: "main.scss".into(),
                    message: "expected \"}\"".into(),
                });
            }
            Ok(PipelineReport {
                kind,
                mode: ctx.mode,
                written: Vec::new(),
                cache: None,
                elapsed: Duration::from_millis(self.delays_ms[index]),
            })
        }

        fn generator(&self, _ctx: &BuildContext) -> Result<i32, GeneratorError> {
            self.finished
                .lock()
                .unwrap()
                .push(("generator".into(), Instant::now()));
            Ok(self.exit_code)
        }
    }

    fn orchestrator(root: &std::path::Path, steps: Arc<dyn BuildSteps>) -> Orchestrator {
        Orchestrator::with_steps(Arc::new(context(root, BuildMode::Development)), steps)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn generator_runs_after_every_pipeline() {
        let tmp = TempDir::new().unwrap();
        for round in 0..12u64 {
            let delays = [
                (round * 7) % 25,
                (round * 13 + 5) % 25,
                (round * 3 + 11) % 25,
            ];
            let steps = Arc::new(RecordingSteps::new(delays));
            let orch = orchestrator(tmp.path(), steps.clone());

            let outcome = orch.build().await;
            assert_eq!(outcome.exit_code(), 0);

            let finished = steps.finished.lock().unwrap().clone();
            assert_eq!(finished.len(), 4, "round {round}");
            let (last_name, generator_at) = finished.last().unwrap();
            assert_eq!(last_name, "generator", "round {round}: {finished:?}");
            assert!(
                finished[..3].iter().all(|(_, at)| at <= generator_at),
                "round {round}"
            );
        }
    }

    #[tokio::test]
    async fn pipeline_failure_does_not_stop_the_build() {
        let tmp = TempDir::new().unwrap();
        let mut steps = RecordingSteps::new([0, 0, 0]);
        steps.fail_styles = true;
        steps.exit_code = 2;
        let steps = Arc::new(steps);

        let outcome = orchestrator(tmp.path(), steps.clone()).build().await;
        assert_eq!(outcome.failed_pipelines(), 1);
        assert_eq!(outcome.exit_code(), 2);
        assert_eq!(steps.finished.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn spawn_failure_exits_non_zero() {
        struct NoGenerator;
        impl BuildSteps for NoGenerator {
            fn pipeline(
                &self,
                ctx: &BuildContext,
                kind: AssetKind,
            ) -> Result<PipelineReport, PipelineError> {
                Ok(PipelineReport {
                    kind,
                    mode: ctx.mode,
                    written: Vec::new(),
                    cache: None,
                    elapsed: Duration::ZERO,
                })
            }

            fn generator(&self, ctx: &BuildContext) -> Result<i32, GeneratorError> {
                Err(GeneratorError::Spawn {
                    command: ctx.config.generator.command.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                })
            }
        }

        let tmp = TempDir::new().unwrap();
        let outcome = orchestrator(tmp.path(), Arc::new(NoGenerator)).build().await;
        assert!(matches!(outcome.generator, Err(GeneratorError::Spawn { .. })));
        assert_eq!(outcome.exit_code(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn runs_of_one_group_never_overlap() {
        struct CountingSteps {
            active: AtomicUsize,
            peak: AtomicUsize,
        }
        impl BuildSteps for CountingSteps {
            fn pipeline(
                &self,
                ctx: &BuildContext,
                kind: AssetKind,
            ) -> Result<PipelineReport, PipelineError> {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(10));
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(PipelineReport {
                    kind,
                    mode: ctx.mode,
                    written: Vec::new(),
                    cache: None,
                    elapsed: Duration::from_millis(10),
                })
            }

            fn generator(&self, _ctx: &BuildContext) -> Result<i32, GeneratorError> {
                Ok(0)
            }
        }

        let tmp = TempDir::new().unwrap();
        let steps = Arc::new(CountingSteps {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let orch = orchestrator(tmp.path(), steps.clone());

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let orch = orch.clone();
                tokio::spawn(async move { orch.run_pipeline(AssetKind::Styles).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(steps.peak.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn real_steps_build_assets_before_generator() {
        let tmp = TempDir::new().unwrap();
        crate::test_helpers::write_file(tmp.path(), "_dev/src/sass/main.scss", "a { color: red }");
        crate::test_helpers::write_file(tmp.path(), "_dev/src/js/app.js", "run()");
        let mut config = crate::config::SiteConfig::default();
        // The generator proves the assets exist by copying them into the site.
        config.generator.command = "sh".into();
        config.generator.args = vec!["-c".into(), "mkdir -p _site && cp -r assets _site/".into()];
        let ctx = crate::test_helpers::context_with(tmp.path(), config, BuildMode::Development);

        let outcome = Orchestrator::new(Arc::new(ctx)).build().await;
        assert_eq!(outcome.exit_code(), 0);
        assert!(tmp.path().join("_site/assets/css/styles.css").exists());
        assert!(tmp.path().join("_site/assets/js/app.js").exists());
    }
}
