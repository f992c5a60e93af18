use clap::{Parser, ValueEnum};
use siteforge::config::{self, CONFIG_FILENAME};
use siteforge::orchestrator::Orchestrator;
use siteforge::registry::BuildContext;
use siteforge::types::{AssetKind, BuildMode};
use siteforge::{deploy, output, server, watch};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Task {
    /// Compile SCSS into the prefixed, minified stylesheet
    Css,
    /// Copy scripts into the assets directory
    Js,
    /// Copy images (production: bound width and re-encode)
    Img,
    /// Run every asset pipeline, then the site generator
    #[value(alias = "jekyll")]
    Build,
    /// Serve the generated site
    Server,
    /// Rebuild whatever changes
    Watch,
    /// Build, then force-push the generated site to the hosting branch
    Deploy,
    /// Print a stock siteforge.toml with all options documented
    GenConfig,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Env {
    #[value(alias = "development")]
    Dev,
    #[value(alias = "production")]
    Prod,
}

impl From<Env> for BuildMode {
    fn from(env: Env) -> Self {
        match env {
            Env::Dev => BuildMode::Development,
            Env::Prod => BuildMode::Production,
        }
    }
}

#[derive(Parser)]
#[command(name = "siteforge")]
#[command(version)]
#[command(about = "Asset pipeline, dev server and deployer for static sites")]
#[command(long_about = "\
Asset pipeline, dev server and deployer for static sites

Project layout (defaults):

  project/
  ├── siteforge.toml        # Optional config, see `siteforge gen-config`
  ├── _dev/src/
  │   ├── sass/             # *.scss → assets/css/styles.css (_partials skipped)
  │   ├── js/               # *.js   → assets/js/
  │   └── img/              # images → assets/img/ (resized in production)
  ├── assets/               # Pipeline output
  ├── _site/                # Generator output: served and deployed
  └── index.html, _posts/, _layouts/, _includes/, _data/

Without a task: build, then serve and watch.")]
struct Cli {
    /// Task to run; omit to build, serve and watch
    #[arg(value_enum)]
    task: Option<Task>,

    /// Build mode: dev copies images verbatim, prod resizes and re-encodes them
    #[arg(long, value_enum, default_value = "dev")]
    env: Env,

    /// Project root
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Config file (default: <root>/siteforge.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Named config profile to apply on top of the config file
    #[arg(long)]
    profile: Option<String>,

    /// Ignore the image cache and re-encode every image
    #[arg(long)]
    no_cache: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "siteforge=debug"
    } else {
        "siteforge=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// What a task does once the runtime is up. `gen-config` has no entry: it
/// prints and returns before any config is loaded.
#[derive(Copy, Clone, Debug)]
enum Job {
    Pipeline(AssetKind),
    Build,
    Server,
    Watch,
    Deploy,
    Develop,
}

impl Job {
    fn for_task(task: Option<Task>) -> Option<Self> {
        Some(match task {
            Some(Task::Css) => Job::Pipeline(AssetKind::Styles),
            Some(Task::Js) => Job::Pipeline(AssetKind::Scripts),
            Some(Task::Img) => Job::Pipeline(AssetKind::Images),
            Some(Task::Build) => Job::Build,
            Some(Task::Server) => Job::Server,
            Some(Task::Watch) => Job::Watch,
            Some(Task::Deploy) => Job::Deploy,
            Some(Task::GenConfig) => return None,
            None => Job::Develop,
        })
    }
}

/// Run the selected task and return the process exit code.
fn run(cli: Cli) -> Result<i32, Box<dyn std::error::Error>> {
    let Some(job) = Job::for_task(cli.task) else {
        print!("{}", config::stock_config_toml());
        return Ok(0);
    };

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.root.join(CONFIG_FILENAME));
    let site_config = config::load_config(&config_path, cli.profile.as_deref())?;
    init_thread_pool(&site_config.processing);

    let mode = BuildMode::from(cli.env);
    let ctx = BuildContext::new(&cli.root, site_config, mode, !cli.no_cache)?;
    tracing::debug!(root = %ctx.root.display(), %mode, "context ready");
    let orchestrator = Orchestrator::new(Arc::new(ctx));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run_job(orchestrator, job))
}

async fn run_job(orchestrator: Orchestrator, job: Job) -> Result<i32, Box<dyn std::error::Error>> {
    match job {
        Job::Pipeline(kind) => pipeline_task(&orchestrator, kind).await,
        Job::Build => Ok(orchestrator.build().await.exit_code()),
        Job::Server => {
            serve(&orchestrator).await?;
            Ok(0)
        }
        Job::Watch => {
            watch::watch(orchestrator).await?;
            Ok(0)
        }
        Job::Deploy => {
            let report = deploy::deploy(&orchestrator).await?;
            output::log_lines(output::format_deploy_report(&report));
            Ok(0)
        }
        Job::Develop => {
            orchestrator.build().await;
            // A bind failure ends the process instead of leaving a lone watcher.
            tokio::try_join!(
                async { serve(&orchestrator).await.map_err(Box::<dyn std::error::Error>::from) },
                async {
                    watch::watch(orchestrator.clone())
                        .await
                        .map_err(Box::<dyn std::error::Error>::from)
                },
            )?;
            Ok(0)
        }
    }
}

/// Pipeline failures are logged by the orchestrator and do not change the
/// exit code.
async fn pipeline_task(
    orchestrator: &Orchestrator,
    kind: AssetKind,
) -> Result<i32, Box<dyn std::error::Error>> {
    let _ = orchestrator.run_pipeline(kind).await;
    Ok(0)
}

async fn serve(orchestrator: &Orchestrator) -> Result<(), server::ServeError> {
    let ctx = orchestrator.context();
    let listener = server::bind(&ctx.config.server.host, ctx.config.server.port).await?;
    let addr = server::local_addr(&listener)?;
    let site_dir = ctx.site_dir();
    output::log_lines(output::format_server_banner(addr, &site_dir, &ctx.root));
    server::serve(listener, &site_dir).await
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: the user can constrain down,
/// not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
