use std::process::ExitCode;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use ab_core::models::{BumpConfig, RunReport};
use ab_core::services::config_loader;
use ab_core::services::orchestrator::Orchestrator;
use ab_core::services::repository::GitRepository;
use ab_core::services::resolver::ArtifactSource;
use ab_core::OrchestratorError;

const DEBUG_LOG_FILE: &str = ".artifact-bump-debug.log";

const USAGE: &str = "\
Usage: artifact-bump [--debug]

Resolves the latest artifact, writes it into FILE inside REPOSITORY and opens
a pull request. Settings come from the environment (or a .env file):

  TYPE            artifact type (ubuntu)
  FILE            file to update, relative to the repository root
  KEYS            comma separated keys to update
  REPOSITORY      owner/name or clone URL
  BRANCH_NAME     branch name (default: TYPE)
  BRANCH_PREFIX   branch prefix (default: update)
  USERNAME        optional GitHub user
  PASSWORD        optional GitHub token
  CLOUD ZONE VERSION ARCHITECTURE INSTANCE_TYPE RELEASE
                  optional artifact filter attributes
";

#[tokio::main]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }
    let debug = args.iter().any(|a| a == "--debug");

    let dotenv = load_dotenv();
    let _guard = setup_logging(debug);
    if let Some(Err(e)) = dotenv {
        tracing::warn!(error = %e, "ignoring unreadable .env file");
    }

    let config = match config_loader::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("config processing failed: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    match run(&config).await {
        Ok(report) => {
            println!(
                "Opened pull request #{} for {} {} on branch \"{}\": {}",
                report.pull_request.number,
                config.artifact_type,
                report.artifact,
                report.branch,
                report.pull_request.url
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            report_failure(&e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(config: &BumpConfig) -> ab_core::Result<RunReport> {
    tracing::info!(
        artifact_type = %config.artifact_type,
        repository = %config.repository,
        branch = %config.branch(),
        file = %config.file_path,
        "starting artifact bump"
    );
    let resolver = ArtifactSource::for_config(config)?;
    let repository = GitRepository::for_config(config)?;
    let mut orchestrator = Orchestrator::new(resolver, repository);
    orchestrator.run(config).await
}

fn report_failure(err: &OrchestratorError) {
    let stage = err
        .stage()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "setup".into());
    match err.cause() {
        OrchestratorError::Preparation(failures) => {
            tracing::error!(stage = %stage, "{} preparation task(s) failed", failures.len());
            for failure in failures {
                tracing::error!(stage = %stage, "  {failure}");
            }
        }
        cause => tracing::error!(stage = %stage, "{cause}"),
    }
}

/// `.env` is skipped in production. `None` when skipped or absent.
fn load_dotenv() -> Option<Result<(), dotenvy::Error>> {
    let production = ["APP_ENV", "NODE_ENV"]
        .iter()
        .any(|name| std::env::var(name).is_ok_and(|v| v == "production"));
    if production {
        return None;
    }
    match dotenvy::dotenv() {
        Ok(_) => Some(Ok(())),
        Err(e) if e.not_found() => None,
        Err(e) => Some(Err(e)),
    }
}

/// Log to stderr; with `--debug` also to `.artifact-bump-debug.log` in CWD.
/// Returns the guard that must be held alive for the duration of the program.
fn setup_logging(debug: bool) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    if debug {
        let file_appender = tracing_appender::rolling::never(".", DEBUG_LOG_FILE);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        None
    }
}
