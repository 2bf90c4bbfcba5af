use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use offload_config::{ConfigError, OffloadConfig};
use offload_core::{SourceAdapter, TransferExecutor};
use offload_engine::{EngineError, Orchestrator};
use offload_qbit::QbitClient;
use offload_rclone::RcloneExecutor;
use offload_state::StateStore;
use offload_telemetry::{LogFormat, Metrics};
use tracing::{debug, error, info, warn};

use crate::cli::Cli;
use crate::engine_config::{engine_config, logging_config, qbit_config, rclone_config};
use crate::error::{AppError, AppResult};

/// Entry point for the `offload` binary.
///
/// # Errors
///
/// Returns an error if configuration, startup, or shutdown fails.
pub async fn run_app() -> AppResult<()> {
    run_with(Cli::parse()).await
}

/// Dispatch on the parsed command line.
///
/// # Errors
///
/// Returns an error if the selected mode fails.
pub async fn run_with(cli: Cli) -> AppResult<()> {
    if cli.setup {
        let config = setup(&cli.config)?;
        println!(
            "wrote default configuration to {} (remote {}:{})",
            cli.config.display(),
            config.rclone.remote_name,
            config.rclone.remote_path
        );
        return Ok(());
    }
    if cli.validate {
        return match validate_file(&cli.config) {
            Ok(()) => {
                println!("{} is valid", cli.config.display());
                Ok(())
            }
            Err(err) => {
                eprintln!("{} is invalid", cli.config.display());
                if let AppError::Config { source, .. } = &err {
                    for violation in source.violations() {
                        eprintln!("  {violation}");
                    }
                }
                Err(err)
            }
        };
    }
    serve(&cli).await
}

pub(crate) fn setup(path: &Path) -> AppResult<OffloadConfig> {
    offload_config::write_default(path).map_err(|err| AppError::config("config.setup", err))
}

pub(crate) fn validate_file(path: &Path) -> AppResult<()> {
    let config = offload_config::read_existing(path)
        .map_err(|err| AppError::config("config.read", err))?;
    offload_config::validate(&config).map_err(|err| AppError::config("config.validate", err))
}

async fn serve(cli: &Cli) -> AppResult<()> {
    // Logging comes up before `load` so that repairs of a broken file are logged.
    let peeked = offload_config::read_existing(&cli.config).unwrap_or_default();
    let build_sha = option_env!("OFFLOAD_BUILD_SHA").unwrap_or("dev");
    let _logging = offload_telemetry::init_logging(&logging_config(
        &peeked,
        cli.log_level.map(|level| level.as_str()),
        cli.log_format.map(LogFormat::from),
        build_sha,
    ))
    .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    info!(config = %cli.config.display(), "offload starting");

    let config = offload_config::load(&cli.config)
        .map_err(|err| AppError::config("config.load", err))?;
    if let Err(err) = offload_config::validate(&config) {
        log_violations(&err);
        return Err(AppError::config("config.validate", err));
    }

    let store = Arc::new(
        StateStore::open(&config.state_dir).map_err(|err| AppError::state("state.open", err))?,
    );
    let metrics = Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
    let source: Arc<dyn SourceAdapter> = Arc::new(
        QbitClient::new(&qbit_config(&config))
            .map_err(|err| AppError::source("qbit.client", err))?,
    );
    let executor: Arc<dyn TransferExecutor> = Arc::new(RcloneExecutor::new(rclone_config(&config)));

    let orchestrator = Orchestrator::new(
        engine_config(&config),
        source,
        executor,
        store,
        metrics,
    );

    match orchestrator.start().await {
        Ok(()) => {}
        Err(EngineError::HealthCheck { failures }) => {
            for failure in &failures {
                error!(component = failure.component, detail = %failure.detail, "health check failed");
            }
            error!("fix the failing checks or set continue_on_errors to start anyway");
            return Err(AppError::engine(
                "engine.start",
                EngineError::HealthCheck { failures },
            ));
        }
        Err(err) => return Err(AppError::engine("engine.start", err)),
    }
    info!("offload running; press Ctrl-C to stop");

    let signal = tokio::signal::ctrl_c().await;
    if let Err(err) = &signal {
        warn!(error = %err, "failed to wait for Ctrl-C; shutting down");
    } else {
        info!("shutdown requested");
    }

    let stopped = orchestrator.stop().await;
    let snapshot = orchestrator.metrics().snapshot();
    info!(
        completed = snapshot.tasks_completed,
        failed = snapshot.tasks_failed,
        abandoned = snapshot.tasks_abandoned,
        "offload stopped"
    );
    match orchestrator.metrics().render() {
        Ok(exposition) => debug!(metrics = %exposition, "final metrics"),
        Err(err) => warn!(error = %err, "failed to render final metrics"),
    }
    stopped.map_err(|err| AppError::engine("engine.stop", err))?;
    signal.map_err(|source| AppError::Signal { source })
}

fn log_violations(err: &ConfigError) {
    for violation in err.violations() {
        error!(%violation, "invalid configuration");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::ffi::OsStr;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn setup_writes_a_valid_default() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.json");

        let written = setup(&path)?;
        assert!(path.is_file());
        assert_eq!(written, OffloadConfig::default());
        validate_file(&path)?;
        Ok(())
    }

    #[test]
    fn validate_reports_each_violation() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"qbittorrent": {"port": 0}, "worker_threads": 0}"#)?;

        let err = validate_file(&path).expect_err("zero port and workers are invalid");
        match err {
            AppError::Config { operation, source } => {
                assert_eq!(operation, "config.validate");
                assert!(source.violations().len() >= 2);
            }
            other => panic!("unexpected error {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn validate_does_not_repair_missing_files() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("absent.json");

        let err = validate_file(&path).expect_err("missing file is reported");
        assert!(matches!(err, AppError::Config { operation: "config.read", .. }));
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn setup_mode_exits_without_serving() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested.json");
        let cli = Cli::try_parse_from([
            OsStr::new("offload"),
            OsStr::new("--setup"),
            OsStr::new("--config"),
            path.as_os_str(),
        ])?;

        run_with(cli).await?;
        assert!(path.is_file());
        Ok(())
    }
}
