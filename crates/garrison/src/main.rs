//! Garrison daemon entry point
//!
//! Loads configuration, builds the sandboxed file tree, the file manager
//! and the server orchestrator, then runs the periodic temp-save sweep
//! until a shutdown signal arrives.

use anyhow::{Context, Result};
use garrison_files::{FileManager, FileNotifier, PathSandbox};
use garrison_server::{ScenarioRefresher, ServerOrchestrator, ServerRegistry, VersionCache};
use garrison_types::ServerId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

mod cli;
mod config;
mod driver;
mod logging;
mod signals;

use cli::CliArgs;
use config::AppConfig;
use driver::CommandDriver;

struct Application {
    config: AppConfig,
    orchestrator: Arc<ServerOrchestrator>,
    versions: Arc<VersionCache>,
    refresher: Arc<ScenarioRefresher>,
}

impl Application {
    async fn new(args: CliArgs) -> Result<Self> {
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // CLI overrides.
        if let Some(data_dir) = args.data_dir {
            config.data.root_dir = data_dir;
        }
        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        config.validate()?;
        logging::setup_logging(&config.logging.level, config.logging.json_format)?;

        info!(
            config = %args.config_path.display(),
            data_root = %config.data.root_dir.display(),
            servers = config.servers.len(),
            "starting garrison",
        );

        let server_ids: Vec<ServerId> = config.servers.iter().map(ServerId::new).collect();

        let sandbox = Arc::new(
            PathSandbox::new(&config.data.root_dir, server_ids.clone())
                .context("initializing data root")?,
        );
        let notifier = Arc::new(FileNotifier::default());
        let files = Arc::new(FileManager::new(sandbox, notifier));
        let registry = Arc::new(ServerRegistry::with_servers(server_ids));

        let command_driver = Arc::new(CommandDriver::new(&config.process.wrapper_command));
        let orchestrator = Arc::new(
            ServerOrchestrator::new(registry, Arc::clone(&files), command_driver.clone())
                .with_action_timeout(Duration::from_secs(config.timing.action_timeout_seconds)),
        );
        orchestrator.hydrate_settings().await;

        let versions = Arc::new(VersionCache::new(
            &config.data.version_cache_dir,
            command_driver,
        ));

        let refresher = Arc::new(
            ScenarioRefresher::new(&config.data.scenario_deploy_script, files)
                .with_refresh_timeout(Duration::from_secs(
                    config.timing.scenario_refresh_timeout_seconds,
                )),
        );

        Ok(Self {
            config,
            orchestrator,
            versions,
            refresher,
        })
    }

    async fn run(self) -> Result<()> {
        let cached = self.versions.get_cached_versions().await;
        info!(versions = ?cached, "cached server archives");

        // Log every status transition for the operator.
        let status_logger = {
            let mut status_rx = self.orchestrator.subscribe_status_changes();
            tokio::spawn(async move {
                while let Ok(change) = status_rx.recv().await {
                    info!(
                        server_id = %change.server_id,
                        old = %change.old_status,
                        new = %change.new_status,
                        "status change",
                    );
                }
            })
        };

        // Periodic temp-save sweep across running servers.
        let sweeper = {
            let orchestrator = Arc::clone(&self.orchestrator);
            let period = Duration::from_secs(self.config.timing.temp_save_sweep_seconds);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;
                    for id in orchestrator.registry().ids() {
                        if orchestrator.get_status(&id).await
                            == Some(garrison_types::ServerStatus::Running)
                        {
                            let result = orchestrator.raise_recent_temp_files(&id).await;
                            if !result.is_ok() {
                                error!(server_id = %id, ?result, "temp-save sweep failed");
                            }
                        }
                    }
                }
            })
        };

        // SIGHUP redeploys the configured scenario branch.
        #[cfg(unix)]
        let refresh_listener = {
            let refresher = Arc::clone(&self.refresher);
            let branch = self.config.data.scenario_branch.clone();
            tokio::spawn(async move {
                let mut sighup = match tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::hangup(),
                ) {
                    Ok(sighup) => sighup,
                    Err(e) => {
                        error!("failed to install SIGHUP handler: {e}");
                        return;
                    }
                };
                while sighup.recv().await.is_some() {
                    info!(branch, "SIGHUP received, refreshing scenarios");
                    refresher.refresh(&branch).await;
                }
            })
        };

        info!("garrison is running, press Ctrl+C to shut down");
        signals::wait_for_shutdown_signal().await?;

        info!("shutdown signal received");
        sweeper.abort();
        status_logger.abort();
        #[cfg(unix)]
        refresh_listener.abort();

        info!("garrison shutdown complete");
        Ok(())
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("application error: {e:?}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("failed to start garrison: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}
