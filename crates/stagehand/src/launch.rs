//! Command-line launch sequence: configure, stage, start, wait, stop.

use std::sync::Arc;

use ortho_config::{OrthoConfig, OrthoError};
use thiserror::Error;
use tracing::{info, warn};

use stagehand_config::Config;

use crate::bootstrap::{Bootstrap, BootstrapError, BootstrapServices};
use crate::lifecycle::{ConnectionState, SessionFault};
use crate::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
use crate::staging::StageOutcome;
use crate::telemetry::{self, TelemetryError};

const LAUNCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::launch");

/// Supplies the launcher's configuration.
pub trait ConfigLoader: Send + Sync {
    /// Loads the layered configuration.
    ///
    /// # Errors
    ///
    /// Returns the loader's error when any layer fails to parse.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loads defaults, config files, `STAGEHAND_*` variables, and CLI flags.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Returns a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader(Config);

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self(config)
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.0.clone())
    }
}

/// Launch sequence failures.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Building the context, staging, or starting failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// The shutdown listener failed.
    #[error("failed to wait for shutdown: {source}")]
    Shutdown {
        /// Underlying listener error.
        #[source]
        source: ShutdownError,
    },
}

/// What a completed launch did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSummary {
    /// Release the engine was started with.
    pub release: String,
    /// Databases copied during this launch.
    pub databases_copied: usize,
    /// Ini files copied during this launch.
    pub ini_files_copied: usize,
    /// Lifecycle state when shutdown was requested.
    pub state_at_shutdown: ConnectionState,
}

/// Runs the launcher with production collaborators.
///
/// # Errors
///
/// Returns [`LaunchError`] when any launch step fails.
pub fn run() -> Result<LaunchSummary, LaunchError> {
    let config = load(&SystemConfigLoader)?;
    telemetry::initialise(&config).map_err(|source| LaunchError::Telemetry { source })?;
    let services = BootstrapServices::for_config(&config);
    run_with(&config, services, &SystemShutdownSignal)
}

/// Loads configuration through `loader`.
///
/// # Errors
///
/// Returns [`LaunchError::Configuration`] when loading fails.
pub fn load(loader: &dyn ConfigLoader) -> Result<Config, LaunchError> {
    loader
        .load()
        .map_err(|source| LaunchError::Configuration { source })
}

/// Stages configured resources, starts the engine, and stops it once
/// `shutdown` fires.
///
/// # Errors
///
/// Returns [`LaunchError`] when staging, starting, or waiting fails. The
/// session is stopped before a waiting failure is returned.
pub fn run_with(
    config: &Config,
    services: BootstrapServices,
    shutdown: &dyn ShutdownSignal,
) -> Result<LaunchSummary, LaunchError> {
    let bootstrap = Bootstrap::new(config, services)?;

    let mut databases_copied = 0;
    for database in &config.databases {
        if matches!(bootstrap.install_database(database)?, StageOutcome::Copied { .. }) {
            databases_copied += 1;
        }
    }
    let mut ini_files_copied = 0;
    for ini in &config.ini_files {
        if matches!(bootstrap.copy_ini_file(ini)?, StageOutcome::Copied { .. }) {
            ini_files_copied += 1;
        }
    }

    let handle = bootstrap.start()?;
    info!(
        target: LAUNCH_TARGET,
        release = %bootstrap.release(),
        generation = handle.generation(),
        config_files = bootstrap.custom_ini_files().len(),
        "engine start requested"
    );

    let waited = shutdown.wait();
    let state_at_shutdown = handle.state();
    handle.stop();
    if let Some(SessionFault::Engine(error)) = handle.last_error() {
        warn!(target: LAUNCH_TARGET, error = %error, "engine reported a start failure");
    }
    waited.map_err(|source| LaunchError::Shutdown { source })?;

    Ok(LaunchSummary {
        release: bootstrap.release(),
        databases_copied,
        ini_files_copied,
        state_at_shutdown,
    })
}
