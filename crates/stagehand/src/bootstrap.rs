//! Facade tying the storage layout, staging, and the service lifecycle
//! together for one application namespace.

use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::info;

use stagehand_config::{Config, LayoutError, StorageLayout};

use crate::bundle::{Bundle, DirBundle};
use crate::fs::{Filesystem, StdFilesystem};
use crate::health::{LifecycleReporter, StructuredLifecycleReporter};
use crate::host::ProcessServiceHost;
use crate::lifecycle::{
    ConnectionHandle, ConnectionState, Coordinator, CoordinatorDeps, EngineDelegate,
    LifecycleError, NoopDelegate, ServiceDescriptor, ServiceHost,
};
use crate::registry::ConfigRegistry;
use crate::staging::{ResourceStager, StageError, StageOutcome};

const BOOTSTRAP_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::bootstrap");

/// Name of the service the facade asks the host to bind.
pub const ENGINE_SERVICE: &str = "couchbase-engine";

/// Errors surfaced by the [`Bootstrap`] facade.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The namespace or a file name cannot form a valid storage path.
    #[error(transparent)]
    Layout(#[from] LayoutError),
    /// Copying a bundled resource into place failed.
    #[error("failed to stage '{file}': {source}")]
    Stage {
        /// File that was being staged.
        file: String,
        /// Underlying staging error.
        #[source]
        source: StageError,
    },
    /// The service lifecycle rejected the request.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// External collaborators a [`Bootstrap`] is built over.
pub struct BootstrapServices {
    /// Read-only resource bundle.
    pub bundle: Arc<dyn Bundle>,
    /// Writable filesystem.
    pub filesystem: Arc<dyn Filesystem>,
    /// Service binding mechanism.
    pub host: Arc<dyn ServiceHost>,
    /// Delegate forwarded to the engine on start.
    pub delegate: Arc<dyn EngineDelegate>,
    /// Lifecycle observer.
    pub reporter: Arc<dyn LifecycleReporter>,
}

impl BootstrapServices {
    /// Production collaborators for `config`: a directory bundle, the real
    /// filesystem, and a child-process host running the engine command.
    #[must_use]
    pub fn for_config(config: &Config) -> Self {
        Self {
            bundle: Arc::new(DirBundle::new(config.bundle_dir.clone())),
            filesystem: Arc::new(StdFilesystem),
            host: Arc::new(ProcessServiceHost::new(config.engine_command.clone())),
            delegate: Arc::new(NoopDelegate),
            reporter: Arc::new(StructuredLifecycleReporter::new()),
        }
    }

    /// Replaces the delegate forwarded to the engine.
    #[must_use]
    pub fn with_delegate(mut self, delegate: Arc<dyn EngineDelegate>) -> Self {
        self.delegate = delegate;
        self
    }
}

/// One application's engine bootstrap context.
///
/// Owns the namespace and release identifier, the config registry, and the
/// lifecycle coordinator. Several contexts may coexist; nothing is global.
pub struct Bootstrap {
    layout: StorageLayout,
    release: Mutex<String>,
    stager: Arc<ResourceStager>,
    registry: Arc<ConfigRegistry>,
    coordinator: Coordinator,
}

impl Bootstrap {
    /// Builds a context for `config` over `services`.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Layout`] for an unusable namespace or vendor
    /// and [`BootstrapError::Lifecycle`] if the lifecycle worker cannot start.
    pub fn new(config: &Config, services: BootstrapServices) -> Result<Self, BootstrapError> {
        let layout = config.storage_layout()?;
        let BootstrapServices {
            bundle,
            filesystem,
            host,
            delegate,
            reporter,
        } = services;
        let stager = Arc::new(ResourceStager::new(bundle, filesystem));
        let registry = Arc::new(ConfigRegistry::new(Arc::clone(&stager)));
        let coordinator = Coordinator::new(CoordinatorDeps {
            descriptor: ServiceDescriptor::new(ENGINE_SERVICE),
            host,
            registry: Arc::clone(&registry),
            delegate,
            reporter,
        })?;
        info!(
            target: BOOTSTRAP_TARGET,
            namespace = layout.namespace(),
            data_path = %layout.data_path(),
            external_path = %layout.external_path(),
            "bootstrap context ready"
        );
        Ok(Self {
            layout,
            release: Mutex::new(config.release().to_owned()),
            stager,
            registry,
            coordinator,
        })
    }

    /// Application namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.layout.namespace()
    }

    /// Internal storage root, `<internal-root>/<namespace>`.
    #[must_use]
    pub fn data_path(&self) -> &Utf8Path {
        self.layout.data_path()
    }

    /// External storage root, `<external-root>/<vendor>/data/<namespace>`.
    #[must_use]
    pub fn external_path(&self) -> &Utf8Path {
        self.layout.external_path()
    }

    /// Release identifier used by the most recent or next start.
    #[must_use]
    pub fn release(&self) -> String {
        self.release
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    /// Stages bundled database `file` under `<external>/db/`.
    ///
    /// Databases are not handed to the engine as configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] for an invalid file name or a failed stage.
    pub fn install_database(&self, file: &str) -> Result<StageOutcome, BootstrapError> {
        let destination = self.layout.database_destination(file)?;
        self.stager
            .stage(file, &destination)
            .map_err(|source| stage_error(file, source))
    }

    /// Stages bundled ini `file` under `<internal>/user_data/` and registers
    /// it as engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError`] for an invalid file name or a failed stage;
    /// the file is not registered on failure.
    pub fn copy_ini_file(&self, file: &str) -> Result<StageOutcome, BootstrapError> {
        let destination = self.layout.ini_destination(file)?;
        self.registry
            .register(&destination)
            .map_err(|source| stage_error(file, source))
    }

    /// Registered configuration files, in registration order.
    #[must_use]
    pub fn custom_ini_files(&self) -> Vec<Utf8PathBuf> {
        self.registry.list()
    }

    /// Starts the engine with the current release identifier.
    ///
    /// # Errors
    ///
    /// Returns [`BootstrapError::Lifecycle`] when a session is already active
    /// or the host refuses the bind.
    pub fn start(&self) -> Result<ConnectionHandle, BootstrapError> {
        let release = self.release();
        Ok(self.coordinator.start(&release)?)
    }

    /// Sets the release identifier, then starts the engine with it.
    ///
    /// # Errors
    ///
    /// As for [`Bootstrap::start`]. The release is updated even when the
    /// start is rejected.
    pub fn start_release(&self, release: &str) -> Result<ConnectionHandle, BootstrapError> {
        release.clone_into(
            &mut self
                .release
                .lock()
                .unwrap_or_else(|poison| poison.into_inner()),
        );
        Ok(self.coordinator.start(release)?)
    }

    /// Stops the engine session without waiting for the host.
    pub fn stop(&self) {
        self.coordinator.stop();
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.coordinator.state()
    }

    /// Lifecycle coordinator behind this context.
    #[must_use]
    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }
}

impl std::fmt::Debug for Bootstrap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bootstrap")
            .field("layout", &self.layout)
            .field("release", &self.release())
            .field("coordinator", &self.coordinator)
            .finish_non_exhaustive()
    }
}

fn stage_error(file: &str, source: StageError) -> BootstrapError {
    BootstrapError::Stage {
        file: file.to_owned(),
        source,
    }
}
