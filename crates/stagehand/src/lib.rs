//! Bootstrap shim that launches a separately packaged database engine as a
//! background service.
//!
//! Before first use the engine's seed databases and ini files are staged out
//! of a read-only bundle into writable storage derived from the application
//! namespace. Staging is idempotent: a destination that already exists is
//! never copied again. Ini files are also registered, in order, as the
//! configuration list handed to the engine when it starts.
//!
//! The [`Coordinator`] owns the connection to the service process. Start and
//! stop never block; host notifications are serialised through a single
//! worker, and a generation counter guarantees that a bind completing after
//! its session was stopped is released without starting the engine. The
//! [`Bootstrap`] facade bundles all of this for one namespace, and
//! [`ProcessServiceHost`] runs the engine as a child process speaking a
//! JSON-line protocol.

mod bootstrap;
mod bundle;
mod fs;
mod health;
mod host;
mod launch;
mod lifecycle;
mod registry;
mod shutdown;
mod staging;
mod telemetry;

pub use bootstrap::{Bootstrap, BootstrapError, BootstrapServices, ENGINE_SERVICE};
pub use bundle::{Bundle, BundleError, DirBundle, MemoryBundle, ResourceStream};
pub use fs::{FileSink, Filesystem, StdFilesystem};
pub use health::{LifecycleReporter, StructuredLifecycleReporter};
pub use host::{
    DEFAULT_GRACE_PERIOD, EngineEvent, ProcessEngine, ProcessServiceHost, StartRequest,
};
pub use launch::{
    ConfigLoader, LaunchError, LaunchSummary, StaticConfigLoader, SystemConfigLoader, load, run,
    run_with,
};
pub use lifecycle::{
    BindError, BindToken, ConnectionHandle, ConnectionState, Coordinator, CoordinatorDeps,
    EngineDelegate, EngineError, EngineService, LifecycleError, LifecycleSnapshot, NoopDelegate,
    ServiceCallbacks, ServiceDescriptor, ServiceHost, SessionFault,
};
pub use registry::ConfigRegistry;
pub use shutdown::{ImmediateShutdown, ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use staging::{COPY_BUFFER_SIZE, ResourceStager, StageError, StageErrorKind, StageOutcome};
pub use telemetry::{TelemetryError, TelemetryHandle, initialise as initialise_telemetry};

#[cfg(test)]
mod tests;
