//! Lifecycle of the external service process that hosts the engine.
//!
//! The [`Coordinator`] asks a [`ServiceHost`] to bind the service and, once
//! the host reports the binding, calls the service's [`EngineService`] entry
//! point with the caller's [`EngineDelegate`], the release name, and the
//! registered configuration files. State moves through
//! `Disconnected -> Connecting -> Bound -> EngineStarted` and back to
//! `Disconnected` on stop or host disconnect.

mod coordinator;
mod engine;
mod error;
mod events;
mod host;
mod state;
mod worker;

pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

pub use coordinator::{ConnectionHandle, Coordinator, CoordinatorDeps};
pub use engine::{EngineDelegate, EngineService, NoopDelegate};
pub use error::{BindError, EngineError, LifecycleError, SessionFault};
pub use host::{BindToken, ServiceCallbacks, ServiceDescriptor, ServiceHost};
pub use state::{ConnectionState, LifecycleSnapshot};
