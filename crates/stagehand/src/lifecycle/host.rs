//! Boundary to the host's service-binding mechanism.

use std::fmt;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use once_cell::sync::OnceCell;
use tracing::debug;

use super::LIFECYCLE_TARGET;
use super::engine::EngineService;
use super::error::BindError;
use super::events::HostEvent;

/// Names the service a host should bind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    name: String,
}

impl ServiceDescriptor {
    /// Describes the service called `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Service name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ServiceDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.name)
    }
}

/// Opaque token identifying one binding issued by a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindToken(u64);

impl BindToken {
    /// Wraps a host-assigned identifier.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Host-assigned identifier.
    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BindToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "bind-{}", self.0)
    }
}

/// Callbacks a host invokes as a binding progresses.
///
/// Callbacks may be invoked from any thread. They only enqueue a message for
/// the coordinator's worker, so they never block on coordinator state.
#[derive(Clone)]
pub struct ServiceCallbacks {
    generation: u64,
    token: Arc<OnceCell<BindToken>>,
    events: Sender<HostEvent>,
}

impl ServiceCallbacks {
    pub(super) fn new(generation: u64, events: Sender<HostEvent>) -> Self {
        Self {
            generation,
            token: Arc::new(OnceCell::new()),
            events,
        }
    }

    /// Records the token `bind` returned for this binding.
    pub(super) fn assign(&self, token: BindToken) {
        if self.token.set(token).is_err() {
            debug!(
                target: LIFECYCLE_TARGET,
                generation = self.generation,
                "bind token already assigned"
            );
        }
    }

    /// Start generation these callbacks report for.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The binding is established and `service` is ready for use.
    pub fn connected(&self, service: Arc<dyn EngineService>) {
        self.send(HostEvent::Connected {
            generation: self.generation,
            token: Arc::clone(&self.token),
            service,
        });
    }

    /// The binding was torn down by the host.
    pub fn disconnected(&self) {
        self.send(HostEvent::Disconnected {
            generation: self.generation,
        });
    }

    /// The host failed to establish the binding.
    pub fn bind_failed(&self, error: BindError) {
        self.send(HostEvent::BindFailed {
            generation: self.generation,
            error,
        });
    }

    fn send(&self, event: HostEvent) {
        if let Err(error) = self.events.send(event) {
            debug!(
                target: LIFECYCLE_TARGET,
                generation = self.generation,
                event = ?error.0,
                "lifecycle worker gone; dropping host event"
            );
        }
    }
}

impl fmt::Debug for ServiceCallbacks {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServiceCallbacks")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Host mechanism that binds and unbinds out-of-process services.
pub trait ServiceHost: Send + Sync {
    /// Requests a binding and returns without waiting for it.
    ///
    /// Completion is reported later through `callbacks`. Implementations must
    /// not block on the service becoming ready.
    ///
    /// # Errors
    ///
    /// Returns [`BindError`] when the request cannot even be issued.
    fn bind(
        &self,
        descriptor: &ServiceDescriptor,
        callbacks: ServiceCallbacks,
    ) -> Result<BindToken, BindError>;

    /// Releases a binding without waiting for the service to exit.
    ///
    /// Unknown or already released tokens are ignored.
    fn unbind(&self, token: BindToken);
}

impl<T> ServiceHost for Arc<T>
where
    T: ServiceHost + ?Sized,
{
    fn bind(
        &self,
        descriptor: &ServiceDescriptor,
        callbacks: ServiceCallbacks,
    ) -> Result<BindToken, BindError> {
        (**self).bind(descriptor, callbacks)
    }

    fn unbind(&self, token: BindToken) {
        (**self).unbind(token);
    }
}
