//! Start/stop requests and the shared session state they mutate.

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::health::LifecycleReporter;
use crate::registry::ConfigRegistry;

use super::LIFECYCLE_TARGET;
use super::engine::{EngineDelegate, EngineService};
use super::error::{LifecycleError, SessionFault};
use super::events::HostEvent;
use super::host::{ServiceCallbacks, ServiceDescriptor, ServiceHost};
use super::state::{ConnectionState, LifecycleSnapshot, Session};
use super::worker;

/// Collaborators the coordinator drives.
pub struct CoordinatorDeps {
    /// Service the host should bind.
    pub descriptor: ServiceDescriptor,
    /// Host binding mechanism.
    pub host: Arc<dyn ServiceHost>,
    /// Source of the config file list handed to the engine.
    pub registry: Arc<ConfigRegistry>,
    /// Delegate forwarded verbatim to the engine.
    pub delegate: Arc<dyn EngineDelegate>,
    /// Observer for transitions and asynchronous failures.
    pub reporter: Arc<dyn LifecycleReporter>,
}

pub(super) struct Inner {
    pub(super) session: Session,
    pub(super) generation: u64,
    pub(super) release: String,
    pub(super) last_error: Option<SessionFault>,
}

pub(super) struct Core {
    pub(super) host: Arc<dyn ServiceHost>,
    pub(super) registry: Arc<ConfigRegistry>,
    pub(super) delegate: Arc<dyn EngineDelegate>,
    pub(super) reporter: Arc<dyn LifecycleReporter>,
    inner: Mutex<Inner>,
    changed: Condvar,
}

impl Core {
    pub(super) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    pub(super) fn notify(&self) {
        self.changed.notify_all();
    }

    fn snapshot(&self) -> LifecycleSnapshot {
        snapshot_of(&self.lock())
    }

    fn stop(&self, only_generation: Option<u64>) {
        let (previous, released) = {
            let mut inner = self.lock();
            let previous = inner.session.state();
            let Some(generation) = inner.session.generation() else {
                return;
            };
            if only_generation.is_some_and(|wanted| wanted != generation) {
                debug!(
                    target: LIFECYCLE_TARGET,
                    generation,
                    "ignoring stop from a superseded handle"
                );
                return;
            }
            let token = inner.session.token();
            inner.session = Session::Disconnected;
            self.notify();
            (previous, token.map(|token| (generation, token)))
        };

        if let Some((generation, token)) = released {
            self.reporter.stopped(generation, previous);
            self.host.unbind(token);
        }
    }

    fn wait_for<F>(&self, timeout: Duration, predicate: F) -> bool
    where
        F: Fn(&LifecycleSnapshot) -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        loop {
            if predicate(&snapshot_of(&inner)) {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            inner = match self.changed.wait_timeout(inner, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poison) => poison.into_inner().0,
            };
        }
    }
}

fn snapshot_of(inner: &Inner) -> LifecycleSnapshot {
    LifecycleSnapshot {
        state: inner.session.state(),
        generation: inner.generation,
        last_error: inner.last_error.clone(),
    }
}

/// Owns the connection to the external service process.
///
/// `start` and `stop` return immediately. Host callbacks arrive as messages
/// on a channel drained by a single worker thread, and every transition runs
/// under one lock. Each start bumps a generation counter so a bind that
/// completes after its session was stopped is released instead of started.
pub struct Coordinator {
    core: Arc<Core>,
    descriptor: ServiceDescriptor,
    events: Sender<HostEvent>,
    worker: Option<JoinHandle<()>>,
}

impl Coordinator {
    /// Builds a coordinator and spawns its event worker.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Worker`] if the worker thread cannot spawn.
    pub fn new(deps: CoordinatorDeps) -> Result<Self, LifecycleError> {
        let CoordinatorDeps {
            descriptor,
            host,
            registry,
            delegate,
            reporter,
        } = deps;
        let core = Arc::new(Core {
            host,
            registry,
            delegate,
            reporter,
            inner: Mutex::new(Inner {
                session: Session::Disconnected,
                generation: 0,
                release: String::new(),
                last_error: None,
            }),
            changed: Condvar::new(),
        });
        let (events, receiver) = mpsc::channel();
        let worker_core = Arc::clone(&core);
        let worker = thread::Builder::new()
            .name(String::from("stagehand-lifecycle"))
            .spawn(move || worker::run(&worker_core, &receiver))
            .map_err(|source| LifecycleError::Worker { source })?;
        Ok(Self {
            core,
            descriptor,
            events,
            worker: Some(worker),
        })
    }

    /// Requests a binding that will start the engine build `release`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyActive`] while a session is
    /// connecting or connected, leaving it untouched, and
    /// [`LifecycleError::BindFailure`] when the host refuses the request.
    pub fn start(&self, release: &str) -> Result<ConnectionHandle, LifecycleError> {
        let mut inner = self.core.lock();
        let state = inner.session.state();
        if state.is_active() {
            drop(inner);
            self.core.reporter.start_rejected(state);
            return Err(LifecycleError::AlreadyActive { state });
        }

        inner.generation += 1;
        let generation = inner.generation;
        release.clone_into(&mut inner.release);
        inner.last_error = None;

        let callbacks = ServiceCallbacks::new(generation, self.events.clone());
        let bound = self.core.host.bind(&self.descriptor, callbacks.clone());
        match bound {
            Ok(token) => {
                callbacks.assign(token);
                inner.session = Session::Connecting { generation, token };
                self.core.notify();
                drop(inner);
                self.core.reporter.binding(&self.descriptor, generation);
                debug!(
                    target: LIFECYCLE_TARGET,
                    generation,
                    token = %token,
                    release,
                    "bind requested"
                );
                Ok(ConnectionHandle {
                    core: Arc::clone(&self.core),
                    generation,
                })
            }
            Err(source) => {
                inner.last_error = Some(SessionFault::Bind(source.clone()));
                self.core.notify();
                drop(inner);
                self.core.reporter.binding(&self.descriptor, generation);
                self.core.reporter.bind_failed(generation, &source);
                Err(LifecycleError::BindFailure { source })
            }
        }
    }

    /// Stops whatever session is active without waiting for the host.
    pub fn stop(&self) {
        self.core.stop(None);
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.core.lock().session.state()
    }

    /// Current state, generation, and recorded failure.
    #[must_use]
    pub fn snapshot(&self) -> LifecycleSnapshot {
        self.core.snapshot()
    }

    /// The bound service, while the session is connected.
    #[must_use]
    pub fn service(&self) -> Option<Arc<dyn EngineService>> {
        self.core.lock().session.service()
    }

    /// Blocks until `predicate` holds or `timeout` elapses.
    ///
    /// Returns whether the predicate held.
    #[must_use]
    pub fn wait_for<F>(&self, timeout: Duration, predicate: F) -> bool
    where
        F: Fn(&LifecycleSnapshot) -> bool,
    {
        self.core.wait_for(timeout, predicate)
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.core.stop(None);
        if self.events.send(HostEvent::Shutdown).is_err() {
            warn!(
                target: LIFECYCLE_TARGET,
                "lifecycle worker exited before shutdown"
            );
        }
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!(target: LIFECYCLE_TARGET, "lifecycle worker panicked");
        }
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("descriptor", &self.descriptor)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Handle to one start request.
///
/// Stopping through a handle only affects the session it was issued for; a
/// handle from an earlier session cannot stop a later one.
#[derive(Clone)]
pub struct ConnectionHandle {
    core: Arc<Core>,
    generation: u64,
}

impl ConnectionHandle {
    /// Generation of the start request this handle was issued for.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Requests the host release this session's binding.
    pub fn stop(&self) {
        self.core.stop(Some(self.generation));
    }

    /// State of this handle's session; `Disconnected` once superseded.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        let inner = self.core.lock();
        if inner.session.generation() == Some(self.generation) {
            inner.session.state()
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Failure recorded for this handle's session, if it is still the latest.
    #[must_use]
    pub fn last_error(&self) -> Option<SessionFault> {
        let inner = self.core.lock();
        if inner.generation == self.generation {
            inner.last_error.clone()
        } else {
            None
        }
    }

    /// Blocks until `predicate` holds or `timeout` elapses.
    ///
    /// Returns whether the predicate held.
    #[must_use]
    pub fn wait_for<F>(&self, timeout: Duration, predicate: F) -> bool
    where
        F: Fn(&LifecycleSnapshot) -> bool,
    {
        self.core.wait_for(timeout, predicate)
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
