//! Event loop applying host callbacks to the session.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

use once_cell::sync::OnceCell;
use tracing::debug;

use super::LIFECYCLE_TARGET;
use super::coordinator::Core;
use super::engine::EngineService;
use super::error::{BindError, SessionFault};
use super::events::HostEvent;
use super::host::BindToken;
use super::state::Session;

pub(super) fn run(core: &Core, events: &Receiver<HostEvent>) {
    while let Ok(event) = events.recv() {
        debug!(target: LIFECYCLE_TARGET, event = ?event, "host event received");
        match event {
            HostEvent::Connected {
                generation,
                token,
                service,
            } => on_connected(core, generation, &token, &service),
            HostEvent::Disconnected { generation } => on_disconnected(core, generation),
            HostEvent::BindFailed { generation, error } => {
                on_bind_failed(core, generation, &error);
            }
            HostEvent::Shutdown => break,
        }
    }
    debug!(target: LIFECYCLE_TARGET, "lifecycle worker stopped");
}

fn on_connected(
    core: &Core,
    generation: u64,
    issued: &OnceCell<BindToken>,
    service: &Arc<dyn EngineService>,
) {
    let mut inner = core.lock();
    let token = match inner.session {
        Session::Connecting {
            generation: current,
            token,
        } if current == generation => token,
        _ if inner.session.generation() == Some(generation) => {
            debug!(
                target: LIFECYCLE_TARGET,
                generation,
                "ignoring repeated connect for the live session"
            );
            return;
        }
        _ => {
            // `start` assigns the token before releasing the lock, so any
            // connect the worker can see has one unless `bind` failed.
            let stale = issued.get().copied();
            drop(inner);
            match stale {
                Some(token) => {
                    core.reporter.stale_bind_discarded(generation);
                    core.host.unbind(token);
                }
                None => debug!(
                    target: LIFECYCLE_TARGET,
                    generation,
                    "ignoring connect for a refused bind"
                ),
            }
            return;
        }
    };

    inner.session = Session::Bound {
        generation,
        token,
        service: Arc::downgrade(service),
    };
    let release = inner.release.clone();
    core.notify();
    drop(inner);
    core.reporter.bound(generation);

    let config_files = core.registry.list();
    let result = service.start_engine(Arc::clone(&core.delegate), &release, &config_files);

    let mut inner = core.lock();
    if inner.session.generation() != Some(generation) {
        // Stopped while the engine was starting; stop already released it.
        return;
    }
    match result {
        Ok(()) => {
            inner.session = Session::EngineStarted {
                generation,
                token,
                service: Arc::downgrade(service),
            };
            core.notify();
            drop(inner);
            core.reporter.engine_started(generation);
        }
        Err(error) => {
            inner.last_error = Some(SessionFault::Engine(error.clone()));
            core.notify();
            drop(inner);
            core.reporter.engine_failed(generation, &error);
        }
    }
}

fn on_disconnected(core: &Core, generation: u64) {
    let mut inner = core.lock();
    if inner.session.generation() != Some(generation) {
        return;
    }
    inner.session = Session::Disconnected;
    core.notify();
    drop(inner);
    core.reporter.disconnected(generation);
}

fn on_bind_failed(core: &Core, generation: u64, error: &BindError) {
    let mut inner = core.lock();
    if inner.session.generation() != Some(generation) {
        return;
    }
    inner.session = Session::Disconnected;
    inner.last_error = Some(SessionFault::Bind(error.clone()));
    core.notify();
    drop(inner);
    core.reporter.bind_failed(generation, error);
}
