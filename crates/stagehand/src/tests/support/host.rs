//! Scripted service host, engine, and delegate doubles.

use std::sync::{Arc, Condvar, Mutex};

use camino::Utf8PathBuf;

use crate::lifecycle::{
    BindError, BindToken, EngineDelegate, EngineError, EngineService, ServiceCallbacks,
    ServiceDescriptor, ServiceHost,
};

#[derive(Default)]
struct HostState {
    next_token: u64,
    binds: Vec<(BindToken, ServiceCallbacks)>,
    unbinds: Vec<BindToken>,
    refusal: Option<String>,
}

/// Service host whose callbacks are fired by the test.
///
/// `bind` only records the request; tests decide when and how it completes.
#[derive(Default)]
pub struct FakeServiceHost {
    state: Mutex<HostState>,
}

impl FakeServiceHost {
    /// Makes later `bind` calls fail synchronously with `reason`.
    pub fn refuse_binds(&self, reason: &str) {
        self.lock().refusal = Some(reason.to_owned());
    }

    /// Number of accepted bind requests.
    pub fn bind_count(&self) -> usize {
        self.lock().binds.len()
    }

    /// Tokens released so far, in order.
    pub fn unbinds(&self) -> Vec<BindToken> {
        self.lock().unbinds.clone()
    }

    /// Token issued for the `index`th bind.
    pub fn token(&self, index: usize) -> BindToken {
        self.callbacks_at(index).0
    }

    /// Reports the `index`th bind as connected to `engine`.
    pub fn connect(&self, index: usize, engine: Arc<dyn EngineService>) {
        self.callbacks_at(index).1.connected(engine);
    }

    /// Reports the `index`th binding as torn down.
    pub fn disconnect(&self, index: usize) {
        self.callbacks_at(index).1.disconnected();
    }

    /// Reports the `index`th bind as failed.
    pub fn fail(&self, index: usize, reason: &str) {
        self.callbacks_at(index).1.bind_failed(BindError::Refused {
            reason: reason.to_owned(),
        });
    }

    fn callbacks_at(&self, index: usize) -> (BindToken, ServiceCallbacks) {
        self.lock()
            .binds
            .get(index)
            .cloned()
            .expect("bind index should exist")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().expect("host mutex poisoned")
    }
}

impl ServiceHost for FakeServiceHost {
    fn bind(
        &self,
        _descriptor: &ServiceDescriptor,
        callbacks: ServiceCallbacks,
    ) -> Result<BindToken, BindError> {
        let mut state = self.lock();
        if let Some(reason) = state.refusal.clone() {
            return Err(BindError::Refused { reason });
        }
        state.next_token += 1;
        let token = BindToken::new(state.next_token);
        state.binds.push((token, callbacks));
        Ok(token)
    }

    fn unbind(&self, token: BindToken) {
        self.lock().unbinds.push(token);
    }
}

/// Arguments received by [`RecordingEngine::start_engine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartCall {
    pub release: String,
    pub config_files: Vec<Utf8PathBuf>,
}

/// Engine that records start requests and greets the delegate.
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<StartCall>>,
    failure: Mutex<Option<String>>,
    held: Mutex<bool>,
    released: Condvar,
}

impl RecordingEngine {
    /// Engine whose start entry point rejects every request.
    pub fn failing(reason: &str) -> Self {
        Self {
            failure: Mutex::new(Some(reason.to_owned())),
            ..Self::default()
        }
    }

    /// Engine whose start entry point blocks until [`Self::release`].
    pub fn held() -> Self {
        Self {
            held: Mutex::new(true),
            ..Self::default()
        }
    }

    /// Lets blocked and future start requests finish.
    pub fn release(&self) {
        *self.held.lock().expect("engine mutex poisoned") = false;
        self.released.notify_all();
    }

    /// Start requests received so far.
    pub fn calls(&self) -> Vec<StartCall> {
        self.calls.lock().expect("engine mutex poisoned").clone()
    }
}

impl EngineService for RecordingEngine {
    fn start_engine(
        &self,
        delegate: Arc<dyn EngineDelegate>,
        release: &str,
        config_files: &[Utf8PathBuf],
    ) -> Result<(), EngineError> {
        self.calls
            .lock()
            .expect("engine mutex poisoned")
            .push(StartCall {
                release: release.to_owned(),
                config_files: config_files.to_vec(),
            });
        let mut held = self.held.lock().expect("engine mutex poisoned");
        while *held {
            held = self.released.wait(held).expect("engine mutex poisoned");
        }
        drop(held);
        if let Some(reason) = self.failure.lock().expect("engine mutex poisoned").clone() {
            return Err(EngineError::Rejected { reason });
        }
        delegate.engine_started("127.0.0.1", 5984);
        Ok(())
    }
}

/// Delegate that records the notifications it receives.
#[derive(Debug, Default)]
pub struct RecordingDelegate {
    started: Mutex<Vec<(String, u16)>>,
    progress: Mutex<Vec<(u64, u64)>>,
    exits: Mutex<Vec<String>>,
}

impl RecordingDelegate {
    /// `engine_started` notifications.
    pub fn started(&self) -> Vec<(String, u16)> {
        self.started.lock().expect("delegate mutex poisoned").clone()
    }

    /// `installing` notifications.
    pub fn progress(&self) -> Vec<(u64, u64)> {
        self.progress.lock().expect("delegate mutex poisoned").clone()
    }

    /// `engine_exited` notifications.
    pub fn exits(&self) -> Vec<String> {
        self.exits.lock().expect("delegate mutex poisoned").clone()
    }
}

impl EngineDelegate for RecordingDelegate {
    fn engine_started(&self, host: &str, port: u16) {
        self.started
            .lock()
            .expect("delegate mutex poisoned")
            .push((host.to_owned(), port));
    }

    fn installing(&self, completed: u64, total: u64) {
        self.progress
            .lock()
            .expect("delegate mutex poisoned")
            .push((completed, total));
    }

    fn engine_exited(&self, reason: &str) {
        self.exits
            .lock()
            .expect("delegate mutex poisoned")
            .push(reason.to_owned());
    }
}
