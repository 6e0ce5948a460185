//! Lifecycle reporter that records events for assertions.

use std::sync::Mutex;

use crate::health::LifecycleReporter;
use crate::lifecycle::{BindError, ConnectionState, EngineError, ServiceDescriptor};

/// Lifecycle events captured by [`RecordingLifecycleReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Binding(u64),
    StartRejected(ConnectionState),
    BindFailed(u64),
    Bound(u64),
    EngineStarted(u64),
    EngineFailed(u64),
    StaleBindDiscarded(u64),
    Disconnected(u64),
    Stopped(u64, ConnectionState),
}

/// Records every lifecycle notification in arrival order.
#[derive(Debug, Default)]
pub struct RecordingLifecycleReporter {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingLifecycleReporter {
    /// Copy of the events recorded so far.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .clone()
    }

    /// Whether `event` has been recorded.
    pub fn saw(&self, event: &LifecycleEvent) -> bool {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .contains(event)
    }

    fn record(&self, event: LifecycleEvent) {
        self.events
            .lock()
            .expect("reporter mutex poisoned")
            .push(event);
    }
}

impl LifecycleReporter for RecordingLifecycleReporter {
    fn binding(&self, _descriptor: &ServiceDescriptor, generation: u64) {
        self.record(LifecycleEvent::Binding(generation));
    }

    fn start_rejected(&self, state: ConnectionState) {
        self.record(LifecycleEvent::StartRejected(state));
    }

    fn bind_failed(&self, generation: u64, _error: &BindError) {
        self.record(LifecycleEvent::BindFailed(generation));
    }

    fn bound(&self, generation: u64) {
        self.record(LifecycleEvent::Bound(generation));
    }

    fn engine_started(&self, generation: u64) {
        self.record(LifecycleEvent::EngineStarted(generation));
    }

    fn engine_failed(&self, generation: u64, _error: &EngineError) {
        self.record(LifecycleEvent::EngineFailed(generation));
    }

    fn stale_bind_discarded(&self, generation: u64) {
        self.record(LifecycleEvent::StaleBindDiscarded(generation));
    }

    fn disconnected(&self, generation: u64) {
        self.record(LifecycleEvent::Disconnected(generation));
    }

    fn stopped(&self, generation: u64, previous: ConnectionState) {
        self.record(LifecycleEvent::Stopped(generation, previous));
    }
}
