//! Structured reporting for service lifecycle transitions.

use std::sync::Arc;

use crate::lifecycle::{BindError, ConnectionState, EngineError, ServiceDescriptor};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer notified of every lifecycle transition and failure.
///
/// Lifecycle failures happen after `start` has returned, so this is where
/// bind and engine failures surface.
pub trait LifecycleReporter: Send + Sync {
    /// A bind was requested for `generation`.
    fn binding(&self, descriptor: &ServiceDescriptor, generation: u64);

    /// A start request was rejected because a session is active.
    fn start_rejected(&self, state: ConnectionState);

    /// The host failed to establish the binding.
    fn bind_failed(&self, generation: u64, error: &BindError);

    /// The binding is established.
    fn bound(&self, generation: u64);

    /// The engine accepted its start request.
    fn engine_started(&self, generation: u64);

    /// The engine's start entry point failed; the binding remains.
    fn engine_failed(&self, generation: u64, error: &EngineError);

    /// A bind completed after its session was stopped and was released.
    fn stale_bind_discarded(&self, generation: u64);

    /// The host tore the binding down.
    fn disconnected(&self, generation: u64);

    /// The caller stopped the session.
    fn stopped(&self, generation: u64, previous: ConnectionState);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn binding(&self, descriptor: &ServiceDescriptor, generation: u64) {
        (**self).binding(descriptor, generation);
    }

    fn start_rejected(&self, state: ConnectionState) {
        (**self).start_rejected(state);
    }

    fn bind_failed(&self, generation: u64, error: &BindError) {
        (**self).bind_failed(generation, error);
    }

    fn bound(&self, generation: u64) {
        (**self).bound(generation);
    }

    fn engine_started(&self, generation: u64) {
        (**self).engine_started(generation);
    }

    fn engine_failed(&self, generation: u64, error: &EngineError) {
        (**self).engine_failed(generation, error);
    }

    fn stale_bind_discarded(&self, generation: u64) {
        (**self).stale_bind_discarded(generation);
    }

    fn disconnected(&self, generation: u64) {
        (**self).disconnected(generation);
    }

    fn stopped(&self, generation: u64, previous: ConnectionState) {
        (**self).stopped(generation, previous);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn binding(&self, descriptor: &ServiceDescriptor, generation: u64) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "binding",
            service = %descriptor,
            generation,
            "requesting service binding"
        );
    }

    fn start_rejected(&self, state: ConnectionState) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "start_rejected",
            state = %state,
            "start rejected; session already active"
        );
    }

    fn bind_failed(&self, generation: u64, error: &BindError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bind_failed",
            generation,
            error = %error,
            "service binding failed"
        );
    }

    fn bound(&self, generation: u64) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bound",
            generation,
            "service bound"
        );
    }

    fn engine_started(&self, generation: u64) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "engine_started",
            generation,
            "engine started"
        );
    }

    fn engine_failed(&self, generation: u64, error: &EngineError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "engine_failed",
            generation,
            error = %error,
            "engine failed to start; service remains bound"
        );
    }

    fn stale_bind_discarded(&self, generation: u64) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "stale_bind_discarded",
            generation,
            "binding completed after stop; releasing it"
        );
    }

    fn disconnected(&self, generation: u64) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "disconnected",
            generation,
            "service disconnected"
        );
    }

    fn stopped(&self, generation: u64, previous: ConnectionState) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "stopped",
            generation,
            previous = %previous,
            "service session stopped"
        );
    }
}
