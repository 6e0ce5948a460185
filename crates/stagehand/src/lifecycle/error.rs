//! Error types for the service lifecycle.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use super::state::ConnectionState;

/// The host could not establish the service binding.
#[derive(Debug, Clone, Error)]
pub enum BindError {
    /// Launching the service process failed.
    #[error("failed to launch service '{command}': {source}")]
    Spawn {
        /// Command that was launched.
        command: String,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The host declined the bind request.
    #[error("service host refused the binding: {reason}")]
    Refused {
        /// Host-supplied explanation.
        reason: String,
    },
}

/// The engine's start entry point failed after a successful bind.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The engine rejected the start request.
    #[error("engine rejected start request: {reason}")]
    Rejected {
        /// Engine-supplied explanation.
        reason: String,
    },
    /// The engine was already started through this service reference.
    #[error("engine already started")]
    AlreadyStarted,
    /// Talking to the engine failed.
    #[error("failed to deliver start request to engine: {source}")]
    Io {
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The start request could not be encoded.
    #[error("failed to encode start request: {source}")]
    Codec {
        /// Underlying serialisation error.
        #[source]
        source: Arc<serde_json::Error>,
    },
}

impl From<io::Error> for EngineError {
    fn from(source: io::Error) -> Self {
        Self::Io {
            source: Arc::new(source),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(source: serde_json::Error) -> Self {
        Self::Codec {
            source: Arc::new(source),
        }
    }
}

/// Failure recorded against a lifecycle session.
#[derive(Debug, Clone, Error)]
pub enum SessionFault {
    /// Binding to the service failed; the session is disconnected.
    #[error(transparent)]
    Bind(#[from] BindError),
    /// The engine failed to start; the binding is still held.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Errors returned synchronously by lifecycle requests.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A session is already connecting or connected.
    #[error("service session already active (state: {state})")]
    AlreadyActive {
        /// State observed when the request was rejected.
        state: ConnectionState,
    },
    /// The host rejected the bind request outright.
    #[error("failed to bind service: {source}")]
    BindFailure {
        /// Underlying bind error.
        #[source]
        source: BindError,
    },
    /// The event worker thread could not be started.
    #[error("failed to start lifecycle worker: {source}")]
    Worker {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
