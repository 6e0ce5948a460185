//! The engine entry point on a bound service, and the caller's delegate.

use std::sync::Arc;

use camino::Utf8PathBuf;

use super::error::EngineError;

/// Receives notifications from a running engine.
///
/// The lifecycle coordinator never calls these methods; it forwards the
/// delegate to the engine's start entry point and the engine reports through
/// it. Every callback defaults to doing nothing.
pub trait EngineDelegate: Send + Sync {
    /// The engine is serving on `host:port`.
    fn engine_started(&self, host: &str, port: u16) {
        let _ = (host, port);
    }

    /// First-run installation progress.
    fn installing(&self, completed: u64, total: u64) {
        let _ = (completed, total);
    }

    /// The engine stopped.
    fn engine_exited(&self, reason: &str) {
        let _ = reason;
    }
}

/// Delegate that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelegate;

impl EngineDelegate for NoopDelegate {}

/// Entry point exposed by a bound service.
pub trait EngineService: Send + Sync {
    /// Starts the engine build named by `release` with `config_files`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the engine cannot accept the request.
    fn start_engine(
        &self,
        delegate: Arc<dyn EngineDelegate>,
        release: &str,
        config_files: &[Utf8PathBuf],
    ) -> Result<(), EngineError>;
}
