//! Messages delivered from host callbacks to the lifecycle worker.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::engine::EngineService;
use super::error::BindError;
use super::host::BindToken;

/// Host notification tagged with the start generation it belongs to.
pub(super) enum HostEvent {
    Connected {
        generation: u64,
        /// Filled by `start` once `bind` returns, before the worker can
        /// observe the event.
        token: Arc<OnceCell<BindToken>>,
        service: Arc<dyn EngineService>,
    },
    Disconnected {
        generation: u64,
    },
    BindFailed {
        generation: u64,
        error: BindError,
    },
    Shutdown,
}

impl fmt::Debug for HostEvent {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected { generation, .. } => formatter
                .debug_struct("Connected")
                .field("generation", generation)
                .finish_non_exhaustive(),
            Self::Disconnected { generation } => formatter
                .debug_struct("Disconnected")
                .field("generation", generation)
                .finish(),
            Self::BindFailed { generation, error } => formatter
                .debug_struct("BindFailed")
                .field("generation", generation)
                .field("error", error)
                .finish(),
            Self::Shutdown => formatter.write_str("Shutdown"),
        }
    }
}
