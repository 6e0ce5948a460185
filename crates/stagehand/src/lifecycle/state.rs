//! Connection state for the service session.

use std::fmt;
use std::sync::{Arc, Weak};

use super::engine::EngineService;
use super::error::SessionFault;
use super::host::BindToken;

/// Observable state of the service connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No binding exists or is in flight.
    Disconnected,
    /// A bind was requested and has not completed.
    Connecting,
    /// The service is bound; the engine has not (yet) started.
    Bound,
    /// The service is bound and its engine accepted the start request.
    EngineStarted,
}

impl ConnectionState {
    /// Whether a start request would be rejected in this state.
    #[must_use]
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// Whether the service binding is established.
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Bound | Self::EngineStarted)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => formatter.write_str("disconnected"),
            Self::Connecting => formatter.write_str("connecting"),
            Self::Bound => formatter.write_str("bound"),
            Self::EngineStarted => formatter.write_str("engine_started"),
        }
    }
}

/// Point-in-time view of a coordinator's session.
#[derive(Debug, Clone)]
pub struct LifecycleSnapshot {
    /// Current connection state.
    pub state: ConnectionState,
    /// Generation of the most recent start request.
    pub generation: u64,
    /// Failure recorded against the most recent session, if any.
    pub last_error: Option<SessionFault>,
}

/// Session bookkeeping guarded by the coordinator lock.
pub(super) enum Session {
    Disconnected,
    Connecting {
        generation: u64,
        token: BindToken,
    },
    Bound {
        generation: u64,
        token: BindToken,
        service: Weak<dyn EngineService>,
    },
    EngineStarted {
        generation: u64,
        token: BindToken,
        service: Weak<dyn EngineService>,
    },
}

impl Session {
    pub(super) fn state(&self) -> ConnectionState {
        match self {
            Self::Disconnected => ConnectionState::Disconnected,
            Self::Connecting { .. } => ConnectionState::Connecting,
            Self::Bound { .. } => ConnectionState::Bound,
            Self::EngineStarted { .. } => ConnectionState::EngineStarted,
        }
    }

    pub(super) fn generation(&self) -> Option<u64> {
        match self {
            Self::Disconnected => None,
            Self::Connecting { generation, .. }
            | Self::Bound { generation, .. }
            | Self::EngineStarted { generation, .. } => Some(*generation),
        }
    }

    pub(super) fn token(&self) -> Option<BindToken> {
        match self {
            Self::Disconnected => None,
            Self::Connecting { token, .. }
            | Self::Bound { token, .. }
            | Self::EngineStarted { token, .. } => Some(*token),
        }
    }

    pub(super) fn service(&self) -> Option<Arc<dyn EngineService>> {
        match self {
            Self::Bound { service, .. } | Self::EngineStarted { service, .. } => service.upgrade(),
            Self::Disconnected | Self::Connecting { .. } => None,
        }
    }
}
