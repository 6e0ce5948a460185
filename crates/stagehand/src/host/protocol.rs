//! JSON-line messages exchanged with the engine process.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Start request written to the engine's stdin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    /// Engine build to start.
    pub release: String,
    /// Configuration files, in registration order.
    pub config_files: Vec<Utf8PathBuf>,
}

impl StartRequest {
    /// Encodes the request as a single newline-terminated JSON line.
    ///
    /// # Errors
    ///
    /// Returns the serialisation error if encoding fails.
    pub fn to_line(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

/// Event emitted by the engine on stdout, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// The engine is serving.
    Started {
        /// Listening host.
        host: String,
        /// Listening port.
        port: u16,
    },
    /// First-run installation progress.
    Installing {
        /// Units installed so far.
        completed: u64,
        /// Total units to install.
        total: u64,
    },
    /// The engine stopped.
    Exited {
        /// Engine-supplied reason.
        reason: String,
    },
}

impl EngineEvent {
    /// Parses one stdout line; blank lines yield `None`.
    ///
    /// # Errors
    ///
    /// Returns the parse error for a non-blank line that is not an event.
    pub fn parse(line: &str) -> Result<Option<Self>, serde_json::Error> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(trimmed).map(Some)
    }
}
